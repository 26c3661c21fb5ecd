pub mod adr_render;

pub use adr_render::render_adr;
