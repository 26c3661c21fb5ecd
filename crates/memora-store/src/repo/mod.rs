//! Repository layer for persisting domain models to SQLite
//!
//! Bridges the in-memory `Store` and its change journal to SQLite

pub mod hydration;
pub mod sqlite_repo;

pub use sqlite_repo::SqliteRepo;
