//! Command boundary
//!
//! Every public command emits exactly one `start` and one `end` (or
//! `end_error`) event through the op macros. The engine, core and store
//! below only log at `debug`/`warn`.

pub mod decision;
pub mod engine_command;
pub mod pipeline;
pub mod workflow;

/// Milliseconds since `start`, for the `duration_ms` field
pub(crate) fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
