//! Structured logging facility for Memora
//!
//! - Single initialization point via `init(profile)`
//! - Operation boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - In-memory capture layer for asserting on log output in tests
//!
//! # Usage
//!
//! ```rust
//! use memora_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Engine commands own their start/end boundary. Core operations never emit
//! boundary events; they log at `debug` or `warn` only.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
