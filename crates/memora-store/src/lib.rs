//! Memora Store - SQLite persistence for the decision store
//!
//! Provides:
//! - SQLite schema with an embedded, checksummed migrations framework
//! - `SqliteRepo` row-level persistence for every journaled change
//! - Hydration of the full state into a `memora_core::Store`
//! - `SqliteSink`, the transactional `StoreSink` used by the engine

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod sink;

// Re-export key types
pub use errors::Result;
pub use repo::SqliteRepo;
pub use sink::SqliteSink;
