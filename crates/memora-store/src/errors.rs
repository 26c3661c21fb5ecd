//! Error handling for memora-store
//!
//! Wraps memora-core ExError with store-specific helpers

use memora_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Migration)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Migration)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// A head moved between load and commit
pub fn head_conflict(decision_id: &str, expected: Option<u32>, actual: Option<u32>) -> ExError {
    let show = |v: Option<u32>| v.map_or_else(|| "none".to_string(), |v| v.to_string());
    ExError::new(ExErrorKind::VersionConflict)
        .with_op("commit")
        .with_decision_id(decision_id)
        .with_message(format!(
            "head of {} is {}, expected {}",
            decision_id,
            show(actual),
            show(expected)
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a (de)serialization error for a stored payload
pub fn from_serde(op: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
