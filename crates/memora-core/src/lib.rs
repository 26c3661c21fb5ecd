//! Memora Core - decision inference kernel
//!
//! Pure, synchronous domain logic for turning engineering activity into
//! versioned, scored decision records:
//! - Evidence normalization and decision building
//! - Multi-factor confidence scoring with calibrated weights
//! - Knowledge graph operations (versioning, links, supersession, traversal)
//! - Validation workflow (routing, feedback, consensus, escalation)
//! - Read-only queries and ADR-style Markdown rendering
//!
//! Async concerns (providers, queueing, persistence commits) live in
//! `memora-engine`; durable storage lives in `memora-store`.

pub mod apply;
pub mod authority;
pub mod builder;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod normalizer;
pub mod notifier;
pub mod ops;
pub mod persistence;
pub mod queries;
pub mod render;
pub mod rules;
pub mod scorer;

#[cfg(test)]
mod test_support;

pub use memora_core_types as core_types;

// Re-export commonly used types
pub use apply::{apply, Applied};
pub use authority::{AuthorityDirectory, NoopAuthorityDirectory, StaticAuthorityDirectory};
pub use config::EngineConfig;
pub use errors::{ExError, ExErrorKind, MemoraError, Result};
pub use model::{DecisionEntity, DecisionStatus, EvidenceItem, IngestionEvent, Scope};
pub use notifier::{Notification, NotificationReason, ReviewNotifier};
pub use ops::{ChangeSet, OpContext, Store};
pub use persistence::{RecordingSink, StoreSink};
