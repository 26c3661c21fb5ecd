pub mod changes;
pub mod decision_ops;
pub mod graph_ops;
pub mod store;
pub mod validation_ops;

use chrono::{DateTime, Utc};

use crate::authority::AuthorityDirectory;
use crate::config::EngineConfig;

pub use changes::{Change, ChangeSet};
pub use store::{GraphPointers, Store};

/// Collaborators shared by every mutating operation
#[derive(Clone, Copy)]
pub struct OpContext<'a> {
    pub config: &'a EngineConfig,
    pub authority: &'a dyn AuthorityDirectory,
    pub now: DateTime<Utc>,
}

impl<'a> OpContext<'a> {
    pub fn new(
        config: &'a EngineConfig,
        authority: &'a dyn AuthorityDirectory,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            authority,
            now,
        }
    }
}
