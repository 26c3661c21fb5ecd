//! Persistence seam
//!
//! The engine keeps the authoritative `Store` in memory and hands every
//! committed `ChangeSet` to a sink. A sink must apply a change set
//! atomically (all of it or none of it) and must reject a
//! `DecisionVersion` whose `expected_head` no longer matches storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::errors::{ExError, ExErrorKind};
use crate::model::WeightsConfig;
use crate::ops::{ChangeSet, Store};

pub trait StoreSink: Send + Sync {
    /// Hydrate the full state. `default_weights` seeds an empty store.
    ///
    /// # Errors
    ///
    /// Storage or decoding failures.
    fn load(&self, default_weights: &WeightsConfig) -> Result<Store, ExError>;

    /// Persist one change set atomically
    ///
    /// # Errors
    ///
    /// `VersionConflict` when a head moved underneath; storage failures
    /// otherwise. Nothing is written on error.
    fn commit(&self, changes: &ChangeSet) -> Result<(), ExError>;
}

/// Sink that keeps committed change sets in memory
///
/// `fail_next_commit` makes the next commit fail once, for exercising
/// rollback paths.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commits: Mutex<Vec<ChangeSet>>,
    fail_next: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn commits(&self) -> Vec<ChangeSet> {
        self.commits.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl StoreSink for RecordingSink {
    fn load(&self, default_weights: &WeightsConfig) -> Result<Store, ExError> {
        Ok(Store::new(default_weights.clone()))
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), ExError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ExError::new(ExErrorKind::Persistence)
                .with_op("commit")
                .with_message("injected commit failure"));
        }
        self.commits
            .lock()
            .map_err(|_| {
                ExError::new(ExErrorKind::Concurrency).with_message("sink lock poisoned")
            })?
            .push(changes.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_fails_once_on_request() {
        let sink = RecordingSink::new();
        sink.fail_next_commit();
        let err = sink.commit(&ChangeSet::new()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
        sink.commit(&ChangeSet::new()).unwrap();
        assert_eq!(sink.commits().len(), 1);
    }
}
