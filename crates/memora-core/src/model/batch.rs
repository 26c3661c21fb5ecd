//! Evidence batches awaiting inference
//!
//! A batch is stored from the moment it is queued until inference settles
//! it, so a restart never loses evidence that was accepted but not yet
//! inferred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::Scope;
use super::evidence::EvidenceItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Queued,
    /// Provider unavailable or queue overflow; retried on a backoff schedule
    InferenceDeferred,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Queued => "queued",
            BatchStatus::InferenceDeferred => "inference_deferred",
        }
    }
}

/// A group of evidence items inferred together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBatch {
    pub batch_id: String,
    pub scope: Scope,
    pub items: Vec<EvidenceItem>,
    pub source_event_ids: Vec<String>,
    pub status: BatchStatus,
    pub enqueued_at: DateTime<Utc>,
    /// Completed dispatch attempts that ended in deferral
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl EvidenceBatch {
    pub fn new(
        batch_id: String,
        scope: Scope,
        items: Vec<EvidenceItem>,
        source_event_ids: Vec<String>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id,
            scope,
            items,
            source_event_ids,
            status: BatchStatus::Queued,
            enqueued_at,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.status == BatchStatus::InferenceDeferred
    }

    /// Mark deferred until `retry_at`
    pub fn defer(&mut self, reason: impl Into<String>, retry_at: DateTime<Utc>) {
        self.status = BatchStatus::InferenceDeferred;
        self.attempts += 1;
        self.next_attempt_at = Some(retry_at);
        self.last_error = Some(reason.into());
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_attempt_at {
            Some(at) => now >= at,
            None => true,
        }
    }
}
