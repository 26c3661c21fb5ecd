//! Decision domain model
//!
//! A decision is identified by a stable `decision_id` and evolves through
//! immutable versions. Every version carries its evidence buckets, its own
//! confidence score and its lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::confidence::ConfidenceScore;
use super::evidence::{EvidenceItem, Platform};
use crate::errors::MemoraError;

/// Lifecycle status of a decision version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Inferred,
    PendingValidation,
    Validated,
    Disputed,
    Superseded,
    Archived,
}

impl DecisionStatus {
    pub const ALL: [DecisionStatus; 6] = [
        DecisionStatus::Inferred,
        DecisionStatus::PendingValidation,
        DecisionStatus::Validated,
        DecisionStatus::Disputed,
        DecisionStatus::Superseded,
        DecisionStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Inferred => "inferred",
            DecisionStatus::PendingValidation => "pending_validation",
            DecisionStatus::Validated => "validated",
            DecisionStatus::Disputed => "disputed",
            DecisionStatus::Superseded => "superseded",
            DecisionStatus::Archived => "archived",
        }
    }

    /// Allowed edges of the lifecycle state machine
    ///
    /// `archived` is terminal. Any live status may be superseded or archived
    /// (deletion requests archive). Human feedback moves between the review
    /// states.
    pub fn can_transition_to(&self, next: DecisionStatus) -> bool {
        use DecisionStatus::*;
        match (self, next) {
            (Archived, _) => false,
            (_, Archived) => true,
            (Superseded, _) => false,
            (_, Superseded) => true,
            (Inferred, PendingValidation | Validated) => true,
            (PendingValidation, Validated | Disputed) => true,
            (Disputed, Validated | Disputed) => true,
            _ => false,
        }
    }

    /// A human still has to act on the decision
    pub fn awaits_review(&self) -> bool {
        matches!(
            self,
            DecisionStatus::PendingValidation | DecisionStatus::Disputed
        )
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, DecisionStatus::Superseded | DecisionStatus::Archived)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStatus {
    type Err = MemoraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecisionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| MemoraError::InvalidInput {
                reason: format!("unknown decision status '{}'", s),
            })
    }
}

/// The four evidence buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceBucket {
    Intent,
    Execution,
    Authority,
    Outcomes,
}

impl EvidenceBucket {
    pub const ALL: [EvidenceBucket; 4] = [
        EvidenceBucket::Intent,
        EvidenceBucket::Execution,
        EvidenceBucket::Authority,
        EvidenceBucket::Outcomes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceBucket::Intent => "intent",
            EvidenceBucket::Execution => "execution",
            EvidenceBucket::Authority => "authority",
            EvidenceBucket::Outcomes => "outcomes",
        }
    }
}

impl fmt::Display for EvidenceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence grouped by role; each bucket keeps arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBuckets {
    pub intent: Vec<EvidenceItem>,
    pub execution: Vec<EvidenceItem>,
    pub authority: Vec<EvidenceItem>,
    pub outcomes: Vec<EvidenceItem>,
}

impl EvidenceBuckets {
    pub fn get(&self, bucket: EvidenceBucket) -> &[EvidenceItem] {
        match bucket {
            EvidenceBucket::Intent => &self.intent,
            EvidenceBucket::Execution => &self.execution,
            EvidenceBucket::Authority => &self.authority,
            EvidenceBucket::Outcomes => &self.outcomes,
        }
    }

    fn get_mut(&mut self, bucket: EvidenceBucket) -> &mut Vec<EvidenceItem> {
        match bucket {
            EvidenceBucket::Intent => &mut self.intent,
            EvidenceBucket::Execution => &mut self.execution,
            EvidenceBucket::Authority => &mut self.authority,
            EvidenceBucket::Outcomes => &mut self.outcomes,
        }
    }

    /// Append unless an item with the same `source_id` is already present
    /// in any bucket. Returns whether the item was added.
    pub fn push(&mut self, bucket: EvidenceBucket, item: EvidenceItem) -> bool {
        if self.contains(&item.source_id) {
            return false;
        }
        self.get_mut(bucket).push(item);
        true
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.iter().any(|(_, item)| item.source_id == source_id)
    }

    /// All items tagged with their bucket, bucket by bucket
    pub fn iter(&self) -> impl Iterator<Item = (EvidenceBucket, &EvidenceItem)> {
        EvidenceBucket::ALL
            .into_iter()
            .flat_map(move |b| self.get(b).iter().map(move |item| (b, item)))
    }

    pub fn len(&self) -> usize {
        EvidenceBucket::ALL.iter().map(|b| self.get(*b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A decision needs intent or execution evidence to exist at all
    pub fn has_intent_or_execution(&self) -> bool {
        !self.intent.is_empty() || !self.execution.is_empty()
    }
}

/// Scoping key: a repository or a workspace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Repository(String),
    Workspace(String),
}

impl Scope {
    pub fn key(&self) -> &str {
        match self {
            Scope::Repository(k) | Scope::Workspace(k) => k,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Repository(r) => write!(f, "repository:{}", r),
            Scope::Workspace(w) => write!(f, "workspace:{}", w),
        }
    }
}

impl FromStr for Scope {
    type Err = MemoraError;

    /// Parses `repository:<name>` or `workspace:<id>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("repository", rest)) if !rest.is_empty() => Ok(Scope::Repository(rest.to_string())),
            Some(("workspace", rest)) if !rest.is_empty() => Ok(Scope::Workspace(rest.to_string())),
            _ => Err(MemoraError::InvalidInput {
                reason: format!(
                    "scope '{}' must look like repository:<name> or workspace:<id>",
                    s
                ),
            }),
        }
    }
}

/// Identity recorded when an automatic policy validates a decision
pub const AUTO_ACCEPT_VALIDATOR: &str = "policy:auto_accept";

/// Identity recorded as the inferring component
pub const INFERRED_BY: &str = "decision_inference_engine";

/// One version of a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntity {
    /// Stable across versions
    pub decision_id: String,
    /// Monotonic, starting at 1
    pub version: u32,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub alternatives_considered: Vec<String>,
    pub evidence: EvidenceBuckets,
    pub confidence: ConfidenceScore,
    pub status: DecisionStatus,
    pub participants: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Symmetric with the related decision's set
    pub related_decision_ids: BTreeSet<String>,
    pub superseded_by: Option<String>,
    pub supersedes: Option<String>,
    /// Ingestion events this version was inferred from
    pub source_event_ids: Vec<String>,
    pub inferred_by: String,
    /// Reviewer (or policy) that confirmed the decision
    pub validated_by: Option<String>,
}

impl DecisionEntity {
    /// Distinct platforms across all evidence, sorted
    pub fn platforms(&self) -> BTreeSet<Platform> {
        self.evidence.iter().map(|(_, item)| item.platform).collect()
    }

    /// Primary platform: the platform of the earliest evidence item
    pub fn primary_platform(&self) -> Option<Platform> {
        self.evidence
            .iter()
            .min_by_key(|(_, item)| item.timestamp)
            .map(|(_, item)| item.platform)
    }

    /// Text pushed to the semantic index
    pub fn index_document(&self) -> String {
        let evidence: Vec<String> = self
            .evidence
            .iter()
            .map(|(bucket, item)| format!("[{}] {}", bucket, item.content))
            .collect();
        let evidence = if evidence.is_empty() {
            "No evidence captured.".to_string()
        } else {
            evidence.join(" | ")
        };
        format!(
            "{}\n{}\n{}\n{}",
            self.title, self.description, self.rationale, evidence
        )
    }

    /// Copy of this version as the starting point for `version + 1`
    pub fn next_version(&self, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next.updated_at = at;
        next
    }
}

impl fmt::Display for DecisionEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@v{} [{}] {} (confidence {:.2})",
            self.decision_id, self.version, self.status, self.title, self.confidence.overall
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::evidence::SourceType;

    fn item(id: &str, content: &str) -> EvidenceItem {
        EvidenceItem::new(
            SourceType::PrComment,
            id.to_string(),
            content.to_string(),
            "alice".to_string(),
            Utc::now(),
            Platform::Github,
            None,
        )
    }

    #[test]
    fn test_archived_is_terminal() {
        for next in DecisionStatus::ALL {
            assert!(!DecisionStatus::Archived.can_transition_to(next));
        }
    }

    #[test]
    fn test_review_transitions() {
        use DecisionStatus::*;
        assert!(Inferred.can_transition_to(PendingValidation));
        assert!(PendingValidation.can_transition_to(Validated));
        assert!(PendingValidation.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Validated));
        assert!(Validated.can_transition_to(Superseded));
        assert!(Superseded.can_transition_to(Archived));
        assert!(!Validated.can_transition_to(PendingValidation));
        assert!(!Superseded.can_transition_to(Validated));
        assert!(!Inferred.can_transition_to(Disputed));
    }

    #[test]
    fn test_status_parses_from_wire_name() {
        for status in DecisionStatus::ALL {
            assert_eq!(status.as_str().parse::<DecisionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_bucket_push_deduplicates_by_source_id() {
        let mut buckets = EvidenceBuckets::default();
        assert!(buckets.push(EvidenceBucket::Intent, item("a", "x")));
        assert!(!buckets.push(EvidenceBucket::Execution, item("a", "x")));
        assert_eq!(buckets.len(), 1);
        assert!(buckets.has_intent_or_execution());
    }

    #[test]
    fn test_scope_parse_and_display() {
        let scope: Scope = "repository:acme/api".parse().unwrap();
        assert_eq!(scope, Scope::Repository("acme/api".to_string()));
        assert_eq!(scope.to_string(), "repository:acme/api");
        assert!("team:x".parse::<Scope>().is_err());
        assert!("workspace:".parse::<Scope>().is_err());
    }
}
