//! Change journal
//!
//! Every mutating `Store` method appends a `Change`. A persistence sink
//! replays the journal in order inside one transaction, so a committed
//! `ChangeSet` is exactly the difference between two published states.

use crate::model::{
    CalibrationEvent, DecisionEntity, DecisionRelationship, EvidenceBatch, EvidenceItem,
    ValidationSample, ValidationTask, WeightsConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A new decision version. `expected_head` is the version it was built
    /// on (`None` for version 1); sinks compare-and-swap on it.
    DecisionVersion {
        entity: DecisionEntity,
        expected_head: Option<u32>,
    },
    /// Graph pointers of the current version changed in place; sinks apply
    /// it only while `entity.version` is the stored head
    DecisionPointers { entity: DecisionEntity },
    EdgePut(DecisionRelationship),
    EdgeRemoved {
        source_decision_id: String,
        target_decision_id: String,
    },
    EvidenceRegistered(EvidenceItem),
    TaskPut(ValidationTask),
    SampleAppended(ValidationSample),
    CalibrationRecorded(CalibrationEvent),
    WeightsPublished(WeightsConfig),
    BatchPut(EvidenceBatch),
    BatchRemoved { batch_id: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Decision ids written in this change set, sorted and unique
    pub fn touched_decisions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .changes
            .iter()
            .flat_map(|c| match c {
                Change::DecisionVersion { entity, .. } | Change::DecisionPointers { entity } => {
                    vec![entity.decision_id.clone()]
                }
                Change::EdgePut(edge) => vec![
                    edge.source_decision_id.clone(),
                    edge.target_decision_id.clone(),
                ],
                Change::EdgeRemoved {
                    source_decision_id,
                    target_decision_id,
                } => vec![source_decision_id.clone(), target_decision_id.clone()],
                Change::TaskPut(task) => vec![task.decision_id.clone()],
                _ => Vec::new(),
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
