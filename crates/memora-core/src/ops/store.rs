use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::errors::{MemoraError, Result};
use crate::model::{
    CalibrationEvent, DecisionEntity, DecisionRelationship, EvidenceBatch, EvidenceItem,
    FactorWeights, ValidationSample, ValidationTask, WeightsConfig,
};
use crate::ops::changes::{Change, ChangeSet};

/// In-memory state of the decision graph
///
/// Decisions are kept as full version histories; the last entry is the
/// current version. Every mutating method records a [`Change`] in the
/// store's journal, drained with [`Store::take_changes`].
///
/// Not thread-safe on its own. The engine wraps it in a lock and mutates a
/// clone, publishing the clone only after it has been persisted.
///
/// Cloning is cheap: every collection, and each decision's history, sits
/// behind an `Arc` and is copied on first write. A clone that changes one
/// decision copies that history plus the outer decision map, and shares
/// everything else with the original.
#[derive(Debug, Clone)]
pub struct Store {
    /// decision_id -> versions 1..=N
    decisions: Arc<BTreeMap<String, Arc<Vec<DecisionEntity>>>>,
    /// (source, target) -> edge
    edges: Arc<BTreeMap<(String, String), DecisionRelationship>>,
    /// source_id -> item, shared by every decision that references it
    evidence: Arc<BTreeMap<String, EvidenceItem>>,
    tasks: Arc<BTreeMap<String, ValidationTask>>,
    /// decision_id -> task ids
    tasks_by_decision: Arc<BTreeMap<String, BTreeSet<String>>>,
    validation_history: Arc<Vec<ValidationSample>>,
    calibration_log: Arc<Vec<CalibrationEvent>>,
    /// Every published weight configuration; the last is current
    weights: Arc<Vec<WeightsConfig>>,
    batches: Arc<BTreeMap<String, EvidenceBatch>>,
    journal: ChangeSet,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(WeightsConfig {
            version: 1,
            weights: FactorWeights::defaults(),
            created_at: Utc::now(),
        })
    }
}

impl Store {
    /// Empty store whose scoring starts from `weights`
    pub fn new(weights: WeightsConfig) -> Self {
        Self {
            decisions: Arc::default(),
            edges: Arc::default(),
            evidence: Arc::default(),
            tasks: Arc::default(),
            tasks_by_decision: Arc::default(),
            validation_history: Arc::default(),
            calibration_log: Arc::default(),
            weights: Arc::new(vec![weights]),
            batches: Arc::default(),
            journal: ChangeSet::new(),
        }
    }

    // ---------- decisions ----------

    /// Current version of a decision
    ///
    /// # Errors
    ///
    /// Returns `DecisionNotFound` if the id is unknown.
    pub fn current(&self, decision_id: &str) -> Result<&DecisionEntity> {
        self.decisions
            .get(decision_id)
            .and_then(|versions| versions.last())
            .ok_or_else(|| MemoraError::DecisionNotFound {
                decision_id: decision_id.to_string(),
            })
    }

    /// Current version number, `None` if the decision does not exist
    pub fn head(&self, decision_id: &str) -> Option<u32> {
        self.decisions
            .get(decision_id)
            .and_then(|versions| versions.last())
            .map(|d| d.version)
    }

    /// A retained version
    ///
    /// # Errors
    ///
    /// Returns `DecisionNotFound` or `VersionNotFound`.
    pub fn version(&self, decision_id: &str, version: u32) -> Result<&DecisionEntity> {
        self.versions(decision_id)?
            .iter()
            .find(|d| d.version == version)
            .ok_or_else(|| MemoraError::VersionNotFound {
                decision_id: decision_id.to_string(),
                version,
            })
    }

    /// Every retained version, oldest first
    ///
    /// # Errors
    ///
    /// Returns `DecisionNotFound` if the id is unknown.
    pub fn versions(&self, decision_id: &str) -> Result<&[DecisionEntity]> {
        self.decisions
            .get(decision_id)
            .map(|versions| versions.as_slice())
            .ok_or_else(|| MemoraError::DecisionNotFound {
                decision_id: decision_id.to_string(),
            })
    }

    pub fn contains_decision(&self, decision_id: &str) -> bool {
        self.decisions.contains_key(decision_id)
    }

    /// Current versions of every decision, ordered by id
    pub fn list_current(&self) -> Vec<&DecisionEntity> {
        self.decisions.values().filter_map(|v| v.last()).collect()
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    /// Append the next version of a decision
    ///
    /// `entity.version` must be exactly one past the current head (or 1 for
    /// a new decision). Evidence items are registered as a side effect.
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` if the version does not follow the head.
    pub fn push_version(&mut self, entity: DecisionEntity) -> Result<()> {
        let head = self.head(&entity.decision_id);
        let expected = head.map_or(1, |h| h + 1);
        if entity.version != expected {
            return Err(MemoraError::VersionConflict {
                decision_id: entity.decision_id.clone(),
                expected: head,
                actual: Some(entity.version.saturating_sub(1)),
            });
        }
        let items: Vec<EvidenceItem> = entity.evidence.iter().map(|(_, i)| i.clone()).collect();
        for item in items {
            self.register_evidence(item);
        }
        self.journal.push(Change::DecisionVersion {
            entity: entity.clone(),
            expected_head: head,
        });
        let versions = Arc::make_mut(&mut self.decisions)
            .entry(entity.decision_id.clone())
            .or_default();
        Arc::make_mut(versions).push(entity);
        Ok(())
    }

    /// Mutate the graph pointers of the current version in place
    ///
    /// Only `related_decision_ids`, `supersedes` and `superseded_by` may be
    /// changed this way; anything else takes a new version. Pointers mirror
    /// the edge table rather than the reviewed content, so linking does not
    /// move the version a reviewer is looking at. The change is journaled
    /// as [`Change::DecisionPointers`] and a sink applies it only while this
    /// version is still the head.
    ///
    /// # Errors
    ///
    /// Returns `DecisionNotFound` if the id is unknown.
    pub fn update_pointers(
        &mut self,
        decision_id: &str,
        f: impl FnOnce(&mut GraphPointers<'_>),
    ) -> Result<()> {
        let current = Arc::make_mut(&mut self.decisions)
            .get_mut(decision_id)
            .and_then(|versions| Arc::make_mut(versions).last_mut())
            .ok_or_else(|| MemoraError::DecisionNotFound {
                decision_id: decision_id.to_string(),
            })?;
        f(&mut GraphPointers {
            related_decision_ids: &mut current.related_decision_ids,
            supersedes: &mut current.supersedes,
            superseded_by: &mut current.superseded_by,
        });
        self.journal.push(Change::DecisionPointers {
            entity: current.clone(),
        });
        Ok(())
    }

    // ---------- edges ----------

    pub fn edge(&self, source_id: &str, target_id: &str) -> Option<&DecisionRelationship> {
        self.edges
            .get(&(source_id.to_string(), target_id.to_string()))
    }

    /// Every stored edge, ordered by (source, target)
    pub fn edges(&self) -> impl Iterator<Item = &DecisionRelationship> {
        self.edges.values()
    }

    /// Outgoing edges of a decision, ordered by target
    pub fn edges_from<'a>(
        &'a self,
        source_id: &'a str,
    ) -> impl Iterator<Item = &'a DecisionRelationship> + 'a {
        self.edges
            .range((source_id.to_string(), String::new())..)
            .take_while(move |((s, _), _)| s == source_id)
            .map(|(_, edge)| edge)
    }

    pub fn put_edge(&mut self, edge: DecisionRelationship) {
        self.journal.push(Change::EdgePut(edge.clone()));
        Arc::make_mut(&mut self.edges).insert(edge.key(), edge);
    }

    pub fn remove_edge(&mut self, source_id: &str, target_id: &str) -> Option<DecisionRelationship> {
        let key = (source_id.to_string(), target_id.to_string());
        if !self.edges.contains_key(&key) {
            return None;
        }
        let removed = Arc::make_mut(&mut self.edges).remove(&key);
        if removed.is_some() {
            self.journal.push(Change::EdgeRemoved {
                source_decision_id: source_id.to_string(),
                target_decision_id: target_id.to_string(),
            });
        }
        removed
    }

    // ---------- evidence ----------

    pub fn evidence(&self, source_id: &str) -> Option<&EvidenceItem> {
        self.evidence.get(source_id)
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }

    /// Register an item. Items are immutable: an already-known `source_id`
    /// keeps its first content.
    pub fn register_evidence(&mut self, item: EvidenceItem) -> bool {
        if self.evidence.contains_key(&item.source_id) {
            return false;
        }
        self.journal.push(Change::EvidenceRegistered(item.clone()));
        Arc::make_mut(&mut self.evidence).insert(item.source_id.clone(), item);
        true
    }

    // ---------- tasks ----------

    /// # Errors
    ///
    /// Returns `TaskNotFound` if the id is unknown.
    pub fn task(&self, task_id: &str) -> Result<&ValidationTask> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| MemoraError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Every task, ordered by id (ids are time-ordered)
    pub fn tasks(&self) -> impl Iterator<Item = &ValidationTask> {
        self.tasks.values()
    }

    /// Tasks of one decision, ordered by id
    pub fn tasks_for<'a>(&'a self, decision_id: &str) -> impl Iterator<Item = &'a ValidationTask> + 'a {
        self.tasks_by_decision
            .get(decision_id)
            .into_iter()
            .flatten()
            .filter_map(move |task_id| self.tasks.get(task_id))
    }

    pub fn open_tasks_for(&self, decision_id: &str) -> Vec<&ValidationTask> {
        self.tasks_for(decision_id).filter(|t| t.is_open()).collect()
    }

    /// Open tasks currently assigned to a reviewer
    pub fn open_task_count(&self, reviewer: &str) -> usize {
        self.tasks
            .values()
            .filter(|t| t.is_open() && t.assigned_reviewer.as_deref() == Some(reviewer))
            .count()
    }

    pub fn put_task(&mut self, task: ValidationTask) {
        self.journal.push(Change::TaskPut(task.clone()));
        let indexed = self
            .tasks_by_decision
            .get(&task.decision_id)
            .is_some_and(|ids| ids.contains(&task.task_id));
        if !indexed {
            Arc::make_mut(&mut self.tasks_by_decision)
                .entry(task.decision_id.clone())
                .or_default()
                .insert(task.task_id.clone());
        }
        Arc::make_mut(&mut self.tasks).insert(task.task_id.clone(), task);
    }

    // ---------- scoring history ----------

    /// Weight configuration used for new scores
    pub fn weights(&self) -> &WeightsConfig {
        // never empty: seeded in `new`, only ever appended to
        &self.weights[self.weights.len() - 1]
    }

    pub fn weights_history(&self) -> &[WeightsConfig] {
        &self.weights
    }

    /// Publish a new weight configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidWeights` if the version does not follow the current
    /// one or the weights fail validation.
    pub fn publish_weights(&mut self, config: WeightsConfig) -> Result<()> {
        config.weights.validate()?;
        let current = self.weights().version;
        if config.version <= current {
            return Err(MemoraError::InvalidWeights {
                reason: format!(
                    "weights version {} does not follow current version {}",
                    config.version, current
                ),
            });
        }
        self.journal.push(Change::WeightsPublished(config.clone()));
        Arc::make_mut(&mut self.weights).push(config);
        Ok(())
    }

    pub fn validation_history(&self) -> &[ValidationSample] {
        &self.validation_history
    }

    pub fn push_sample(&mut self, sample: ValidationSample) {
        self.journal.push(Change::SampleAppended(sample.clone()));
        Arc::make_mut(&mut self.validation_history).push(sample);
    }

    pub fn calibration_log(&self) -> &[CalibrationEvent] {
        &self.calibration_log
    }

    pub fn push_calibration(&mut self, event: CalibrationEvent) {
        self.journal.push(Change::CalibrationRecorded(event.clone()));
        Arc::make_mut(&mut self.calibration_log).push(event);
    }

    // ---------- pending inference batches ----------

    pub fn pending_batches(&self) -> impl Iterator<Item = &EvidenceBatch> {
        self.batches.values()
    }

    pub fn put_batch(&mut self, batch: EvidenceBatch) {
        self.journal.push(Change::BatchPut(batch.clone()));
        Arc::make_mut(&mut self.batches).insert(batch.batch_id.clone(), batch);
    }

    pub fn remove_batch(&mut self, batch_id: &str) -> Option<EvidenceBatch> {
        if !self.batches.contains_key(batch_id) {
            return None;
        }
        let removed = Arc::make_mut(&mut self.batches).remove(batch_id);
        if removed.is_some() {
            self.journal.push(Change::BatchRemoved {
                batch_id: batch_id.to_string(),
            });
        }
        removed
    }

    // ---------- journal ----------

    /// Drain the change journal
    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.journal)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.journal.is_empty()
    }
}

/// Mutable view of the graph pointers on a current version
pub struct GraphPointers<'a> {
    pub related_decision_ids: &'a mut BTreeSet<String>,
    pub supersedes: &'a mut Option<String>,
    pub superseded_by: &'a mut Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::decision;

    #[test]
    fn test_new_store_is_empty() {
        let store = Store::default();
        assert_eq!(store.decision_count(), 0);
        assert_eq!(store.weights().version, 1);
        assert!(!store.has_pending_changes());
    }

    #[test]
    fn test_push_version_keeps_history() {
        let mut store = Store::default();
        let v1 = decision("dec-1");
        store.push_version(v1.clone()).unwrap();
        store.push_version(v1.next_version(Utc::now())).unwrap();

        assert_eq!(store.head("dec-1"), Some(2));
        assert_eq!(store.versions("dec-1").unwrap().len(), 2);
        assert_eq!(store.version("dec-1", 1).unwrap(), &v1);
        assert_eq!(store.current("dec-1").unwrap().version, 2);
    }

    #[test]
    fn test_push_version_rejects_gaps() {
        let mut store = Store::default();
        let mut d = decision("dec-1");
        d.version = 3;
        assert!(matches!(
            store.push_version(d),
            Err(MemoraError::VersionConflict { .. })
        ));
    }

    #[test]
    fn test_mutations_are_journaled() {
        let mut store = Store::default();
        store.push_version(decision("dec-1")).unwrap();
        let changes = store.take_changes();
        assert!(changes
            .iter()
            .any(|c| matches!(c, Change::DecisionVersion { expected_head: None, .. })));
        assert!(changes
            .iter()
            .any(|c| matches!(c, Change::EvidenceRegistered(_))));
        assert!(!store.has_pending_changes());
        assert_eq!(changes.touched_decisions(), vec!["dec-1".to_string()]);
    }

    #[test]
    fn test_update_pointers_is_in_place() {
        let mut store = Store::default();
        store.push_version(decision("dec-1")).unwrap();
        store
            .update_pointers("dec-1", |p| {
                p.related_decision_ids.insert("dec-2".to_string());
            })
            .unwrap();
        let current = store.current("dec-1").unwrap();
        assert_eq!(current.version, 1);
        assert!(current.related_decision_ids.contains("dec-2"));
    }

    #[test]
    fn test_clone_copies_only_what_it_writes() {
        let mut base = Store::default();
        base.push_version(decision("dec-1")).unwrap();
        base.push_version(decision("dec-2")).unwrap();
        base.take_changes();

        let mut draft = base.clone();
        let next = draft.current("dec-1").unwrap().next_version(Utc::now());
        draft.push_version(next).unwrap();

        let shared = |id: &str| {
            std::ptr::eq(
                base.versions(id).unwrap().as_ptr(),
                draft.versions(id).unwrap().as_ptr(),
            )
        };
        assert!(shared("dec-2"));
        assert!(!shared("dec-1"));
        assert_eq!(base.head("dec-1"), Some(1));
        assert_eq!(draft.head("dec-1"), Some(2));
    }

    #[test]
    fn test_unknown_decision() {
        let store = Store::default();
        assert!(matches!(
            store.current("nope"),
            Err(MemoraError::DecisionNotFound { .. })
        ));
    }

    #[test]
    fn test_weights_only_move_forward() {
        let mut store = Store::default();
        let same = store.weights().clone();
        assert!(store.publish_weights(same).is_err());
        let next = store.weights().next(FactorWeights::defaults(), Utc::now());
        store.publish_weights(next).unwrap();
        assert_eq!(store.weights().version, 2);
        assert_eq!(store.weights_history().len(), 2);
    }
}
