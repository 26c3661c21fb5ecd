//! Decision query operations

use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::{MemoraError, Result};
use crate::model::{
    DecisionEntity, DecisionRelationship, DecisionStatus, Platform, Scope, TaskStatus,
    ValidationTask,
};
use crate::ops::Store;

/// Decision with its history length, edges and open tasks
#[derive(Debug, Clone, Serialize)]
pub struct DecisionDetail {
    pub decision: DecisionEntity,
    pub version_count: usize,
    pub outgoing_links: Vec<DecisionRelationship>,
    pub open_tasks: Vec<ValidationTask>,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionFilters {
    pub scope: Option<Scope>,
    pub status: Option<DecisionStatus>,
    pub platform: Option<Platform>,
    pub tag: Option<String>,
}

impl DecisionFilters {
    fn matches(&self, d: &DecisionEntity) -> bool {
        self.scope.as_ref().map_or(true, |s| &d.scope == s)
            && self.status.map_or(true, |s| d.status == s)
            && self.platform.map_or(true, |p| d.platforms().contains(&p))
            && self.tag.as_ref().map_or(true, |t| d.tags.contains(t))
    }
}

/// Cursor pagination
#[derive(Debug, Clone)]
pub struct PaginationParams {
    /// Opaque cursor from a previous page
    pub cursor: Option<String>,
    pub limit: usize,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedDecisions {
    pub items: Vec<DecisionEntity>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Keyed by primary platform
    pub by_platform: BTreeMap<String, usize>,
    /// Mean `confidence.overall`, rounded to 2 places
    pub average_confidence: f64,
    pub pending_validation: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilters {
    pub reviewer: Option<String>,
    pub status: Option<TaskStatus>,
    pub include_resolved: bool,
}

/// # Errors
///
/// Returns `DecisionNotFound` if the decision doesn't exist.
pub fn decision_get(store: &Store, decision_id: &str) -> Result<DecisionDetail> {
    let decision = store.current(decision_id)?.clone();
    Ok(DecisionDetail {
        version_count: store.versions(decision_id)?.len(),
        outgoing_links: store.edges_from(decision_id).cloned().collect(),
        open_tasks: store
            .open_tasks_for(decision_id)
            .into_iter()
            .cloned()
            .collect(),
        decision,
    })
}

/// Current decisions, most recently updated first (ties by id)
///
/// # Errors
///
/// Returns `InvalidInput` if the cursor is malformed.
pub fn decision_list(
    store: &Store,
    filters: &DecisionFilters,
    pagination: &PaginationParams,
) -> Result<PaginatedDecisions> {
    let decisions: BTreeMap<(i64, String), &DecisionEntity> = store
        .list_current()
        .into_iter()
        .filter(|d| filters.matches(d))
        .map(|d| (sort_key(d), d))
        .collect();

    let start = match &pagination.cursor {
        Some(cursor) => Some(decode_cursor(cursor)?),
        None => None,
    };
    let remaining: Vec<&DecisionEntity> = match &start {
        Some(key) => decisions
            .range((
                std::ops::Bound::Excluded(key.clone()),
                std::ops::Bound::Unbounded,
            ))
            .map(|(_, d)| *d)
            .collect(),
        None => decisions.values().copied().collect(),
    };

    let has_more = remaining.len() > pagination.limit;
    let items: Vec<DecisionEntity> = remaining
        .into_iter()
        .take(pagination.limit)
        .cloned()
        .collect();
    let cursor = if has_more {
        items.last().map(|d| encode_cursor(&sort_key(d)))
    } else {
        None
    };
    Ok(PaginatedDecisions {
        items,
        cursor,
        has_more,
    })
}

/// Aggregate counts over current decisions, optionally in one scope
pub fn decision_stats(store: &Store, scope: Option<&Scope>) -> DecisionStats {
    let decisions: Vec<&DecisionEntity> = store
        .list_current()
        .into_iter()
        .filter(|d| scope.map_or(true, |s| &d.scope == s))
        .collect();

    let mut by_status = BTreeMap::new();
    let mut by_platform = BTreeMap::new();
    for d in &decisions {
        *by_status.entry(d.status.to_string()).or_insert(0) += 1;
        if let Some(platform) = d.primary_platform() {
            *by_platform.entry(platform.to_string()).or_insert(0) += 1;
        }
    }
    let average_confidence = if decisions.is_empty() {
        0.0
    } else {
        let mean = decisions.iter().map(|d| d.confidence.overall).sum::<f64>()
            / decisions.len() as f64;
        (mean * 100.0).round() / 100.0
    };
    DecisionStats {
        total: decisions.len(),
        pending_validation: by_status
            .get(DecisionStatus::PendingValidation.as_str())
            .copied()
            .unwrap_or(0),
        by_status,
        by_platform,
        average_confidence,
    }
}

/// Tasks ordered by due date, then id
pub fn task_list(store: &Store, filters: &TaskFilters) -> Vec<ValidationTask> {
    let mut tasks: Vec<ValidationTask> = store
        .tasks()
        .filter(|t| filters.include_resolved || t.is_open())
        .filter(|t| filters.status.map_or(true, |s| t.status == s))
        .filter(|t| {
            filters
                .reviewer
                .as_ref()
                .map_or(true, |r| t.assigned_reviewer.as_ref() == Some(r))
        })
        .cloned()
        .collect();
    tasks.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.task_id.cmp(&b.task_id)));
    tasks
}

/// `"{bucket}:{source_id}"` for every evidence item, in bucket order
pub fn evidence_trace(decision: &DecisionEntity) -> Vec<String> {
    decision
        .evidence
        .iter()
        .map(|(bucket, item)| format!("{}:{}", bucket, item.source_id))
        .collect()
}

fn sort_key(d: &DecisionEntity) -> (i64, String) {
    (-d.updated_at.timestamp_millis(), d.decision_id.clone())
}

fn encode_cursor(key: &(i64, String)) -> String {
    let cursor_data = format!("{}|{}", key.0, key.1);
    base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        cursor_data.as_bytes(),
    )
}

fn decode_cursor(cursor: &str) -> Result<(i64, String)> {
    let invalid = |what: &str| MemoraError::InvalidInput {
        reason: format!("invalid cursor: {}", what),
    };
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, cursor)
        .map_err(|_| invalid("base64 decode failed"))?;
    let cursor_str = String::from_utf8(decoded).map_err(|_| invalid("not UTF-8"))?;
    let (key, decision_id) = cursor_str
        .split_once('|')
        .ok_or_else(|| invalid("wrong format"))?;
    let key = key.parse::<i64>().map_err(|_| invalid("bad timestamp"))?;
    Ok((key, decision_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seeded_store;

    #[test]
    fn test_list_paginates_with_cursor() {
        let store = seeded_store(&["a", "b", "c"]);
        let page = PaginationParams {
            cursor: None,
            limit: 2,
        };
        let first = decision_list(&store, &DecisionFilters::default(), &page).unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);

        let second = decision_list(
            &store,
            &DecisionFilters::default(),
            &PaginationParams {
                cursor: first.cursor.clone(),
                limit: 2,
            },
        )
        .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_more);

        let mut seen: Vec<String> = first
            .items
            .iter()
            .chain(&second.items)
            .map(|d| d.decision_id.clone())
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_bad_cursor_rejected() {
        let store = seeded_store(&["a"]);
        let page = PaginationParams {
            cursor: Some("!!not-base64".to_string()),
            limit: 2,
        };
        assert!(matches!(
            decision_list(&store, &DecisionFilters::default(), &page),
            Err(MemoraError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_stats_counts_by_status_and_platform() {
        let store = seeded_store(&["a", "b"]);
        let stats = decision_stats(&store, None);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get("inferred"), Some(&2));
        assert_eq!(stats.by_platform.get("github"), Some(&2));
        assert_eq!(stats.pending_validation, 0);

        let other = Scope::Workspace("elsewhere".to_string());
        assert_eq!(decision_stats(&store, Some(&other)).total, 0);
    }

    #[test]
    fn test_trace_names_every_item() {
        let store = seeded_store(&["a"]);
        let trace = evidence_trace(store.current("a").unwrap());
        assert_eq!(
            trace,
            vec![
                "intent:github:pr_created:a".to_string(),
                "execution:github:commit_pushed:a".to_string()
            ]
        );
    }
}
