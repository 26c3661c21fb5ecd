//! Decision version operations
//!
//! The only writers of decision versions. Each function checks the caller's
//! base version, builds the next version from the current one, rescores it
//! with the store's current weights and appends it.

use crate::builder;
use crate::errors::{MemoraError, Result};
use crate::model::{DecisionEntity, DecisionStatus, EvidenceItem};
use crate::ops::{OpContext, Store};
use crate::scorer;

/// Fail with `VersionConflict` unless `base_version` is the current head
///
/// # Errors
///
/// `VersionConflict` when the head differs (including "exists" when
/// `base_version` is `None`).
pub fn check_base_version(
    store: &Store,
    decision_id: &str,
    base_version: Option<u32>,
) -> Result<()> {
    let head = store.head(decision_id);
    if head != base_version {
        return Err(MemoraError::VersionConflict {
            decision_id: decision_id.to_string(),
            expected: base_version,
            actual: head,
        });
    }
    Ok(())
}

/// Versioned upsert
///
/// `base_version = None` creates version 1 and fails if the id exists.
/// `Some(n)` creates version `n + 1` and fails unless `n` is the current
/// version. The caller's confidence is discarded and recomputed. Graph
/// pointers are carried over from the current version (or cleared for a new
/// decision): they change only through `graph_ops`.
///
/// # Errors
///
/// * `VersionConflict` - stale or unexpected base version
/// * `InsufficientEvidence` - no intent and no execution evidence
/// * `InvalidTransition` - the status change is not a lifecycle edge
/// * `InvalidInput` - blank title
pub fn upsert_decision(
    store: &mut Store,
    ctx: &OpContext<'_>,
    mut decision: DecisionEntity,
    base_version: Option<u32>,
) -> Result<u32> {
    check_base_version(store, &decision.decision_id, base_version)?;

    if decision.title.trim().is_empty() {
        return Err(MemoraError::InvalidInput {
            reason: "decision title cannot be empty".to_string(),
        });
    }
    if !decision.evidence.has_intent_or_execution() {
        return Err(MemoraError::InsufficientEvidence);
    }

    match base_version {
        None => {
            if !decision.status.is_live() {
                return Err(MemoraError::InvalidTransition {
                    decision_id: decision.decision_id.clone(),
                    from: "none".to_string(),
                    to: decision.status.to_string(),
                });
            }
            decision.version = 1;
            decision.created_at = ctx.now;
            decision.related_decision_ids.clear();
            decision.supersedes = None;
            decision.superseded_by = None;
        }
        Some(base) => {
            let current = store.current(&decision.decision_id)?;
            if decision.status != current.status
                && !current.status.can_transition_to(decision.status)
            {
                return Err(MemoraError::InvalidTransition {
                    decision_id: decision.decision_id.clone(),
                    from: current.status.to_string(),
                    to: decision.status.to_string(),
                });
            }
            decision.version = base + 1;
            decision.created_at = current.created_at;
            decision.related_decision_ids = current.related_decision_ids.clone();
            decision.supersedes = current.supersedes.clone();
            decision.superseded_by = current.superseded_by.clone();
        }
    }
    decision.updated_at = ctx.now;
    scorer::rescore(&mut decision, store.weights(), ctx.authority);

    let version = decision.version;
    store.push_version(decision)?;
    Ok(version)
}

/// Append corroborating evidence as a new version
///
/// Items are appended in arrival order. Items whose content names the
/// decision land in `outcomes`; the rest are classified as at build time.
/// Items already attached (same `source_id`) are skipped. Status is left to
/// the workflow.
///
/// Returns the new version, or `None` when every item was already attached.
///
/// # Errors
///
/// `DecisionNotFound`, or `VersionConflict` on a stale base version.
pub fn attach_evidence(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
    base_version: u32,
    items: &[EvidenceItem],
) -> Result<Option<u32>> {
    let current = store.current(decision_id)?;
    check_base_version(store, decision_id, Some(base_version))?;

    let mut next = current.next_version(ctx.now);
    let mut added = 0;
    for item in items {
        let bucket = builder::classify_followup(item, decision_id);
        if next.evidence.push(bucket, item.clone()) {
            added += 1;
        }
    }
    if added == 0 {
        return Ok(None);
    }
    tracing::debug!(decision_id, added, version = next.version, "evidence attached");

    scorer::rescore(&mut next, store.weights(), ctx.authority);
    let version = next.version;
    store.push_version(next)?;
    Ok(Some(version))
}

/// New version of the current decision with a different status
///
/// # Errors
///
/// `DecisionNotFound`, or `InvalidTransition` if the lifecycle forbids the
/// change.
pub fn transition(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
    status: DecisionStatus,
    validated_by: Option<&str>,
) -> Result<u32> {
    let current = store.current(decision_id)?;
    if !current.status.can_transition_to(status) {
        return Err(MemoraError::InvalidTransition {
            decision_id: decision_id.to_string(),
            from: current.status.to_string(),
            to: status.to_string(),
        });
    }
    let mut next = current.next_version(ctx.now);
    next.status = status;
    if let Some(by) = validated_by {
        next.validated_by = Some(by.to_string());
    }
    scorer::rescore(&mut next, store.weights(), ctx.authority);
    let version = next.version;
    store.push_version(next)?;
    Ok(version)
}
