//! Knowledge graph operations
//!
//! Edges are always written and removed in mirrored pairs within a single
//! store mutation; together with the engine's commit-then-publish step no
//! half edge is ever observable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::errors::{MemoraError, Result};
use crate::model::{DecisionEntity, DecisionRelationship, DecisionStatus, RelationshipType};
use crate::ops::{decision_ops, validation_ops, OpContext, Store};

/// A decision reached by `find_related`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedDecision {
    pub decision_id: String,
    /// Hops from the start decision
    pub depth: usize,
    /// Type of the last edge on the strongest path
    pub relationship_type: RelationshipType,
    /// Product of edge strengths along the strongest path
    pub strength: f64,
    pub updated_at: DateTime<Utc>,
}

/// Current version of a decision
///
/// # Errors
///
/// `DecisionNotFound` if the id is unknown.
pub fn get(store: &Store, decision_id: &str) -> Result<DecisionEntity> {
    store.current(decision_id).cloned()
}

/// Link two decisions, writing both directions
///
/// # Errors
///
/// * `SelfLink` - `a_id == b_id`
/// * `InvalidStrength` - strength outside [0, 1]
/// * `DecisionNotFound` - either endpoint is unknown
/// * `InvalidInput` - an evidence id names no registered item
/// * `DuplicateLink` - an edge already joins the pair
pub fn link(
    store: &mut Store,
    a_id: &str,
    b_id: &str,
    relationship_type: RelationshipType,
    strength: f64,
    evidence: Vec<String>,
    now: DateTime<Utc>,
) -> Result<DecisionRelationship> {
    if a_id == b_id {
        return Err(MemoraError::SelfLink {
            decision_id: a_id.to_string(),
        });
    }
    if !(0.0..=1.0).contains(&strength) {
        return Err(MemoraError::InvalidStrength { strength });
    }
    store.current(a_id)?;
    store.current(b_id)?;
    if let Some(unknown) = evidence.iter().find(|id| store.evidence(id).is_none()) {
        return Err(MemoraError::InvalidInput {
            reason: format!("link evidence {} is not a registered item", unknown),
        });
    }
    if store.edge(a_id, b_id).is_some() || store.edge(b_id, a_id).is_some() {
        return Err(MemoraError::DuplicateLink {
            source_id: a_id.to_string(),
            target_id: b_id.to_string(),
        });
    }

    let forward = DecisionRelationship {
        source_decision_id: a_id.to_string(),
        target_decision_id: b_id.to_string(),
        relationship_type,
        strength,
        evidence,
        created_at: now,
    };
    store.put_edge(forward.inverse());
    store.put_edge(forward.clone());
    store.update_pointers(a_id, |p| {
        p.related_decision_ids.insert(b_id.to_string());
    })?;
    store.update_pointers(b_id, |p| {
        p.related_decision_ids.insert(a_id.to_string());
    })?;
    Ok(forward)
}

/// Remove both directions of a link
///
/// # Errors
///
/// `LinkNotFound` if no edge runs from `a_id` to `b_id`.
pub fn unlink(store: &mut Store, a_id: &str, b_id: &str) -> Result<()> {
    if store.edge(a_id, b_id).is_none() {
        return Err(MemoraError::LinkNotFound {
            source_id: a_id.to_string(),
            target_id: b_id.to_string(),
        });
    }
    store.remove_edge(a_id, b_id);
    store.remove_edge(b_id, a_id);
    drop_related_pointer(store, a_id, b_id)?;
    drop_related_pointer(store, b_id, a_id)?;
    Ok(())
}

fn drop_related_pointer(store: &mut Store, from: &str, to: &str) -> Result<()> {
    if store.contains_decision(from) {
        store.update_pointers(from, |p| {
            p.related_decision_ids.remove(to);
        })?;
    }
    Ok(())
}

/// Record that `new_id` replaces `old_id`
///
/// The old decision gets a new `superseded` version pointing at its
/// successor and loses its open review tasks; the successor's current
/// version records what it supersedes.
///
/// # Errors
///
/// * `SupersessionCycle` - the pair is the same decision, or `new_id`
///   already precedes `old_id` in a supersession chain
/// * `InvalidTransition` - the old decision is not live, or either side is
///   already paired with another decision
pub fn supersede(
    store: &mut Store,
    ctx: &OpContext<'_>,
    old_id: &str,
    new_id: &str,
) -> Result<u32> {
    let cycle = || MemoraError::SupersessionCycle {
        decision_id: old_id.to_string(),
        successor_id: new_id.to_string(),
    };
    if old_id == new_id {
        return Err(cycle());
    }
    let old = store.current(old_id)?;
    let new = store.current(new_id)?;
    if old.superseded_by.is_some() || new.supersedes.is_some() {
        return Err(MemoraError::InvalidTransition {
            decision_id: old_id.to_string(),
            from: old.status.to_string(),
            to: DecisionStatus::Superseded.to_string(),
        });
    }

    // walking old's predecessors must never reach the successor
    let mut cursor = old.supersedes.clone();
    let mut seen = BTreeSet::new();
    while let Some(id) = cursor {
        if id == new_id || !seen.insert(id.clone()) {
            return Err(cycle());
        }
        cursor = store.current(&id).ok().and_then(|d| d.supersedes.clone());
    }

    let version = decision_ops::transition(store, ctx, old_id, DecisionStatus::Superseded, None)?;
    store.update_pointers(old_id, |p| *p.superseded_by = Some(new_id.to_string()))?;
    store.update_pointers(new_id, |p| *p.supersedes = Some(old_id.to_string()))?;
    validation_ops::cancel_open_tasks(store, ctx, old_id, &format!("superseded by {}", new_id));
    Ok(version)
}

/// Bounded breadth-first traversal from a decision
///
/// Each reachable decision is reported once, at its shallowest depth, with
/// the strongest path strength found at that depth. Results are ordered by
/// strength descending, then most recently updated first, then id.
///
/// # Errors
///
/// `DecisionNotFound` if the start decision is unknown.
pub fn find_related(
    store: &Store,
    decision_id: &str,
    max_depth: usize,
) -> Result<Vec<RelatedDecision>> {
    store.current(decision_id)?;

    let mut best: BTreeMap<String, (usize, f64, RelationshipType)> = BTreeMap::new();
    let mut frontier: Vec<(String, f64)> = vec![(decision_id.to_string(), 1.0)];
    let mut visited: BTreeSet<String> = BTreeSet::from([decision_id.to_string()]);

    for depth in 1..=max_depth {
        let mut level: BTreeMap<String, (f64, RelationshipType)> = BTreeMap::new();
        for (node, path_strength) in &frontier {
            for edge in store.edges_from(node) {
                let target = &edge.target_decision_id;
                if visited.contains(target) {
                    continue;
                }
                let strength = path_strength * edge.strength;
                let entry = level
                    .entry(target.clone())
                    .or_insert((strength, edge.relationship_type));
                if strength > entry.0 {
                    *entry = (strength, edge.relationship_type);
                }
            }
        }
        if level.is_empty() {
            break;
        }
        frontier = Vec::with_capacity(level.len());
        for (id, (strength, rel)) in level {
            visited.insert(id.clone());
            frontier.push((id.clone(), strength));
            best.insert(id, (depth, strength, rel));
        }
    }

    let mut related: Vec<RelatedDecision> = best
        .into_iter()
        .filter_map(|(id, (depth, strength, relationship_type))| {
            store.current(&id).ok().map(|d| RelatedDecision {
                decision_id: id.clone(),
                depth,
                relationship_type,
                strength,
                updated_at: d.updated_at,
            })
        })
        .collect();
    related.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.decision_id.cmp(&b.decision_id))
    });
    Ok(related)
}

/// Shortest path between two decisions, at most `max_depth` hops
///
/// Neighbours are explored strongest edge first (ties by id), so among
/// equally short paths the one through stronger edges is returned.
///
/// # Errors
///
/// `DecisionNotFound` if either endpoint is unknown.
pub fn find_path(
    store: &Store,
    a_id: &str,
    b_id: &str,
    max_depth: usize,
) -> Result<Option<Vec<String>>> {
    store.current(a_id)?;
    store.current(b_id)?;
    if a_id == b_id {
        return Ok(Some(vec![a_id.to_string()]));
    }

    let mut parents: BTreeMap<String, String> = BTreeMap::new();
    let mut visited: BTreeSet<String> = BTreeSet::from([a_id.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::from([(a_id.to_string(), 0)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth == max_depth {
            continue;
        }
        let mut neighbours: Vec<&DecisionRelationship> = store.edges_from(&node).collect();
        neighbours.sort_by(|x, y| {
            y.strength
                .total_cmp(&x.strength)
                .then_with(|| x.target_decision_id.cmp(&y.target_decision_id))
        });
        for edge in neighbours {
            let next = &edge.target_decision_id;
            if !visited.insert(next.clone()) {
                continue;
            }
            parents.insert(next.clone(), node.clone());
            if next == b_id {
                let mut path = vec![b_id.to_string()];
                let mut cursor = b_id;
                while let Some(parent) = parents.get(cursor) {
                    path.push(parent.clone());
                    cursor = parent;
                }
                path.reverse();
                return Ok(Some(path));
            }
            queue.push_back((next.clone(), depth + 1));
        }
    }
    Ok(None)
}

/// Repair pass: delete every edge whose mirror is missing or mismatched
///
/// Also realigns `related_decision_ids` with the surviving edges. Returns
/// the removed `(source, target)` keys.
pub fn reconcile_half_edges(store: &mut Store) -> Result<Vec<(String, String)>> {
    let half: Vec<(String, String)> = store
        .edges()
        .filter(|edge| {
            !store
                .edge(&edge.target_decision_id, &edge.source_decision_id)
                .is_some_and(|mirror| edge.mirrors(mirror))
        })
        .map(DecisionRelationship::key)
        .collect();

    for (source, target) in &half {
        tracing::warn!(source, target, "removing half edge");
        store.remove_edge(source, target);
    }

    let ids: Vec<String> = store
        .list_current()
        .iter()
        .map(|d| d.decision_id.clone())
        .collect();
    for id in ids {
        let linked: BTreeSet<String> = store
            .edges_from(&id)
            .map(|e| e.target_decision_id.clone())
            .collect();
        if store.current(&id)?.related_decision_ids != linked {
            store.update_pointers(&id, |p| *p.related_decision_ids = linked)?;
        }
    }
    Ok(half)
}
