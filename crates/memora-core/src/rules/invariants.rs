use std::collections::BTreeSet;
use std::fmt;

use crate::model::{DecisionEntity, DecisionRelationship, ValidationTask};
use crate::ops::Store;

/// One broken graph or workflow invariant
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Edge without a matching mirror (missing, wrong type or strength)
    HalfEdge { source_id: String, target_id: String },
    SelfLink { decision_id: String },
    /// `related_decision_ids` disagrees with the stored edges
    RelatedPointerMismatch { decision_id: String },
    /// A.superseded_by = B without B.supersedes = A (or the reverse)
    SupersessionAsymmetry { decision_id: String, other_id: String },
    SupersessionCycle { decision_id: String },
    /// Open task pointing at a decision that is gone, or at a version that
    /// does not exist
    OrphanedTask { task_id: String, decision_id: String },
    VersionGap { decision_id: String },
    EmptyEvidence { decision_id: String, version: u32 },
    ConfidenceOutOfRange { decision_id: String, version: u32 },
}

impl Violation {
    /// True if the violation concerns the given decision
    pub fn involves(&self, id: &str) -> bool {
        match self {
            Violation::HalfEdge {
                source_id,
                target_id,
            } => source_id == id || target_id == id,
            Violation::SupersessionAsymmetry {
                decision_id,
                other_id,
            } => decision_id == id || other_id == id,
            Violation::SelfLink { decision_id }
            | Violation::RelatedPointerMismatch { decision_id }
            | Violation::SupersessionCycle { decision_id }
            | Violation::OrphanedTask { decision_id, .. }
            | Violation::VersionGap { decision_id }
            | Violation::EmptyEvidence { decision_id, .. }
            | Violation::ConfidenceOutOfRange { decision_id, .. } => decision_id == id,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::HalfEdge {
                source_id,
                target_id,
            } => write!(f, "half edge {} -> {}", source_id, target_id),
            Violation::SelfLink { decision_id } => write!(f, "self link on {}", decision_id),
            Violation::RelatedPointerMismatch { decision_id } => {
                write!(f, "related ids of {} disagree with edges", decision_id)
            }
            Violation::SupersessionAsymmetry {
                decision_id,
                other_id,
            } => write!(f, "supersession {} / {} is one-sided", decision_id, other_id),
            Violation::SupersessionCycle { decision_id } => {
                write!(f, "supersession cycle through {}", decision_id)
            }
            Violation::OrphanedTask {
                task_id,
                decision_id,
            } => write!(f, "open task {} references missing {}", task_id, decision_id),
            Violation::VersionGap { decision_id } => {
                write!(f, "versions of {} are not 1..N", decision_id)
            }
            Violation::EmptyEvidence {
                decision_id,
                version,
            } => write!(f, "{}@v{} has no evidence", decision_id, version),
            Violation::ConfidenceOutOfRange {
                decision_id,
                version,
            } => write!(f, "{}@v{} confidence outside [0, 1]", decision_id, version),
        }
    }
}

fn is_half_edge(store: &Store, edge: &DecisionRelationship) -> bool {
    !store
        .edge(&edge.target_decision_id, &edge.source_decision_id)
        .is_some_and(|mirror| edge.mirrors(mirror))
}

fn pointers_disagree_with_edges(store: &Store, d: &DecisionEntity) -> bool {
    let linked: BTreeSet<&String> = store
        .edges_from(&d.decision_id)
        .map(|e| &e.target_decision_id)
        .collect();
    linked != d.related_decision_ids.iter().collect()
}

/// Supersession pointers of `d` that the other side does not return
fn one_sided_supersession(store: &Store, d: &DecisionEntity) -> Vec<(String, String)> {
    let mut found = Vec::new();
    if let Some(next) = &d.superseded_by {
        let ok = store
            .current(next)
            .is_ok_and(|n| n.supersedes.as_deref() == Some(d.decision_id.as_str()));
        if !ok {
            found.push((d.decision_id.clone(), next.clone()));
        }
    }
    if let Some(prev) = &d.supersedes {
        let ok = store
            .current(prev)
            .is_ok_and(|p| p.superseded_by.as_deref() == Some(d.decision_id.as_str()));
        if !ok {
            found.push((d.decision_id.clone(), prev.clone()));
        }
    }
    found
}

fn has_version_gap(versions: &[DecisionEntity]) -> bool {
    versions
        .iter()
        .enumerate()
        .any(|(i, v)| v.version as usize != i + 1)
}

fn bad_versions(versions: &[DecisionEntity]) -> Vec<Violation> {
    let mut found = Vec::new();
    for d in versions {
        if d.evidence.is_empty() {
            found.push(Violation::EmptyEvidence {
                decision_id: d.decision_id.clone(),
                version: d.version,
            });
        }
        if !(0.0..=1.0).contains(&d.confidence.overall) {
            found.push(Violation::ConfidenceOutOfRange {
                decision_id: d.decision_id.clone(),
                version: d.version,
            });
        }
    }
    found
}

fn is_orphaned(store: &Store, task: &ValidationTask) -> bool {
    task.is_open() && store.version(&task.decision_id, task.version).is_err()
}

/// Edges whose mirror is missing or does not match
pub fn find_half_edges(store: &Store) -> Vec<(String, String)> {
    store
        .edges()
        .filter(|edge| is_half_edge(store, edge))
        .map(|edge| edge.key())
        .collect()
}

/// Decisions linked to themselves, by edge or pointer
pub fn find_self_links(store: &Store) -> Vec<String> {
    let mut ids: BTreeSet<String> = store
        .edges()
        .filter(|e| e.source_decision_id == e.target_decision_id)
        .map(|e| e.source_decision_id.clone())
        .collect();
    ids.extend(
        store
            .list_current()
            .into_iter()
            .filter(|d| d.related_decision_ids.contains(&d.decision_id))
            .map(|d| d.decision_id.clone()),
    );
    ids.into_iter().collect()
}

pub fn find_related_pointer_mismatches(store: &Store) -> Vec<String> {
    store
        .list_current()
        .into_iter()
        .filter(|d| pointers_disagree_with_edges(store, d))
        .map(|d| d.decision_id.clone())
        .collect()
}

/// (decision, other) pairs where only one side records the supersession
pub fn find_supersession_asymmetry(store: &Store) -> Vec<(String, String)> {
    store
        .list_current()
        .into_iter()
        .flat_map(|d| one_sided_supersession(store, d))
        .collect()
}

/// Check if following `superseded_by` from a decision ever returns to it
pub fn has_supersession_cycle(store: &Store, decision_id: &str) -> bool {
    let mut visited = BTreeSet::new();
    let mut current = Some(decision_id.to_string());
    while let Some(id) = current {
        if !visited.insert(id.clone()) {
            return true;
        }
        current = store.current(&id).ok().and_then(|d| d.superseded_by.clone());
    }
    false
}

/// Open tasks whose decision or target version cannot be retrieved
///
/// Returns (task_id, decision_id) pairs.
pub fn find_orphaned_tasks(store: &Store) -> Vec<(String, String)> {
    store
        .tasks()
        .filter(|t| is_orphaned(store, t))
        .map(|t| (t.task_id.clone(), t.decision_id.clone()))
        .collect()
}

pub fn find_version_gaps(store: &Store) -> Vec<String> {
    store
        .list_current()
        .into_iter()
        .filter(|d| store.versions(&d.decision_id).is_ok_and(has_version_gap))
        .map(|d| d.decision_id.clone())
        .collect()
}

/// Every retained version with empty evidence or a bad confidence value
pub fn find_bad_versions(store: &Store) -> Vec<Violation> {
    store
        .list_current()
        .into_iter()
        .filter_map(|d| store.versions(&d.decision_id).ok())
        .flat_map(bad_versions)
        .collect()
}

/// Run every check
pub fn find_violations(store: &Store) -> Vec<Violation> {
    let mut violations = Vec::new();
    violations.extend(
        find_half_edges(store)
            .into_iter()
            .map(|(source_id, target_id)| Violation::HalfEdge {
                source_id,
                target_id,
            }),
    );
    violations.extend(
        find_self_links(store)
            .into_iter()
            .map(|decision_id| Violation::SelfLink { decision_id }),
    );
    violations.extend(
        find_related_pointer_mismatches(store)
            .into_iter()
            .map(|decision_id| Violation::RelatedPointerMismatch { decision_id }),
    );
    violations.extend(
        find_supersession_asymmetry(store)
            .into_iter()
            .map(|(decision_id, other_id)| Violation::SupersessionAsymmetry {
                decision_id,
                other_id,
            }),
    );
    violations.extend(
        store
            .list_current()
            .into_iter()
            .filter(|d| has_supersession_cycle(store, &d.decision_id))
            .map(|d| Violation::SupersessionCycle {
                decision_id: d.decision_id.clone(),
            }),
    );
    violations.extend(
        find_orphaned_tasks(store)
            .into_iter()
            .map(|(task_id, decision_id)| Violation::OrphanedTask {
                task_id,
                decision_id,
            }),
    );
    violations.extend(
        find_version_gaps(store)
            .into_iter()
            .map(|decision_id| Violation::VersionGap { decision_id }),
    );
    violations.extend(find_bad_versions(store));
    violations
}

/// Known decisions among `ids`, plus every decision they point at or have an
/// edge to
pub fn neighbourhood<'a>(store: &'a Store, ids: &'a [String]) -> BTreeSet<&'a str> {
    let mut scope = BTreeSet::new();
    for id in ids {
        let Ok(d) = store.current(id) else {
            continue;
        };
        scope.insert(d.decision_id.as_str());
        scope.extend(d.related_decision_ids.iter().map(String::as_str));
        scope.extend(d.supersedes.as_deref());
        scope.extend(d.superseded_by.as_deref());
        scope.extend(store.edges_from(id).map(|e| e.target_decision_id.as_str()));
    }
    scope
}

/// Every check, limited to `ids` and the decisions they point at
///
/// Cost follows the size of the neighbourhood, not of the store. Edges are
/// checked from both ends, so a half edge shows up whichever end is named.
/// Unknown ids are skipped.
pub fn find_violations_near(store: &Store, ids: &[String]) -> Vec<Violation> {
    let scope = neighbourhood(store, ids);
    let mut found = Vec::new();
    for id in &scope {
        let Ok(d) = store.current(id) else {
            continue;
        };
        let mut self_linked = d.related_decision_ids.contains(*id);
        for edge in store.edges_from(id) {
            if edge.target_decision_id == *id {
                self_linked = true;
            } else if is_half_edge(store, edge) {
                found.push(Violation::HalfEdge {
                    source_id: edge.source_decision_id.clone(),
                    target_id: edge.target_decision_id.clone(),
                });
            }
        }
        if self_linked {
            found.push(Violation::SelfLink {
                decision_id: d.decision_id.clone(),
            });
        }
        if pointers_disagree_with_edges(store, d) {
            found.push(Violation::RelatedPointerMismatch {
                decision_id: d.decision_id.clone(),
            });
        }
        found.extend(one_sided_supersession(store, d).into_iter().map(
            |(decision_id, other_id)| Violation::SupersessionAsymmetry {
                decision_id,
                other_id,
            },
        ));
        if has_supersession_cycle(store, id) {
            found.push(Violation::SupersessionCycle {
                decision_id: d.decision_id.clone(),
            });
        }
        if let Ok(versions) = store.versions(id) {
            if has_version_gap(versions) {
                found.push(Violation::VersionGap {
                    decision_id: d.decision_id.clone(),
                });
            }
            found.extend(bad_versions(versions));
        }
        found.extend(
            store
                .tasks_for(id)
                .filter(|t| is_orphaned(store, t))
                .map(|t| Violation::OrphanedTask {
                    task_id: t.task_id.clone(),
                    decision_id: t.decision_id.clone(),
                }),
        );
    }
    found
}
