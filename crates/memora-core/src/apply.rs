//! Atomic state transitions
//!
//! `apply()` is the single entry point for mutating a published `Store`.
//!
//! ## Atomicity Contract
//!
//! - **All-or-nothing**: the operation runs against a private copy; on error
//!   the caller's state is untouched
//! - **Journaled**: the returned `ChangeSet` lists every write, in order,
//!   ready for a persistence sink
//! - **Checked**: an operation that leaves a broken invariant on any
//!   decision it touched is rejected with `InvariantViolation`
//! - **Proportional**: the copy shares every collection it does not write,
//!   and only the touched decisions and their graph neighbours are checked
//!
//! ## Example
//!
//! ```
//! use memora_core::{apply::apply, Store};
//!
//! let state = Store::default();
//! let applied = apply(&state, |draft| Ok(draft.decision_count())).unwrap();
//! assert_eq!(applied.value, 0);
//! assert!(applied.changes.is_empty());
//! ```

use crate::errors::{MemoraError, Result};
use crate::ops::{ChangeSet, Store};
use crate::rules::invariants;

/// Result of a successful `apply`
#[derive(Debug)]
pub struct Applied<T> {
    /// Next state; publish it only once `changes` are persisted
    pub state: Store,
    pub value: T,
    pub changes: ChangeSet,
}

/// Run `op` against a copy of `state`
///
/// # Errors
///
/// Whatever `op` returns, or `InvariantViolation` when the resulting state
/// breaks an invariant on a touched decision.
pub fn apply<T>(state: &Store, op: impl FnOnce(&mut Store) -> Result<T>) -> Result<Applied<T>> {
    let mut draft = state.clone();
    draft.take_changes();

    let value = op(&mut draft)?;
    let changes = draft.take_changes();

    let touched = changes.touched_decisions();
    if !touched.is_empty() {
        // neighbours the op may have let go of still point back at it
        let mut near = touched.clone();
        near.extend(
            invariants::neighbourhood(state, &touched)
                .into_iter()
                .map(str::to_string),
        );
        let violations: Vec<String> = invariants::find_violations_near(&draft, &near)
            .into_iter()
            .filter(|v| touched.iter().any(|id| v.involves(id)))
            .map(|v| v.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(MemoraError::InvariantViolation { violations });
        }
    }

    Ok(Applied {
        state: draft,
        value,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationshipType;
    use crate::ops::graph_ops;
    use crate::test_support::seeded_store;
    use chrono::Utc;

    #[test]
    fn test_failed_op_leaves_state_untouched() {
        let state = seeded_store(&["a", "b"]);
        let result = apply(&state, |draft| {
            graph_ops::link(draft, "a", "b", RelationshipType::Extends, 0.5, vec![], Utc::now())?;
            graph_ops::link(draft, "a", "a", RelationshipType::Extends, 0.5, vec![], Utc::now())
        });
        assert!(matches!(result, Err(MemoraError::SelfLink { .. })));
        assert_eq!(state.edges().count(), 0);
    }

    #[test]
    fn test_successful_op_returns_journal() {
        let state = seeded_store(&["a", "b"]);
        let applied = apply(&state, |draft| {
            graph_ops::link(draft, "a", "b", RelationshipType::Extends, 0.5, vec![], Utc::now())
        })
        .unwrap();
        assert_eq!(applied.state.edges().count(), 2);
        assert_eq!(applied.changes.touched_decisions(), vec!["a", "b"]);
        assert_eq!(state.edges().count(), 0);
    }

    #[test]
    fn test_one_sided_supersession_on_neighbour_is_rejected() {
        let mut state = seeded_store(&["a", "b", "c"]);
        state
            .update_pointers("a", |p| *p.superseded_by = Some("b".to_string()))
            .unwrap();
        state
            .update_pointers("b", |p| *p.supersedes = Some("a".to_string()))
            .unwrap();
        state.take_changes();

        // only b is written, but a is left pointing at it
        let result = apply(&state, |draft| {
            draft.update_pointers("b", |p| *p.supersedes = None)
        });
        let Err(MemoraError::InvariantViolation { violations }) = result else {
            panic!("expected an invariant violation");
        };
        assert!(violations.iter().any(|v| v.contains("a / b")));
    }

    #[test]
    fn test_untouched_violations_do_not_block_other_writes() {
        let mut state = seeded_store(&["a", "b", "c"]);
        state
            .update_pointers("a", |p| *p.superseded_by = Some("b".to_string()))
            .unwrap();
        state.take_changes();

        let applied = apply(&state, |draft| {
            graph_ops::link(draft, "b", "c", RelationshipType::Extends, 0.5, vec![], Utc::now())
        });
        assert!(applied.is_ok());
    }

    #[test]
    fn test_half_edge_write_is_rejected() {
        let state = seeded_store(&["a", "b"]);
        let result = apply(&state, |draft| {
            let edge = graph_ops::link(
                draft,
                "a",
                "b",
                RelationshipType::Extends,
                0.5,
                vec![],
                Utc::now(),
            )?;
            draft.remove_edge(&edge.target_decision_id, &edge.source_decision_id);
            Ok(())
        });
        assert!(matches!(result, Err(MemoraError::InvariantViolation { .. })));
    }
}
