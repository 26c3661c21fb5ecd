use crate::errors::{MemoraError, Result};
use crate::ops::Store;

use super::invariants;

/// Validate the whole graph
///
/// # Errors
///
/// `InvariantViolation` listing every violation found. Nothing is repaired;
/// use `graph_ops::reconcile_half_edges` for the explicit repair pass.
pub fn validate_graph(store: &Store) -> Result<()> {
    let violations = invariants::find_violations(store);
    if violations.is_empty() {
        return Ok(());
    }
    Err(MemoraError::InvariantViolation {
        violations: violations.iter().map(ToString::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seeded_store;

    #[test]
    fn test_violations_are_reported_not_repaired() {
        let mut store = seeded_store(&["a"]);
        store
            .update_pointers("a", |p| {
                p.related_decision_ids.insert("a".to_string());
            })
            .unwrap();
        let err = validate_graph(&store).unwrap_err();
        assert!(matches!(err, MemoraError::InvariantViolation { ref violations } if !violations.is_empty()));
        assert!(store.current("a").unwrap().related_decision_ids.contains("a"));
    }
}
