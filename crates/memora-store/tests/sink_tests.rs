#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{ctx, decision, default_weights, t0, temp_sink};
use memora_core::model::{EvidenceBatch, RelationshipType, Scope};
use memora_core::ops::{decision_ops, graph_ops, validation_ops};
use memora_core::{apply, EngineConfig, ExErrorKind, StoreSink};
use memora_store::SqliteSink;

#[test]
fn test_empty_database_seeds_default_weights() {
    let (_dir, sink, _) = temp_sink();
    let store = sink.load(&default_weights()).unwrap();
    assert_eq!(store.decision_count(), 0);
    assert_eq!(store.weights().version, 1);
    assert!(!store.has_pending_changes());
}

#[test]
fn test_committed_state_survives_reopen() {
    let (_dir, sink, path) = temp_sink();
    let config = EngineConfig {
        validation_threshold: 0.99,
        ..EngineConfig::default()
    };
    let op = ctx(&config);
    let state = sink.load(&default_weights()).unwrap();

    let applied = apply(&state, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("a"), None)?;
        decision_ops::upsert_decision(draft, &op, decision("b"), None)?;
        graph_ops::link(draft, "a", "b", RelationshipType::DependsOn, 0.6, vec![], t0())?;
        validation_ops::route(draft, &op, "a")?;
        graph_ops::supersede(draft, &op, "b", "a")
    })
    .unwrap();
    sink.commit(&applied.changes).unwrap();
    drop(sink);

    let reopened = SqliteSink::open(&path).unwrap();
    let loaded = reopened.load(&default_weights()).unwrap();

    assert_eq!(loaded.decision_count(), 2);
    assert_eq!(loaded.head("a"), applied.state.head("a"));
    let (before, after) = (applied.state.current("a").unwrap(), loaded.current("a").unwrap());
    assert_eq!(after.status, before.status);
    assert_eq!(after.supersedes, before.supersedes);
    assert_eq!(after.related_decision_ids, before.related_decision_ids);
    assert_eq!(after.evidence.len(), before.evidence.len());
    assert_eq!(loaded.current("b").unwrap().superseded_by.as_deref(), Some("a"));
    assert!(loaded.edge("a", "b").is_some());
    assert!(loaded.edge("b", "a").is_some());
    assert_eq!(loaded.tasks().count(), applied.state.tasks().count());
    assert_eq!(loaded.evidence_count(), 4);
    assert!(memora_core::rules::invariants::find_violations(&loaded).is_empty());
}

#[test]
fn test_stale_head_rolls_back_whole_change_set() {
    let (_dir, sink, _) = temp_sink();
    let config = EngineConfig::default();
    let op = ctx(&config);
    let base = sink.load(&default_weights()).unwrap();

    // two writers build on the same empty state
    let first = apply(&base, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("a"), None)
    })
    .unwrap();
    let second = apply(&base, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("z"), None)?;
        decision_ops::upsert_decision(draft, &op, decision("a"), None)
    })
    .unwrap();

    sink.commit(&first.changes).unwrap();
    let err = sink.commit(&second.changes).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::VersionConflict);
    assert_eq!(err.decision_id(), Some("a"));

    let loaded = sink.load(&default_weights()).unwrap();
    assert!(loaded.contains_decision("a"));
    assert!(!loaded.contains_decision("z"));
    assert!(loaded.evidence("github:pr_created:z").is_none());
}

#[test]
fn test_pointer_change_on_replaced_version_rolls_back() {
    let (_dir, sink, _) = temp_sink();
    let config = EngineConfig::default();
    let op = ctx(&config);
    let base = sink.load(&default_weights()).unwrap();
    let linked = apply(&base, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("a"), None)?;
        decision_ops::upsert_decision(draft, &op, decision("b"), None)?;
        graph_ops::link(draft, "a", "b", RelationshipType::Extends, 0.5, vec![], t0())
    })
    .unwrap();
    sink.commit(&linked.changes).unwrap();

    // one writer revises a, another unlinks against the old a@v1
    let revised = apply(&linked.state, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("a"), Some(1))
    })
    .unwrap();
    let unlinked = apply(&linked.state, |draft| graph_ops::unlink(draft, "a", "b")).unwrap();

    sink.commit(&revised.changes).unwrap();
    let err = sink.commit(&unlinked.changes).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::VersionConflict);

    let loaded = sink.load(&default_weights()).unwrap();
    assert_eq!(loaded.head("a"), Some(2));
    assert!(loaded.current("a").unwrap().related_decision_ids.contains("b"));
    assert!(loaded.edge("a", "b").is_some());
    assert!(loaded.edge("b", "a").is_some());
    assert!(memora_core::rules::invariants::find_violations(&loaded).is_empty());
}

#[test]
fn test_weights_and_pending_batches_round_trip() {
    let sink = SqliteSink::in_memory().unwrap();
    let mut store = sink.load(&default_weights()).unwrap();

    let mut next = store.weights().next(store.weights().weights.clone(), t0());
    next.weights.evidence_quality = 0.25;
    next.weights.outcome_validation = 0.15;
    store.publish_weights(next).unwrap();

    let mut batch = EvidenceBatch::new(
        "batch-1".to_string(),
        Scope::Workspace("ws".to_string()),
        vec![],
        vec!["evt-1".to_string()],
        t0(),
    );
    batch.defer("provider unavailable", t0() + chrono::Duration::minutes(1));
    store.put_batch(batch.clone());
    sink.commit(&store.take_changes()).unwrap();

    let loaded = sink.load(&default_weights()).unwrap();
    assert_eq!(loaded.weights().version, 2);
    assert_eq!(loaded.weights_history().len(), 2);
    assert_eq!(loaded.pending_batches().collect::<Vec<_>>(), vec![&batch]);

    let mut store = loaded;
    store.remove_batch("batch-1");
    sink.commit(&store.take_changes()).unwrap();
    assert_eq!(sink.load(&default_weights()).unwrap().pending_batches().count(), 0);
}

#[test]
fn test_migrations_recorded_once() {
    let (_dir, sink, path) = temp_sink();
    drop(sink);
    let _again = SqliteSink::open(&path).unwrap();
    let conn = memora_store::db::open(&path).unwrap();
    let applied = memora_store::migrations::applied_migrations(&conn).unwrap();
    let ids: Vec<&str> = applied.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["001_initial_schema", "002_validation_workflow", "003_pending_batches"]
    );
}
