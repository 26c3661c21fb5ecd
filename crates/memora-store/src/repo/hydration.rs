//! Hydration layer - loads the full state from SQLite into a Store
//!
//! Rows are replayed through the ordinary `Store` mutators in a
//! deterministic order, then the resulting journal is discarded.

use crate::errors::{from_rusqlite, from_serde, Result};
use crate::repo::SqliteRepo;
use memora_core::errors::ExError;
use memora_core::model::{
    CalibrationEvent, DecisionEntity, DecisionRelationship, EvidenceBatch, EvidenceItem,
    ValidationSample, ValidationTask, WeightsConfig,
};
use memora_core::ops::Store;
use rusqlite::Connection;
use serde::de::DeserializeOwned;

fn load_payloads<T: DeserializeOwned>(conn: &Connection, sql: &str, op: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let payloads: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    payloads
        .iter()
        .map(|p| serde_json::from_str(p).map_err(|e| from_serde(op, e)))
        .collect()
}

/// Weight history, oldest first; seeds `default_weights` into an empty table
pub fn load_weights(conn: &Connection, default_weights: &WeightsConfig) -> Result<Vec<WeightsConfig>> {
    let history: Vec<WeightsConfig> = load_payloads(
        conn,
        "SELECT payload_json FROM weight_versions ORDER BY version",
        "load_weights",
    )?;
    if !history.is_empty() {
        return Ok(history);
    }
    SqliteRepo::persist_weights(conn, default_weights)?;
    Ok(vec![default_weights.clone()])
}

/// Every version of every decision, ordered by id then version
pub fn load_decision_versions(conn: &Connection) -> Result<Vec<DecisionEntity>> {
    load_payloads(
        conn,
        "SELECT payload_json FROM decision_versions ORDER BY decision_id, version",
        "load_decision_versions",
    )
}

/// Current version of every decision, ordered by id
pub fn load_current_decisions(conn: &Connection) -> Result<Vec<DecisionEntity>> {
    load_payloads(
        conn,
        "SELECT v.payload_json FROM decision_versions v
         JOIN decision_heads h ON h.decision_id = v.decision_id AND h.head_version = v.version
         ORDER BY v.decision_id",
        "load_current_decisions",
    )
}

/// Load the whole persisted state
pub fn load_store(conn: &Connection, default_weights: &WeightsConfig) -> Result<Store> {
    let mut weights = load_weights(conn, default_weights)?.into_iter();
    let mut store = Store::new(weights.next().unwrap_or_else(|| default_weights.clone()));
    for later in weights {
        store.publish_weights(later).map_err(ExError::from)?;
    }

    for entity in load_decision_versions(conn)? {
        store.push_version(entity).map_err(ExError::from)?;
    }

    let evidence: Vec<EvidenceItem> = load_payloads(
        conn,
        "SELECT payload_json FROM evidence_items ORDER BY source_id",
        "load_evidence",
    )?;
    for item in evidence {
        store.register_evidence(item);
    }

    let edges: Vec<DecisionRelationship> = load_payloads(
        conn,
        "SELECT payload_json FROM decision_relationships ORDER BY source_decision_id, target_decision_id",
        "load_edges",
    )?;
    for edge in edges {
        store.put_edge(edge);
    }

    let tasks: Vec<ValidationTask> = load_payloads(
        conn,
        "SELECT payload_json FROM validation_tasks ORDER BY task_id",
        "load_tasks",
    )?;
    for task in tasks {
        store.put_task(task);
    }

    let samples: Vec<ValidationSample> = load_payloads(
        conn,
        "SELECT payload_json FROM validation_samples ORDER BY seq",
        "load_samples",
    )?;
    for sample in samples {
        store.push_sample(sample);
    }

    let calibrations: Vec<CalibrationEvent> = load_payloads(
        conn,
        "SELECT payload_json FROM calibration_events ORDER BY to_version",
        "load_calibrations",
    )?;
    for event in calibrations {
        store.push_calibration(event);
    }

    let batches: Vec<EvidenceBatch> = load_payloads(
        conn,
        "SELECT payload_json FROM pending_batches ORDER BY batch_id",
        "load_batches",
    )?;
    for batch in batches {
        store.put_batch(batch);
    }

    store.take_changes();
    tracing::debug!(
        decisions = store.decision_count(),
        weights_version = store.weights().version,
        "store hydrated"
    );
    Ok(store)
}
