//! SQLite repository implementation
//!
//! Row-level persistence for every journaled change. Each entity is kept
//! as a JSON payload next to the columns queries filter on. Functions take
//! a `&Connection` so they run equally inside a `Transaction`.

use crate::errors::{from_rusqlite, from_serde, head_conflict, Result};
use memora_core::model::{
    CalibrationEvent, DecisionEntity, DecisionRelationship, EvidenceBatch, EvidenceItem,
    ValidationOutcome, ValidationSample, ValidationTask, WeightsConfig,
};
use memora_core::ops::Change;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

fn to_json<T: Serialize>(op: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| from_serde(op, e))
}

/// SQLite repository for decisions, graph edges and workflow records
pub struct SqliteRepo;

impl SqliteRepo {
    /// Replay one journaled change
    pub fn apply_change(conn: &Connection, change: &Change) -> Result<()> {
        match change {
            Change::DecisionVersion {
                entity,
                expected_head,
            } => Self::persist_decision_version(conn, entity, *expected_head),
            Change::DecisionPointers { entity } => Self::persist_decision_pointers(conn, entity),
            Change::EdgePut(edge) => Self::persist_edge(conn, edge),
            Change::EdgeRemoved {
                source_decision_id,
                target_decision_id,
            } => Self::delete_edge(conn, source_decision_id, target_decision_id),
            Change::EvidenceRegistered(item) => Self::persist_evidence(conn, item),
            Change::TaskPut(task) => Self::persist_task(conn, task),
            Change::SampleAppended(sample) => Self::persist_sample(conn, sample),
            Change::CalibrationRecorded(event) => Self::persist_calibration(conn, event),
            Change::WeightsPublished(weights) => Self::persist_weights(conn, weights),
            Change::BatchPut(batch) => Self::persist_batch(conn, batch),
            Change::BatchRemoved { batch_id } => Self::delete_batch(conn, batch_id),
        }
    }

    /// Current head version of a decision
    pub fn head_version(conn: &Connection, decision_id: &str) -> Result<Option<u32>> {
        conn.query_row(
            "SELECT head_version FROM decision_heads WHERE decision_id = ?1",
            [decision_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Insert a new version, moving the head only if it still equals
    /// `expected_head`
    pub fn persist_decision_version(
        conn: &Connection,
        entity: &DecisionEntity,
        expected_head: Option<u32>,
    ) -> Result<()> {
        let updated_at = entity.updated_at.timestamp_millis();
        let moved = match expected_head {
            None => conn
                .execute(
                    "INSERT INTO decision_heads (decision_id, head_version, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(decision_id) DO NOTHING",
                    rusqlite::params![entity.decision_id, entity.version, updated_at],
                )
                .map_err(from_rusqlite)?,
            Some(expected) => conn
                .execute(
                    "UPDATE decision_heads SET head_version = ?1, updated_at = ?2
                     WHERE decision_id = ?3 AND head_version = ?4",
                    rusqlite::params![entity.version, updated_at, entity.decision_id, expected],
                )
                .map_err(from_rusqlite)?,
        };
        if moved != 1 {
            let actual = Self::head_version(conn, &entity.decision_id)?;
            return Err(head_conflict(&entity.decision_id, expected_head, actual));
        }

        conn.execute(
            "INSERT INTO decision_versions
                (decision_id, version, status, scope, overall, weights_version, created_at, updated_at, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                entity.decision_id,
                entity.version,
                entity.status.as_str(),
                entity.scope.to_string(),
                entity.confidence.overall,
                entity.confidence.weights_version,
                entity.created_at.timestamp_millis(),
                updated_at,
                to_json("persist_decision_version", entity)?,
            ],
        )
        .map_err(from_rusqlite)?;

        Ok(())
    }

    /// Rewrite the payload of an existing version (graph pointers only)
    /// Rewrite the graph pointers of the head version in place
    ///
    /// Rejected unless `entity.version` is still the head, so a pointer
    /// change never lands on a version that has since been superseded.
    pub fn persist_decision_pointers(conn: &Connection, entity: &DecisionEntity) -> Result<()> {
        let head = Self::head_version(conn, &entity.decision_id)?;
        if head != Some(entity.version) {
            return Err(head_conflict(&entity.decision_id, Some(entity.version), head));
        }
        let updated = conn
            .execute(
                "UPDATE decision_versions SET payload_json = ?1
                 WHERE decision_id = ?2 AND version = ?3",
                rusqlite::params![
                    to_json("persist_decision_pointers", entity)?,
                    entity.decision_id,
                    entity.version
                ],
            )
            .map_err(from_rusqlite)?;
        if updated != 1 {
            let actual = Self::head_version(conn, &entity.decision_id)?;
            return Err(head_conflict(&entity.decision_id, Some(entity.version), actual));
        }
        Ok(())
    }

    pub fn persist_edge(conn: &Connection, edge: &DecisionRelationship) -> Result<()> {
        conn.execute(
            "INSERT INTO decision_relationships
                (source_decision_id, target_decision_id, relationship_type, strength, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_decision_id, target_decision_id) DO UPDATE SET
                relationship_type = excluded.relationship_type,
                strength = excluded.strength,
                payload_json = excluded.payload_json",
            rusqlite::params![
                edge.source_decision_id,
                edge.target_decision_id,
                edge.relationship_type.as_str(),
                edge.strength,
                to_json("persist_edge", edge)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn delete_edge(conn: &Connection, source_id: &str, target_id: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM decision_relationships
             WHERE source_decision_id = ?1 AND target_decision_id = ?2",
            [source_id, target_id],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    /// First write wins; re-registering an item is a no-op
    pub fn persist_evidence(conn: &Connection, item: &EvidenceItem) -> Result<()> {
        conn.execute(
            "INSERT INTO evidence_items (source_id, source_type, platform, author, timestamp, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(source_id) DO NOTHING",
            rusqlite::params![
                item.source_id,
                item.source_type.as_str(),
                item.platform.as_str(),
                item.author,
                item.timestamp.timestamp_millis(),
                to_json("persist_evidence", item)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn persist_task(conn: &Connection, task: &ValidationTask) -> Result<()> {
        conn.execute(
            "INSERT INTO validation_tasks
                (task_id, decision_id, version, status, assigned_reviewer, due_at, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(task_id) DO UPDATE SET
                version = excluded.version,
                status = excluded.status,
                assigned_reviewer = excluded.assigned_reviewer,
                due_at = excluded.due_at,
                payload_json = excluded.payload_json",
            rusqlite::params![
                task.task_id,
                task.decision_id,
                task.version,
                task.status.as_str(),
                task.assigned_reviewer,
                task.due_at.timestamp_millis(),
                to_json("persist_task", task)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn persist_sample(conn: &Connection, sample: &ValidationSample) -> Result<()> {
        let outcome = match sample.outcome {
            ValidationOutcome::Validated => "validated",
            ValidationOutcome::Disputed => "disputed",
        };
        conn.execute(
            "INSERT INTO validation_samples
                (decision_id, version, reviewer, outcome, recorded_at, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                sample.decision_id,
                sample.version,
                sample.reviewer,
                outcome,
                sample.recorded_at.timestamp_millis(),
                to_json("persist_sample", sample)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn persist_calibration(conn: &Connection, event: &CalibrationEvent) -> Result<()> {
        conn.execute(
            "INSERT INTO calibration_events (event_id, from_version, to_version, recorded_at, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                event.event_id,
                event.from_version,
                event.to_version,
                event.recorded_at.timestamp_millis(),
                to_json("persist_calibration", event)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn persist_weights(conn: &Connection, weights: &WeightsConfig) -> Result<()> {
        conn.execute(
            "INSERT INTO weight_versions (version, created_at, payload_json) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                weights.version,
                weights.created_at.timestamp_millis(),
                to_json("persist_weights", weights)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn persist_batch(conn: &Connection, batch: &EvidenceBatch) -> Result<()> {
        conn.execute(
            "INSERT INTO pending_batches
                (batch_id, scope, status, attempts, next_attempt_at, payload_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(batch_id) DO UPDATE SET
                status = excluded.status,
                attempts = excluded.attempts,
                next_attempt_at = excluded.next_attempt_at,
                payload_json = excluded.payload_json",
            rusqlite::params![
                batch.batch_id,
                batch.scope.to_string(),
                batch.status.as_str(),
                batch.attempts,
                batch.next_attempt_at.map(|t| t.timestamp_millis()),
                to_json("persist_batch", batch)?,
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn delete_batch(conn: &Connection, batch_id: &str) -> Result<()> {
        conn.execute("DELETE FROM pending_batches WHERE batch_id = ?1", [batch_id])
            .map_err(from_rusqlite)?;
        Ok(())
    }
}
