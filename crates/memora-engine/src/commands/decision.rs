//! Decision and graph commands with boundary logging

use chrono::{DateTime, Utc};
use std::time::Instant;

use memora_core::errors::ExError;
use memora_core::model::{DecisionEntity, DecisionRelationship, EvidenceItem, RelationshipType, Scope};
use memora_core::{log_op_end, log_op_error, log_op_start};

use super::elapsed_ms;
use crate::engine::Engine;
use crate::query::QueryResult;

/// Create (`base_version = None`) or version a decision
///
/// ## Errors
///
/// - `VersionConflict`: the base version is stale
/// - `InsufficientEvidence`: no intent and no execution evidence
/// - `InvalidTransition`: the status change is not allowed
pub async fn decision_upsert(
    engine: &Engine,
    decision: DecisionEntity,
    base_version: Option<u32>,
    now: DateTime<Utc>,
) -> Result<u32, ExError> {
    let decision_id = decision.decision_id.clone();
    log_op_start!("decision_upsert", decision_id = %decision_id);
    let start = Instant::now();

    let version = engine
        .upsert_decision(decision, base_version, now)
        .await
        .map_err(|e| {
            log_op_error!("decision_upsert", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

    log_op_end!(
        "decision_upsert",
        duration_ms = elapsed_ms(start),
        decision_id = %decision_id,
        version = version
    );
    Ok(version)
}

/// Attach corroborating evidence to the current version
///
/// Returns the new version, or `None` if every item was already attached.
///
/// ## Errors
///
/// - `NotFound`: unknown decision
/// - `VersionConflict`: the base version is stale
pub async fn decision_attach_evidence(
    engine: &Engine,
    decision_id: &str,
    base_version: u32,
    items: Vec<EvidenceItem>,
    now: DateTime<Utc>,
) -> Result<Option<u32>, ExError> {
    log_op_start!("decision_attach_evidence", decision_id = decision_id, items = items.len());
    let start = Instant::now();

    let version = engine
        .attach_evidence(decision_id, base_version, items, now)
        .await
        .map_err(|e| {
            log_op_error!(
                "decision_attach_evidence",
                e.clone(),
                duration_ms = elapsed_ms(start)
            );
            e
        })?;

    log_op_end!(
        "decision_attach_evidence",
        duration_ms = elapsed_ms(start),
        version = ?version
    );
    Ok(version)
}

/// Link two decisions in both directions
///
/// ## Errors
///
/// - `SelfLink`, `DuplicateLink`, `NotFound`
/// - `InvalidInput`: strength outside [0, 1]
pub async fn decision_link(
    engine: &Engine,
    a_id: &str,
    b_id: &str,
    relationship_type: RelationshipType,
    strength: f64,
    evidence: Vec<String>,
    now: DateTime<Utc>,
) -> Result<DecisionRelationship, ExError> {
    log_op_start!(
        "decision_link",
        source_id = a_id,
        target_id = b_id,
        relationship_type = relationship_type.as_str()
    );
    let start = Instant::now();

    let edge = engine
        .link(a_id, b_id, relationship_type, strength, evidence, now)
        .await
        .map_err(|e| {
            log_op_error!("decision_link", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

    log_op_end!("decision_link", duration_ms = elapsed_ms(start));
    Ok(edge)
}

/// ## Errors
///
/// - `NotFound`: no edge joins the pair
pub async fn decision_unlink(
    engine: &Engine,
    a_id: &str,
    b_id: &str,
    now: DateTime<Utc>,
) -> Result<(), ExError> {
    log_op_start!("decision_unlink", source_id = a_id, target_id = b_id);
    let start = Instant::now();

    engine.unlink(a_id, b_id, now).await.map_err(|e| {
        log_op_error!("decision_unlink", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!("decision_unlink", duration_ms = elapsed_ms(start));
    Ok(())
}

/// Mark `old_id` as superseded by `new_id`
///
/// ## Errors
///
/// - `CycleDetected`: the supersession chain would loop
/// - `InvalidTransition`: either side is already paired, or `old_id` is
///   not live
pub async fn decision_supersede(
    engine: &Engine,
    old_id: &str,
    new_id: &str,
    now: DateTime<Utc>,
) -> Result<u32, ExError> {
    log_op_start!("decision_supersede", decision_id = old_id, successor_id = new_id);
    let start = Instant::now();

    let version = engine.supersede(old_id, new_id, now).await.map_err(|e| {
        log_op_error!("decision_supersede", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "decision_supersede",
        duration_ms = elapsed_ms(start),
        version = version
    );
    Ok(version)
}

/// Answer a "why" question within a scope
///
/// ## Errors
///
/// Semantic index failures.
pub async fn decision_query(
    engine: &Engine,
    question: &str,
    scope: &Scope,
) -> Result<QueryResult, ExError> {
    log_op_start!("decision_query", scope = %scope);
    let start = Instant::now();

    let result = engine
        .query_facade()
        .answer(question, scope)
        .await
        .map_err(|e| {
            log_op_error!("decision_query", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

    log_op_end!(
        "decision_query",
        duration_ms = elapsed_ms(start),
        results = result.results.len()
    );
    Ok(result)
}
