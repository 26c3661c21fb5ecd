//! Ingestion and inference commands

use chrono::{DateTime, Utc};
use std::time::Instant;

use memora_core::errors::ExError;
use memora_core::model::IngestionEvent;
use memora_core::{log_op_end, log_op_error, log_op_start};

use super::elapsed_ms;
use crate::engine::{Engine, IngestReport, PipelineOutcome};

/// Normalize and queue a set of ingestion events
///
/// Malformed events are reported in the result, not raised.
///
/// ## Errors
///
/// - `Persistence`: the evidence could not be stored
pub async fn events_ingest(
    engine: &Engine,
    events: &[IngestionEvent],
    now: DateTime<Utc>,
) -> Result<IngestReport, ExError> {
    log_op_start!("events_ingest", events = events.len());
    let start = Instant::now();

    let report = engine.ingest(events, now).await.map_err(|e| {
        log_op_error!("events_ingest", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "events_ingest",
        duration_ms = elapsed_ms(start),
        accepted = report.accepted,
        duplicates = report.duplicates,
        rejected = report.rejected.len(),
        deferred = report.deferred.len()
    );
    Ok(report)
}

/// Infer every queued batch
///
/// ## Errors
///
/// - `Persistence`, `InvariantViolation`: a batch could not be settled
pub async fn pipeline_run(
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<Vec<PipelineOutcome>, ExError> {
    log_op_start!("pipeline_run", queued = engine.queue_len());
    let start = Instant::now();

    let outcomes = engine.run_pending(now).await.map_err(|e| {
        log_op_error!("pipeline_run", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "pipeline_run",
        duration_ms = elapsed_ms(start),
        batches = outcomes.len(),
        created = created_count(&outcomes)
    );
    Ok(outcomes)
}

/// Retry deferred batches whose backoff has elapsed
///
/// ## Errors
///
/// - `Persistence`, `InvariantViolation`: a batch could not be settled
pub async fn deferred_retry(
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<Vec<PipelineOutcome>, ExError> {
    log_op_start!("deferred_retry");
    let start = Instant::now();

    let outcomes = engine.retry_deferred(now).await.map_err(|e| {
        log_op_error!("deferred_retry", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "deferred_retry",
        duration_ms = elapsed_ms(start),
        batches = outcomes.len(),
        created = created_count(&outcomes)
    );
    Ok(outcomes)
}

fn created_count(outcomes: &[PipelineOutcome]) -> usize {
    outcomes
        .iter()
        .filter(|o| matches!(o, PipelineOutcome::Created { .. }))
        .count()
}
