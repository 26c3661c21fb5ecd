//! Validation workflow commands

use chrono::{DateTime, Utc};
use std::time::Instant;

use memora_core::errors::ExError;
use memora_core::model::{CalibrationEvent, ReviewerFeedback, Scope, ValidationTask};
use memora_core::ops::validation_ops::{FeedbackOutcome, Routing, ScopeCancellation};
use memora_core::{log_op_end, log_op_error, log_op_start};

use super::elapsed_ms;
use crate::engine::{Engine, SweepReport};

/// Open a review on an `inferred` decision
///
/// ## Errors
///
/// - `InvalidTransition`: the decision is not `inferred`
pub async fn review_request(
    engine: &Engine,
    decision_id: &str,
    now: DateTime<Utc>,
) -> Result<Routing, ExError> {
    log_op_start!("review_request", decision_id = decision_id);
    let start = Instant::now();

    let routing = engine.request_review(decision_id, now).await.map_err(|e| {
        log_op_error!("review_request", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!("review_request", duration_ms = elapsed_ms(start));
    Ok(routing)
}

/// Claim a task for review
///
/// ## Errors
///
/// - `NotFound`, `AlreadyResolved`
/// - `InvalidInput`: blank reviewer or the task is claimed by someone else
pub async fn review_start(
    engine: &Engine,
    task_id: &str,
    reviewer: &str,
    now: DateTime<Utc>,
) -> Result<ValidationTask, ExError> {
    log_op_start!("review_start", task_id = task_id, reviewer = reviewer);
    let start = Instant::now();

    let task = engine.start_review(task_id, reviewer, now).await.map_err(|e| {
        log_op_error!("review_start", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!("review_start", duration_ms = elapsed_ms(start));
    Ok(task)
}

/// Apply a reviewer verdict
///
/// ## Errors
///
/// - `StaleFeedback`: the feedback targets an old version
/// - `AlreadyResolved`, `NotFound`, `InvalidTransition`
pub async fn feedback_submit(
    engine: &Engine,
    feedback: ReviewerFeedback,
    now: DateTime<Utc>,
) -> Result<FeedbackOutcome, ExError> {
    log_op_start!(
        "feedback_submit",
        task_id = %feedback.task_id,
        reviewer = %feedback.reviewer,
        version = feedback.version
    );
    let start = Instant::now();

    let outcome = engine.submit_feedback(feedback, now).await.map_err(|e| {
        log_op_error!("feedback_submit", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "feedback_submit",
        duration_ms = elapsed_ms(start),
        decision_id = %outcome.decision_id,
        status = outcome.status.as_str(),
        version = outcome.version
    );
    Ok(outcome)
}

/// Escalate overdue tasks and archive expired decisions
///
/// ## Errors
///
/// - `Persistence`
pub async fn workflow_sweep(engine: &Engine, now: DateTime<Utc>) -> Result<SweepReport, ExError> {
    log_op_start!("workflow_sweep");
    let start = Instant::now();

    let report = engine.sweep(now).await.map_err(|e| {
        log_op_error!("workflow_sweep", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "workflow_sweep",
        duration_ms = elapsed_ms(start),
        escalated = report.escalated.len(),
        archived = report.archived.len()
    );
    Ok(report)
}

/// ## Errors
///
/// - `InvalidTransition`: already archived
pub async fn decision_archive(
    engine: &Engine,
    decision_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<u32, ExError> {
    log_op_start!("decision_archive", decision_id = decision_id);
    let start = Instant::now();

    let version = engine
        .archive_decision(decision_id, reason, now)
        .await
        .map_err(|e| {
            log_op_error!("decision_archive", e.clone(), duration_ms = elapsed_ms(start));
            e
        })?;

    log_op_end!(
        "decision_archive",
        duration_ms = elapsed_ms(start),
        version = version
    );
    Ok(version)
}

/// Archive everything in a deleted repository or workspace
///
/// ## Errors
///
/// - `Persistence`
pub async fn scope_cancel(
    engine: &Engine,
    scope: &Scope,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<ScopeCancellation, ExError> {
    log_op_start!("scope_cancel", scope = %scope);
    let start = Instant::now();

    let result = engine.cancel_scope(scope, reason, now).await.map_err(|e| {
        log_op_error!("scope_cancel", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "scope_cancel",
        duration_ms = elapsed_ms(start),
        archived = result.archived.len(),
        cancelled_tasks = result.cancelled_tasks.len()
    );
    Ok(result)
}

/// Publish the next weight version from the validation history
///
/// ## Errors
///
/// - `InvalidInput`: not enough validation samples
pub async fn weights_recalibrate(
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<CalibrationEvent, ExError> {
    log_op_start!("weights_recalibrate");
    let start = Instant::now();

    let event = engine.recalibrate(now).await.map_err(|e| {
        log_op_error!("weights_recalibrate", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "weights_recalibrate",
        duration_ms = elapsed_ms(start),
        to_version = event.to_version,
        sample_count = event.sample_count
    );
    Ok(event)
}

/// Delete half edges left by an interrupted writer
///
/// ## Errors
///
/// - `Persistence`
pub async fn graph_reconcile(
    engine: &Engine,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, ExError> {
    log_op_start!("graph_reconcile");
    let start = Instant::now();

    let removed = engine.reconcile(now).await.map_err(|e| {
        log_op_error!("graph_reconcile", e.clone(), duration_ms = elapsed_ms(start));
        e
    })?;

    log_op_end!(
        "graph_reconcile",
        duration_ms = elapsed_ms(start),
        removed = removed.len()
    );
    Ok(removed)
}
