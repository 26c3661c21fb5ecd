//! Engine-level commands as data, for hosts that dispatch by value

use chrono::{DateTime, Utc};

use memora_core::errors::ExError;
use memora_core::model::{CalibrationEvent, ReviewerFeedback, Scope, ValidationTask};
use memora_core::ops::validation_ops::{FeedbackOutcome, Routing, ScopeCancellation};

use super::{pipeline, workflow};
use crate::engine::{Engine, PipelineOutcome, SweepReport};

/// Mutating commands that need no constructed entity
#[derive(Debug, Clone)]
pub enum EngineCommand {
    SubmitFeedback(ReviewerFeedback),
    StartReview { task_id: String, reviewer: String },
    RequestReview { decision_id: String },
    Archive { decision_id: String, reason: String },
    CancelScope { scope: Scope, reason: String },
    Sweep,
    Recalibrate,
    Reconcile,
    RunPipeline,
    RetryDeferred,
}

#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    Feedback(FeedbackOutcome),
    ReviewStarted(ValidationTask),
    ReviewRequested(Routing),
    Archived { version: u32 },
    ScopeCancelled(ScopeCancellation),
    Swept(SweepReport),
    Recalibrated(CalibrationEvent),
    Reconciled { removed: Vec<(String, String)> },
    Pipeline(Vec<PipelineOutcome>),
}

/// Apply one command at `now`
///
/// # Errors
///
/// Whatever the underlying command returns.
pub async fn apply_engine_command(
    engine: &Engine,
    cmd: EngineCommand,
    now: DateTime<Utc>,
) -> Result<EngineCommandResult, ExError> {
    match cmd {
        EngineCommand::SubmitFeedback(feedback) => {
            workflow::feedback_submit(engine, feedback, now)
                .await
                .map(EngineCommandResult::Feedback)
        }
        EngineCommand::StartReview { task_id, reviewer } => {
            workflow::review_start(engine, &task_id, &reviewer, now)
                .await
                .map(EngineCommandResult::ReviewStarted)
        }
        EngineCommand::RequestReview { decision_id } => {
            workflow::review_request(engine, &decision_id, now)
                .await
                .map(EngineCommandResult::ReviewRequested)
        }
        EngineCommand::Archive {
            decision_id,
            reason,
        } => workflow::decision_archive(engine, &decision_id, &reason, now)
            .await
            .map(|version| EngineCommandResult::Archived { version }),
        EngineCommand::CancelScope { scope, reason } => {
            workflow::scope_cancel(engine, &scope, &reason, now)
                .await
                .map(EngineCommandResult::ScopeCancelled)
        }
        EngineCommand::Sweep => workflow::workflow_sweep(engine, now)
            .await
            .map(EngineCommandResult::Swept),
        EngineCommand::Recalibrate => workflow::weights_recalibrate(engine, now)
            .await
            .map(EngineCommandResult::Recalibrated),
        EngineCommand::Reconcile => workflow::graph_reconcile(engine, now)
            .await
            .map(|removed| EngineCommandResult::Reconciled { removed }),
        EngineCommand::RunPipeline => pipeline::pipeline_run(engine, now)
            .await
            .map(EngineCommandResult::Pipeline),
        EngineCommand::RetryDeferred => pipeline::deferred_retry(engine, now)
            .await
            .map(EngineCommandResult::Pipeline),
    }
}
