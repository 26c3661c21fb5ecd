//! Validation workflow
//!
//! Routes scored decisions into human review, applies reviewer feedback,
//! escalates overdue tasks and ages superseded decisions into the archive.
//! Status changes always produce a new decision version. Notifications are
//! returned, never sent from here.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::authority::AuthorityDirectory;
use crate::errors::{MemoraError, Result};
use crate::model::decision::AUTO_ACCEPT_VALIDATOR;
use crate::model::{
    CalibrationEvent, DecisionEntity, DecisionStatus, ResolutionOutcome, ReviewerFeedback, Scope,
    TaskKind, TaskPriority, TaskResolution, TaskStatus, ValidationOutcome, ValidationSample,
    ValidationTask, Verdict,
};
use crate::notifier::{Notification, NotificationReason};
use crate::ops::{decision_ops, OpContext, Store};
use crate::scorer;

/// What routing did to a decision
#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    /// At or above threshold with auto-accept enabled
    AutoAccepted { version: u32 },
    /// Below threshold: now `pending_validation` with one open task
    AwaitingReview { task: ValidationTask },
    /// Open tasks now target the newest version
    Retargeted { tasks: Vec<ValidationTask> },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutingOutcome {
    pub routing: Routing,
    pub notifications: Vec<Notification>,
}

impl RoutingOutcome {
    fn unchanged() -> Self {
        Self {
            routing: Routing::Unchanged,
            notifications: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackOutcome {
    pub decision_id: String,
    pub status: DecisionStatus,
    /// Current version after the feedback was applied
    pub version: u32,
    /// Follow-up review task, if one was opened
    pub next_task: Option<ValidationTask>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EscalationOutcome {
    pub escalated: Vec<ValidationTask>,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeCancellation {
    pub archived: Vec<String>,
    pub cancelled_tasks: Vec<String>,
    pub dropped_batches: Vec<String>,
}

/// Pick a reviewer: highest authority first, then fewest open tasks, then name
pub fn select_reviewer(
    store: &Store,
    authority: &dyn AuthorityDirectory,
    candidates: Vec<String>,
    excluded: &BTreeSet<String>,
) -> Option<String> {
    let mut pool: Vec<(String, f64, usize)> = candidates
        .into_iter()
        .filter(|c| !excluded.contains(c))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|c| {
            let a = authority.authority(&c);
            let load = store.open_task_count(&c);
            (c, a, load)
        })
        .collect();
    pool.sort_by(|x, y| {
        y.1.total_cmp(&x.1)
            .then_with(|| x.2.cmp(&y.2))
            .then_with(|| x.0.cmp(&y.0))
    });
    pool.into_iter().next().map(|(c, _, _)| c)
}

fn open_task(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision: &DecisionEntity,
    kind: TaskKind,
    priority: TaskPriority,
    also_excluded: &BTreeSet<String>,
) -> ValidationTask {
    let excluded: BTreeSet<String> = decision
        .participants
        .iter()
        .chain(also_excluded)
        .cloned()
        .collect();
    let reviewer = select_reviewer(
        store,
        ctx.authority,
        ctx.authority.reviewers_for(&decision.scope),
        &excluded,
    );
    let task = ValidationTask {
        task_id: uuid::Uuid::now_v7().to_string(),
        decision_id: decision.decision_id.clone(),
        version: decision.version,
        kind,
        assigned_reviewer: reviewer,
        created_at: ctx.now,
        due_at: ctx.now + ctx.config.task_due_window(),
        priority,
        status: TaskStatus::Pending,
        escalation_count: 0,
        resolution: None,
    };
    tracing::debug!(
        task_id = %task.task_id,
        decision_id = %task.decision_id,
        reviewer = task.assigned_reviewer.as_deref().unwrap_or("-"),
        "validation task opened"
    );
    store.put_task(task.clone());
    task
}

/// Route a freshly scored `inferred` decision
///
/// Below the threshold the decision moves to `pending_validation` and one
/// task is opened. At or above it the decision stays `inferred`, unless
/// `auto_accept_above_threshold` validates it on the policy's behalf.
///
/// # Errors
///
/// `DecisionNotFound`.
pub fn route(store: &mut Store, ctx: &OpContext<'_>, decision_id: &str) -> Result<RoutingOutcome> {
    let current = store.current(decision_id)?;
    if current.status != DecisionStatus::Inferred {
        return Ok(RoutingOutcome::unchanged());
    }
    let threshold = ctx.config.validation_threshold;
    let overall = current.confidence.overall;

    if overall >= threshold {
        if !ctx.config.auto_accept_above_threshold {
            return Ok(RoutingOutcome::unchanged());
        }
        let version = decision_ops::transition(
            store,
            ctx,
            decision_id,
            DecisionStatus::Validated,
            Some(AUTO_ACCEPT_VALIDATOR),
        )?;
        return Ok(RoutingOutcome {
            routing: Routing::AutoAccepted { version },
            notifications: Vec::new(),
        });
    }

    let priority = if overall < threshold / 2.0 {
        TaskPriority::High
    } else {
        TaskPriority::Normal
    };
    await_review(store, ctx, decision_id, TaskKind::LowConfidence, priority)
}

/// Open a review on an `inferred` decision at a human's request
///
/// # Errors
///
/// `DecisionNotFound`, or `InvalidTransition` unless the decision is
/// `inferred`.
pub fn request_review(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
) -> Result<RoutingOutcome> {
    let current = store.current(decision_id)?;
    if current.status != DecisionStatus::Inferred {
        return Err(MemoraError::InvalidTransition {
            decision_id: decision_id.to_string(),
            from: current.status.to_string(),
            to: DecisionStatus::PendingValidation.to_string(),
        });
    }
    await_review(store, ctx, decision_id, TaskKind::Requested, TaskPriority::Normal)
}

fn await_review(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
    kind: TaskKind,
    priority: TaskPriority,
) -> Result<RoutingOutcome> {
    decision_ops::transition(store, ctx, decision_id, DecisionStatus::PendingValidation, None)?;
    let decision = store.current(decision_id)?.clone();
    let task = open_task(store, ctx, &decision, kind, priority, &BTreeSet::new());
    Ok(RoutingOutcome {
        notifications: Notification::for_assignee(&task, NotificationReason::Assigned)
            .into_iter()
            .collect(),
        routing: Routing::AwaitingReview { task },
    })
}

/// Workflow follow-up after new evidence produced a new version
///
/// `inferred` decisions are routed again against the new score. Decisions
/// under review keep their status; their open tasks move to the new version
/// and the assignees are asked to look again.
///
/// # Errors
///
/// `DecisionNotFound`.
pub fn after_revision(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
) -> Result<RoutingOutcome> {
    let current = store.current(decision_id)?;
    if current.status == DecisionStatus::Inferred {
        return route(store, ctx, decision_id);
    }
    if !current.status.awaits_review() {
        return Ok(RoutingOutcome::unchanged());
    }

    let version = current.version;
    let mut tasks = Vec::new();
    let mut notifications = Vec::new();
    let open: Vec<ValidationTask> = store
        .open_tasks_for(decision_id)
        .into_iter()
        .filter(|t| t.version != version)
        .cloned()
        .collect();
    for mut task in open {
        task.version = version;
        store.put_task(task.clone());
        notifications.extend(Notification::for_assignee(
            &task,
            NotificationReason::ReReviewCurrentVersion,
        ));
        tasks.push(task);
    }
    if tasks.is_empty() {
        return Ok(RoutingOutcome::unchanged());
    }
    Ok(RoutingOutcome {
        routing: Routing::Retargeted { tasks },
        notifications,
    })
}

/// Workflow follow-up after a caller wrote a version directly
///
/// Same as [`after_revision`], except that a decision written straight into
/// `pending_validation` or `disputed` gets a task if it has none open.
///
/// # Errors
///
/// `DecisionNotFound`.
pub fn after_upsert(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
) -> Result<RoutingOutcome> {
    let current = store.current(decision_id)?;
    if !current.status.awaits_review() || !store.open_tasks_for(decision_id).is_empty() {
        return after_revision(store, ctx, decision_id);
    }

    let decision = current.clone();
    let kind = if decision.status == DecisionStatus::Disputed {
        TaskKind::ReReview
    } else {
        TaskKind::Requested
    };
    let task = open_task(store, ctx, &decision, kind, TaskPriority::Normal, &BTreeSet::new());
    Ok(RoutingOutcome {
        notifications: Notification::for_assignee(&task, NotificationReason::Assigned)
            .into_iter()
            .collect(),
        routing: Routing::AwaitingReview { task },
    })
}

/// Claim a task: `pending`/`escalated` → `in_review`
///
/// # Errors
///
/// * `TaskNotFound`
/// * `TaskAlreadyResolved`
/// * `InvalidInput` - blank reviewer, or the task is in review by someone else
pub fn start_review(
    store: &mut Store,
    task_id: &str,
    reviewer: &str,
) -> Result<ValidationTask> {
    let mut task = store.task(task_id)?.clone();
    if !task.is_open() {
        return Err(MemoraError::TaskAlreadyResolved {
            task_id: task_id.to_string(),
        });
    }
    let reviewer = reviewer.trim();
    if reviewer.is_empty() {
        return Err(MemoraError::InvalidInput {
            reason: "reviewer cannot be empty".to_string(),
        });
    }
    if task.status == TaskStatus::InReview && task.assigned_reviewer.as_deref() != Some(reviewer) {
        return Err(MemoraError::InvalidInput {
            reason: format!(
                "task {} is already in review by {}",
                task_id,
                task.assigned_reviewer.as_deref().unwrap_or("-")
            ),
        });
    }
    task.status = TaskStatus::InReview;
    task.assigned_reviewer = Some(reviewer.to_string());
    store.put_task(task.clone());
    Ok(task)
}

/// Apply a reviewer's verdict
///
/// Every accepted feedback appends a validation sample; weights are not
/// touched. First review: approve validates, reject disputes and opens a
/// re-review. Re-review of a disputed decision validates once consensus is
/// reached: enough distinct approvers outnumbering rejecters, or a single
/// approver at or above the senior override authority. Otherwise another
/// re-review task is opened.
///
/// # Errors
///
/// * `TaskNotFound` / `TaskAlreadyResolved`
/// * `StaleFeedback` - the feedback or the task targets an old version
/// * `InvalidTransition` - the decision is no longer under review
/// * `InvalidInput` - blank reviewer
pub fn submit_feedback(
    store: &mut Store,
    ctx: &OpContext<'_>,
    feedback: &ReviewerFeedback,
) -> Result<FeedbackOutcome> {
    let task = store.task(&feedback.task_id)?.clone();
    if !task.is_open() {
        return Err(MemoraError::TaskAlreadyResolved {
            task_id: task.task_id,
        });
    }
    let reviewer = feedback.reviewer.trim();
    if reviewer.is_empty() {
        return Err(MemoraError::InvalidInput {
            reason: "reviewer cannot be empty".to_string(),
        });
    }
    let current = store.current(&task.decision_id)?.clone();
    if feedback.version != current.version || task.version != current.version {
        return Err(MemoraError::StaleFeedback {
            decision_id: current.decision_id,
            task_id: task.task_id,
            feedback_version: feedback.version,
            current_version: current.version,
        });
    }
    let outcome = match feedback.verdict {
        Verdict::Approve => ValidationOutcome::Validated,
        Verdict::Reject => ValidationOutcome::Disputed,
    };
    if !current.status.awaits_review() {
        return Err(MemoraError::InvalidTransition {
            decision_id: current.decision_id,
            from: current.status.to_string(),
            to: outcome_status(outcome).to_string(),
        });
    }

    store.push_sample(ValidationSample {
        decision_id: current.decision_id.clone(),
        version: current.version,
        reviewer: reviewer.to_string(),
        predicted: current.confidence.overall,
        factors: current.confidence.factors.clone(),
        outcome,
        recorded_at: ctx.now,
    });
    resolve(
        store,
        task,
        match feedback.verdict {
            Verdict::Approve => ResolutionOutcome::Approved,
            Verdict::Reject => ResolutionOutcome::Rejected,
        },
        feedback.reason.clone(),
        Some(reviewer),
        ctx.now,
    );

    let decision_id = current.decision_id.clone();
    let validated = match (current.status, feedback.verdict) {
        (DecisionStatus::PendingValidation, Verdict::Approve) => true,
        (DecisionStatus::PendingValidation, Verdict::Reject) => {
            decision_ops::transition(store, ctx, &decision_id, DecisionStatus::Disputed, None)?;
            false
        }
        (_, verdict) => verdict == Verdict::Approve && consensus_reached(store, ctx, &current, reviewer),
    };

    if validated {
        let version = decision_ops::transition(
            store,
            ctx,
            &decision_id,
            DecisionStatus::Validated,
            Some(reviewer),
        )?;
        cancel_open_tasks(store, ctx, &decision_id, "validated");
        return Ok(FeedbackOutcome {
            decision_id,
            status: DecisionStatus::Validated,
            version,
            next_task: None,
            notifications: Vec::new(),
        });
    }

    // still disputed: keep exactly one re-review open
    let disputed = store.current(&decision_id)?.clone();
    let mut next_task = None;
    let mut notifications = Vec::new();
    if store.open_tasks_for(&decision_id).is_empty() {
        // fresh eyes: nobody who already judged this decision
        let voters: BTreeSet<String> = store
            .validation_history()
            .iter()
            .filter(|s| s.decision_id == decision_id)
            .map(|s| s.reviewer.clone())
            .chain(std::iter::once(reviewer.to_string()))
            .collect();
        let task = open_task(
            store,
            ctx,
            &disputed,
            TaskKind::ReReview,
            TaskPriority::High,
            &voters,
        );
        notifications.extend(Notification::for_assignee(&task, NotificationReason::Assigned));
        next_task = Some(task);
    }
    Ok(FeedbackOutcome {
        decision_id,
        status: disputed.status,
        version: disputed.version,
        next_task,
        notifications,
    })
}

fn outcome_status(outcome: ValidationOutcome) -> DecisionStatus {
    match outcome {
        ValidationOutcome::Validated => DecisionStatus::Validated,
        ValidationOutcome::Disputed => DecisionStatus::Disputed,
    }
}

/// Samples recorded against the version currently under dispute
fn round_votes<'a>(
    store: &'a Store,
    decision: &'a DecisionEntity,
) -> impl Iterator<Item = &'a ValidationSample> + 'a {
    store
        .validation_history()
        .iter()
        .filter(move |s| s.decision_id == decision.decision_id && s.version == decision.version)
}

fn consensus_reached(
    store: &Store,
    ctx: &OpContext<'_>,
    disputed: &DecisionEntity,
    approver: &str,
) -> bool {
    let policy = &ctx.config.consensus;
    if ctx.authority.authority(approver) >= policy.senior_override_authority {
        tracing::debug!(decision_id = %disputed.decision_id, approver, "senior override");
        return true;
    }
    let mut approvals = BTreeSet::new();
    let mut rejections = BTreeSet::new();
    for sample in round_votes(store, disputed) {
        match sample.outcome {
            ValidationOutcome::Validated => approvals.insert(sample.reviewer.as_str()),
            ValidationOutcome::Disputed => rejections.insert(sample.reviewer.as_str()),
        };
    }
    approvals.len() >= policy.required_approvals as usize && approvals.len() > rejections.len()
}

fn resolve(
    store: &mut Store,
    mut task: ValidationTask,
    outcome: ResolutionOutcome,
    reason: Option<String>,
    resolved_by: Option<&str>,
    at: DateTime<Utc>,
) -> ValidationTask {
    if task.assigned_reviewer.is_none() {
        task.assigned_reviewer = resolved_by.map(str::to_string);
    }
    task.status = TaskStatus::Resolved;
    task.resolution = Some(TaskResolution {
        outcome,
        reason,
        resolved_by: resolved_by.map(str::to_string),
        resolved_at: at,
    });
    store.put_task(task.clone());
    task
}

/// Resolve every open task of a decision as cancelled
pub fn cancel_open_tasks(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
    reason: &str,
) -> Vec<ValidationTask> {
    let open: Vec<ValidationTask> = store
        .open_tasks_for(decision_id)
        .into_iter()
        .cloned()
        .collect();
    open.into_iter()
        .map(|task| {
            resolve(
                store,
                task,
                ResolutionOutcome::Cancelled,
                Some(reason.to_string()),
                None,
                ctx.now,
            )
        })
        .collect()
}

/// Escalate every open task past its due date
///
/// Each is bumped in priority, reassigned from the full reviewer pool when
/// someone else is available, and given a fresh due date.
///
/// # Errors
///
/// Currently infallible; returns `Result` like every other operation.
pub fn escalate_overdue(store: &mut Store, ctx: &OpContext<'_>) -> Result<EscalationOutcome> {
    let overdue: Vec<ValidationTask> = store
        .tasks()
        .filter(|t| t.is_overdue(ctx.now))
        .cloned()
        .collect();

    let mut outcome = EscalationOutcome::default();
    for mut task in overdue {
        let Ok(decision) = store.current(&task.decision_id) else {
            continue;
        };
        let mut excluded: BTreeSet<String> = decision.participants.clone();
        excluded.extend(task.assigned_reviewer.clone());
        if let Some(reviewer) =
            select_reviewer(store, ctx.authority, ctx.authority.all_reviewers(), &excluded)
        {
            task.assigned_reviewer = Some(reviewer);
        }
        task.status = TaskStatus::Escalated;
        task.priority = task.priority.bump();
        task.escalation_count += 1;
        task.due_at = ctx.now + ctx.config.task_due_window();
        tracing::warn!(
            task_id = %task.task_id,
            decision_id = %task.decision_id,
            escalation_count = task.escalation_count,
            reviewer = task.assigned_reviewer.as_deref().unwrap_or("-"),
            "validation task escalated"
        );
        store.put_task(task.clone());
        outcome
            .notifications
            .extend(Notification::for_assignee(&task, NotificationReason::Escalated));
        outcome.escalated.push(task);
    }
    Ok(outcome)
}

/// Archive superseded decisions older than the retention period
///
/// # Errors
///
/// Propagates version errors from the archive transition.
pub fn archive_expired(store: &mut Store, ctx: &OpContext<'_>) -> Result<Vec<String>> {
    let retention = ctx.config.archival_retention();
    let expired: Vec<String> = store
        .list_current()
        .into_iter()
        .filter(|d| d.status == DecisionStatus::Superseded && d.updated_at + retention < ctx.now)
        .map(|d| d.decision_id.clone())
        .collect();
    for id in &expired {
        decision_ops::transition(store, ctx, id, DecisionStatus::Archived, None)?;
    }
    Ok(expired)
}

/// Archive a decision on request and cancel its open tasks
///
/// # Errors
///
/// `DecisionNotFound`, or `InvalidTransition` if already archived.
pub fn archive_decision(
    store: &mut Store,
    ctx: &OpContext<'_>,
    decision_id: &str,
    reason: &str,
) -> Result<u32> {
    let version =
        decision_ops::transition(store, ctx, decision_id, DecisionStatus::Archived, None)?;
    cancel_open_tasks(store, ctx, decision_id, reason);
    Ok(version)
}

/// Upstream deletion of a repository or workspace
///
/// Archives every decision in scope, cancels their open tasks and drops
/// their pending inference batches. Nothing is deleted.
///
/// # Errors
///
/// Propagates version errors from the archive transitions.
pub fn cancel_scope(
    store: &mut Store,
    ctx: &OpContext<'_>,
    scope: &Scope,
    reason: &str,
) -> Result<ScopeCancellation> {
    let mut result = ScopeCancellation::default();
    let ids: Vec<String> = store
        .list_current()
        .into_iter()
        .filter(|d| &d.scope == scope && d.status != DecisionStatus::Archived)
        .map(|d| d.decision_id.clone())
        .collect();
    for id in ids {
        decision_ops::transition(store, ctx, &id, DecisionStatus::Archived, None)?;
        result.cancelled_tasks.extend(
            cancel_open_tasks(store, ctx, &id, reason)
                .into_iter()
                .map(|t| t.task_id),
        );
        result.archived.push(id);
    }
    let batches: Vec<String> = store
        .pending_batches()
        .filter(|b| &b.scope == scope)
        .map(|b| b.batch_id.clone())
        .collect();
    for batch_id in batches {
        store.remove_batch(&batch_id);
        result.dropped_batches.push(batch_id);
    }
    Ok(result)
}

/// Explicit weight recalibration
///
/// Publishes the next weight version and records the audit event. Stored
/// scores of existing versions are left as they are.
///
/// # Errors
///
/// `InsufficientCalibrationSamples` when the history is too short.
pub fn recalibrate(store: &mut Store, ctx: &OpContext<'_>) -> Result<CalibrationEvent> {
    let recalibration = scorer::recalibrate(
        store.weights(),
        store.validation_history(),
        &ctx.config.calibration,
        ctx.now,
    )?;
    store.publish_weights(recalibration.weights)?;
    store.push_calibration(recalibration.event.clone());
    Ok(recalibration.event)
}
