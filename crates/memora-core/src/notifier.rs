//! Reviewer notification interface
//!
//! Fire-and-forget: delivery failures belong to the notifier and are never
//! retried by the engine.

use std::sync::Mutex;

use crate::model::ValidationTask;

/// Why a reviewer is being contacted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationReason {
    Assigned,
    Escalated,
    /// Feedback referenced an old version; look at the current one
    ReReviewCurrentVersion,
}

pub trait ReviewNotifier: Send + Sync {
    fn notify(&self, reviewer_id: &str, task: &ValidationTask, reason: NotificationReason);
}

/// A notification produced by a workflow operation
///
/// Operations collect these instead of calling the notifier directly so
/// nothing is sent for a mutation that is later rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub reviewer_id: String,
    pub task: ValidationTask,
    pub reason: NotificationReason,
}

impl Notification {
    /// Notification for the task's assignee, if it has one
    pub fn for_assignee(task: &ValidationTask, reason: NotificationReason) -> Option<Self> {
        task.assigned_reviewer.as_ref().map(|reviewer| Notification {
            reviewer_id: reviewer.clone(),
            task: task.clone(),
            reason,
        })
    }
}

/// Send every notification, in order
pub fn dispatch(notifier: &dyn ReviewNotifier, notifications: &[Notification]) {
    for n in notifications {
        notifier.notify(&n.reviewer_id, &n.task, n.reason);
    }
}

/// Drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ReviewNotifier for NoopNotifier {
    fn notify(&self, _: &str, _: &ValidationTask, _: NotificationReason) {}
}

/// Keeps notifications in memory, for tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, NotificationReason)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(reviewer_id, task_id, reason)` in send order
    pub fn sent(&self) -> Vec<(String, String, NotificationReason)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ReviewNotifier for RecordingNotifier {
    fn notify(&self, reviewer_id: &str, task: &ValidationTask, reason: NotificationReason) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((reviewer_id.to_string(), task.task_id.clone(), reason));
        }
    }
}
