//! Validation tasks and reviewer feedback

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InReview,
    Resolved,
    Escalated,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InReview => "in_review",
            TaskStatus::Resolved => "resolved",
            TaskStatus::Escalated => "escalated",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl TaskPriority {
    /// One step up, saturating at `Urgent`
    pub fn bump(&self) -> TaskPriority {
        match self {
            TaskPriority::Low => TaskPriority::Normal,
            TaskPriority::Normal => TaskPriority::High,
            TaskPriority::High | TaskPriority::Urgent => TaskPriority::Urgent,
        }
    }
}

/// Why the task exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Confidence fell below the validation threshold
    LowConfidence,
    /// A disputed decision is being reviewed again
    ReReview,
    /// Explicitly requested by a human
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResolution {
    pub outcome: ResolutionOutcome,
    pub reason: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Work item for human review of one decision version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationTask {
    pub task_id: String,
    pub decision_id: String,
    /// Version the reviewer is asked to judge
    pub version: u32,
    pub kind: TaskKind,
    pub assigned_reviewer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub escalation_count: u32,
    pub resolution: Option<TaskResolution>,
}

impl ValidationTask {
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Resolved
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now > self.due_at
    }
}

impl fmt::Display for ValidationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}@v{} reviewer={} due={}",
            self.task_id,
            self.status,
            self.decision_id,
            self.version,
            self.assigned_reviewer.as_deref().unwrap_or("-"),
            self.due_at.to_rfc3339()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

/// A reviewer's judgement on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerFeedback {
    pub task_id: String,
    pub reviewer: String,
    /// Decision version the reviewer looked at
    pub version: u32,
    pub verdict: Verdict,
    pub reason: Option<String>,
}
