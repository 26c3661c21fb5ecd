//! Ingestion events as delivered by the platform adapters
//!
//! Adapters (GitHub, GitLab, Slack, Jira) are external; all they must do is
//! produce this shape. Required fields are optional here so that a partial
//! payload can still be deserialized and rejected with a precise
//! `MalformedEvent` instead of an opaque parse error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evidence::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PrCreated,
    PrUpdated,
    PrMerged,
    PrClosed,
    ReviewSubmitted,
    ReviewComment,
    CommitPushed,
    BranchCreated,
    BranchDeleted,
    IssueCreated,
    IssueUpdated,
    IssueClosed,
    IssueCommented,
    MessageSent,
    ThreadReply,
    ReactionAdded,
    SprintStarted,
    SprintCompleted,
    #[serde(other)]
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PrCreated => "pr_created",
            EventType::PrUpdated => "pr_updated",
            EventType::PrMerged => "pr_merged",
            EventType::PrClosed => "pr_closed",
            EventType::ReviewSubmitted => "review_submitted",
            EventType::ReviewComment => "review_comment",
            EventType::CommitPushed => "commit_pushed",
            EventType::BranchCreated => "branch_created",
            EventType::BranchDeleted => "branch_deleted",
            EventType::IssueCreated => "issue_created",
            EventType::IssueUpdated => "issue_updated",
            EventType::IssueClosed => "issue_closed",
            EventType::IssueCommented => "issue_commented",
            EventType::MessageSent => "message_sent",
            EventType::ThreadReply => "thread_reply",
            EventType::ReactionAdded => "reaction_added",
            EventType::SprintStarted => "sprint_started",
            EventType::SprintCompleted => "sprint_completed",
            EventType::Unknown => "unknown",
        }
    }
}

/// State of a submitted code review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

/// Common event shape produced by every platform adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionEvent {
    /// Adapter-assigned id, used only for diagnostics
    pub event_id: String,
    pub platform: Option<Platform>,
    pub event_type: EventType,
    pub timestamp: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// Identifier unique within (platform, event_type)
    pub source_id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub repository: Option<String>,
    pub workspace_id: Option<String>,
    pub review_state: Option<ReviewState>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl IngestionEvent {
    /// Minimal well-formed event; optional context is filled with the `with_*` methods
    pub fn new(
        event_id: impl Into<String>,
        platform: Platform,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
        source_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            platform: Some(platform),
            event_type,
            timestamp: Some(timestamp),
            author: Some(author.into()),
            source_id: Some(source_id.into()),
            title: None,
            content: Some(content.into()),
            url: None,
            repository: None,
            workspace_id: None,
            review_state: None,
            tags: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_review_state(mut self, state: ReviewState) -> Self {
        self.review_state = Some(state);
        self
    }
}
