//! Evidence normalization
//!
//! Pure mapping from an adapter's `IngestionEvent` to an `EvidenceItem`.
//! Persistence and de-duplication are the caller's responsibility.

use crate::errors::{MemoraError, Result};
use crate::model::{EventType, EvidenceItem, IngestionEvent, ReviewState, Scope, SourceType};

/// Deterministic event type → source type mapping
pub fn source_type_for(event_type: EventType) -> SourceType {
    match event_type {
        EventType::PrCreated
        | EventType::PrUpdated
        | EventType::PrClosed
        | EventType::ReviewComment
        | EventType::IssueCommented => SourceType::PrComment,
        EventType::PrMerged => SourceType::CodeDiff,
        EventType::CommitPushed | EventType::BranchCreated | EventType::BranchDeleted => {
            SourceType::Commit
        }
        EventType::ReviewSubmitted => SourceType::Review,
        EventType::IssueCreated
        | EventType::IssueUpdated
        | EventType::IssueClosed
        | EventType::SprintStarted
        | EventType::SprintCompleted => SourceType::TicketUpdate,
        EventType::MessageSent
        | EventType::ThreadReply
        | EventType::ReactionAdded
        | EventType::Unknown => SourceType::ChatMessage,
    }
}

/// Normalize one ingestion event
///
/// The evidence `source_id` is `"{platform}:{event_type}:{source_id}"`, so
/// normalizing the same event twice yields the same identifier.
///
/// # Errors
///
/// `MalformedEvent` naming the first missing or blank required field
/// (`platform`, `timestamp`, `author`, `source_id`, `content`).
pub fn normalize(event: &IngestionEvent) -> Result<EvidenceItem> {
    let missing = |field: &str| MemoraError::MalformedEvent {
        event_id: event.event_id.clone(),
        field: field.to_string(),
    };

    let platform = event.platform.ok_or_else(|| missing("platform"))?;
    let timestamp = event.timestamp.ok_or_else(|| missing("timestamp"))?;
    let author = non_blank(event.author.as_deref()).ok_or_else(|| missing("author"))?;
    let source_id = non_blank(event.source_id.as_deref()).ok_or_else(|| missing("source_id"))?;
    let body = non_blank(event.content.as_deref()).ok_or_else(|| missing("content"))?;

    let mut content = match non_blank(event.title.as_deref()) {
        Some(title) if !body.starts_with(title) => format!("{}\n\n{}", title, body),
        _ => body.to_string(),
    };
    // a submitted review's verdict is part of what the reviewer said
    if let (EventType::ReviewSubmitted, Some(state)) = (event.event_type, event.review_state) {
        let verdict = match state {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes requested",
            ReviewState::Commented => "commented",
        };
        content = format!("[review: {}] {}", verdict, content);
    }

    Ok(EvidenceItem::new(
        source_type_for(event.event_type),
        format!("{}:{}:{}", platform, event.event_type.as_str(), source_id),
        content,
        author.to_string(),
        timestamp,
        platform,
        event.url.clone(),
    ))
}

/// Scope an event belongs to: workspace wins over repository
pub fn scope_of(event: &IngestionEvent) -> Option<Scope> {
    if let Some(ws) = non_blank(event.workspace_id.as_deref()) {
        return Some(Scope::Workspace(ws.to_string()));
    }
    non_blank(event.repository.as_deref()).map(|r| Scope::Repository(r.to_string()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
