//! Evidence items: immutable observations a decision is built from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::errors::MemoraError;

/// Development platform an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Gitlab,
    Slack,
    Jira,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Gitlab => "gitlab",
            Platform::Slack => "slack",
            Platform::Jira => "jira",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = MemoraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Platform::Github),
            "gitlab" => Ok(Platform::Gitlab),
            "slack" => Ok(Platform::Slack),
            "jira" => Ok(Platform::Jira),
            other => Err(MemoraError::InvalidInput {
                reason: format!("unknown platform '{}'", other),
            }),
        }
    }
}

/// Kind of artefact an evidence item was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    PrComment,
    Commit,
    Review,
    CodeDiff,
    ChatMessage,
    TicketUpdate,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::PrComment => "pr_comment",
            SourceType::Commit => "commit",
            SourceType::Review => "review",
            SourceType::CodeDiff => "code_diff",
            SourceType::ChatMessage => "chat_message",
            SourceType::TicketUpdate => "ticket_update",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic unit of observed activity
///
/// Immutable once created. `source_id` is unique per platform and event
/// type, so two items with the same `source_id` describe the same
/// observation and can be de-duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source_type: SourceType,
    pub source_id: String,
    pub content: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    pub url: Option<String>,
    /// SHA-256 of `content`, hex encoded
    pub content_hash: String,
}

impl EvidenceItem {
    pub fn new(
        source_type: SourceType,
        source_id: String,
        content: String,
        author: String,
        timestamp: DateTime<Utc>,
        platform: Platform,
        url: Option<String>,
    ) -> Self {
        let content_hash = Self::compute_content_hash(&content);
        Self {
            source_type,
            source_id,
            content,
            author,
            timestamp,
            platform,
            url,
            content_hash,
        }
    }

    fn compute_content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Content truncated to at most `max_chars` characters, on a char boundary
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            return self.content.clone();
        }
        let mut out: String = self.content.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

impl fmt::Display for EvidenceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} by {} at {}",
            self.platform,
            self.source_type,
            self.author,
            self.timestamp.to_rfc3339()
        )
    }
}
