//! Decision building
//!
//! Turns an evidence batch plus a provider proposal into version 1 of a
//! decision, sorting every item into exactly one evidence bucket.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::errors::{MemoraError, Result};
use crate::model::decision::INFERRED_BY;
use crate::model::{
    ConfidenceScore, DecisionEntity, DecisionStatus, EvidenceBucket, EvidenceBuckets,
    EvidenceItem, ProviderResult, Scope, SourceType, WeightsConfig,
};

const UNTITLED: &str = "Untitled Decision";

/// Phrases that turn a comment into a sign-off
const APPROVAL_MARKERS: [&str; 7] = [
    "lgtm",
    "approved",
    "approve this",
    "ship it",
    ":shipit:",
    "signed off",
    "+1",
];

/// Identity and context for a build
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub decision_id: String,
    pub scope: Scope,
    pub weights: &'a WeightsConfig,
    pub source_event_ids: Vec<String>,
    pub now: DateTime<Utc>,
}

/// Bucket for an item seen while a decision is first built
pub fn classify(item: &EvidenceItem) -> EvidenceBucket {
    match item.source_type {
        SourceType::Review => EvidenceBucket::Authority,
        SourceType::Commit | SourceType::CodeDiff => EvidenceBucket::Execution,
        SourceType::PrComment | SourceType::ChatMessage if is_sign_off(&item.content) => {
            EvidenceBucket::Authority
        }
        SourceType::PrComment | SourceType::ChatMessage | SourceType::TicketUpdate => {
            EvidenceBucket::Intent
        }
    }
}

/// Bucket for evidence attached to an existing decision: anything that
/// names the decision is an outcome, the rest is classified as usual.
pub fn classify_followup(item: &EvidenceItem, decision_id: &str) -> EvidenceBucket {
    if item.content.contains(decision_id) {
        EvidenceBucket::Outcomes
    } else {
        classify(item)
    }
}

fn is_sign_off(content: &str) -> bool {
    let lower = content.to_lowercase();
    APPROVAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Build version 1 of a decision
///
/// Returns `Ok(None)` when the provider says the batch holds no decision.
/// The returned decision is `inferred` and carries an unscored confidence;
/// the caller scores it before persisting.
///
/// # Errors
///
/// `InsufficientEvidence` when neither intent nor execution evidence is
/// present after classification.
pub fn build(
    ctx: &BuildContext<'_>,
    evidence_batch: &[EvidenceItem],
    provider_result: &ProviderResult,
) -> Result<Option<DecisionEntity>> {
    if !provider_result.is_decision {
        return Ok(None);
    }

    let mut evidence = EvidenceBuckets::default();
    for item in evidence_batch {
        evidence.push(classify(item), item.clone());
    }
    if !evidence.has_intent_or_execution() {
        return Err(MemoraError::InsufficientEvidence);
    }

    let participants: BTreeSet<String> = evidence
        .iter()
        .map(|(_, item)| item.author.as_str())
        .chain(provider_result.participants.iter().map(String::as_str))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let tags: BTreeSet<String> = provider_result
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    let title = match provider_result.title.trim() {
        "" => UNTITLED.to_string(),
        t => t.to_string(),
    };

    Ok(Some(DecisionEntity {
        decision_id: ctx.decision_id.clone(),
        version: 1,
        title,
        description: provider_result.description.trim().to_string(),
        rationale: provider_result.rationale.trim().to_string(),
        alternatives_considered: provider_result
            .alternatives_considered
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        evidence,
        confidence: ConfidenceScore::unscored(ctx.weights),
        status: DecisionStatus::Inferred,
        participants,
        tags,
        scope: ctx.scope.clone(),
        created_at: ctx.now,
        updated_at: ctx.now,
        related_decision_ids: BTreeSet::new(),
        superseded_by: None,
        supersedes: None,
        source_event_ids: ctx.source_event_ids.clone(),
        inferred_by: INFERRED_BY.to_string(),
        validated_by: None,
    }))
}
