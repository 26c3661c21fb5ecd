//! Provider results: candidate decision content proposed by a language model

use serde::{Deserialize, Serialize};

use crate::errors::{MemoraError, Result};

/// Advisory per-factor hints. Recorded for diagnostics, never used as the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorHints {
    pub evidence_quality: Option<f64>,
    pub evidence_quantity: Option<f64>,
    pub participant_authority: Option<f64>,
    pub temporal_consistency: Option<f64>,
    pub outcome_validation: Option<f64>,
}

/// What the inference provider proposes for an evidence batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub is_decision: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub alternatives_considered: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub confidence_hint: Option<f64>,
    #[serde(default)]
    pub factor_hints: FactorHints,
    /// Free-text references to earlier decisions the model recognised
    #[serde(default)]
    pub related_past_decisions: Vec<String>,
}

/// Shape returned by the model: `{"is_decision": .., "decision": {..}}`
#[derive(Debug, Deserialize)]
struct ModelEnvelope {
    is_decision: bool,
    #[serde(default)]
    decision: Option<ModelDecision>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelDecision {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    alternatives_considered: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    participants: Vec<String>,
    #[serde(default)]
    confidence_score: Option<f64>,
    #[serde(default)]
    confidence_factors: FactorHints,
    #[serde(default)]
    related_past_decisions: Vec<String>,
}

impl ProviderResult {
    pub fn not_a_decision() -> Self {
        Self::default()
    }

    /// Parse raw model text, tolerating a surrounding Markdown code fence
    ///
    /// # Errors
    ///
    /// `Serialization` when the text (after fence stripping) is not the
    /// expected JSON shape.
    pub fn from_model_text(text: &str) -> Result<Self> {
        let body = strip_code_fence(text.trim());
        if body.is_empty() {
            return Err(MemoraError::Serialization {
                message: "empty provider response".to_string(),
            });
        }
        let envelope: ModelEnvelope = serde_json::from_str(body)?;
        if !envelope.is_decision {
            return Ok(Self::not_a_decision());
        }
        let d = envelope.decision.unwrap_or_default();
        Ok(Self {
            is_decision: true,
            title: d.title,
            description: d.description,
            rationale: d.rationale,
            alternatives_considered: d.alternatives_considered,
            tags: d.tags,
            participants: d.participants,
            confidence_hint: d.confidence_score,
            factor_hints: d.confidence_factors,
            related_past_decisions: d.related_past_decisions,
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }
    // drop the opening fence line (```json) and the closing fence
    let without_open = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    match without_open.rfind("```") {
        Some(end) => without_open[..end].trim(),
        None => without_open.trim(),
    }
}
