//! Validation history and weight recalibration audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::confidence::{FactorSet, FactorWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Validated,
    Disputed,
}

impl ValidationOutcome {
    /// Target value used when fitting weights
    pub fn as_target(&self) -> f64 {
        match self {
            ValidationOutcome::Validated => 1.0,
            ValidationOutcome::Disputed => 0.0,
        }
    }
}

/// One (prediction, human outcome) pair, appended on every feedback event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSample {
    pub decision_id: String,
    pub version: u32,
    pub reviewer: String,
    /// `overall` of the reviewed version at the time of feedback
    pub predicted: f64,
    /// Factor values of the reviewed version
    pub factors: FactorSet<f64>,
    pub outcome: ValidationOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// Audit record of one weight change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEvent {
    pub event_id: String,
    pub from_version: u32,
    pub to_version: u32,
    pub before: FactorWeights,
    pub after: FactorWeights,
    pub sample_count: usize,
    /// Mean squared gap between prediction and outcome, before and after
    pub error_before: f64,
    pub error_after: f64,
    pub recorded_at: DateTime<Utc>,
}
