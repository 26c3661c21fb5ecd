//! Confidence scores and the factor weight configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{MemoraError, Result};

/// Tolerance for "weights sum to 1.0"
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// The five scoring factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    EvidenceQuality,
    EvidenceQuantity,
    ParticipantAuthority,
    TemporalConsistency,
    OutcomeValidation,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::EvidenceQuality,
        Factor::EvidenceQuantity,
        Factor::ParticipantAuthority,
        Factor::TemporalConsistency,
        Factor::OutcomeValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::EvidenceQuality => "evidence_quality",
            Factor::EvidenceQuantity => "evidence_quantity",
            Factor::ParticipantAuthority => "participant_authority",
            Factor::TemporalConsistency => "temporal_consistency",
            Factor::OutcomeValidation => "outcome_validation",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per factor; serializes as a map with the fixed factor keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorSet<T> {
    pub evidence_quality: T,
    pub evidence_quantity: T,
    pub participant_authority: T,
    pub temporal_consistency: T,
    pub outcome_validation: T,
}

impl<T> FactorSet<T> {
    pub fn from_fn(mut f: impl FnMut(Factor) -> T) -> Self {
        Self {
            evidence_quality: f(Factor::EvidenceQuality),
            evidence_quantity: f(Factor::EvidenceQuantity),
            participant_authority: f(Factor::ParticipantAuthority),
            temporal_consistency: f(Factor::TemporalConsistency),
            outcome_validation: f(Factor::OutcomeValidation),
        }
    }

    pub fn get(&self, factor: Factor) -> &T {
        match factor {
            Factor::EvidenceQuality => &self.evidence_quality,
            Factor::EvidenceQuantity => &self.evidence_quantity,
            Factor::ParticipantAuthority => &self.participant_authority,
            Factor::TemporalConsistency => &self.temporal_consistency,
            Factor::OutcomeValidation => &self.outcome_validation,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, &T)> {
        Factor::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

impl FactorSet<f64> {
    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, v)| *v).sum()
    }

    /// Σ self[f] · other[f]
    pub fn dot(&self, other: &FactorSet<f64>) -> f64 {
        Factor::ALL
            .into_iter()
            .map(|f| self.get(f) * other.get(f))
            .sum()
    }
}

/// Factor weights: non-negative, summing to 1.0
pub type FactorWeights = FactorSet<f64>;

impl FactorWeights {
    /// Shipped defaults: quality 0.30, quantity 0.20, authority 0.25,
    /// temporal 0.15, outcome 0.10
    pub fn defaults() -> Self {
        Self {
            evidence_quality: 0.30,
            evidence_quantity: 0.20,
            participant_authority: 0.25,
            temporal_consistency: 0.15,
            outcome_validation: 0.10,
        }
    }

    /// # Errors
    ///
    /// `InvalidWeights` if any weight is negative or non-finite, or the sum
    /// is not 1.0 within `WEIGHT_EPSILON`.
    pub fn validate(&self) -> Result<()> {
        for (factor, w) in self.iter() {
            if !w.is_finite() || *w < 0.0 {
                return Err(MemoraError::InvalidWeights {
                    reason: format!("{} = {} is not a non-negative number", factor, w),
                });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(MemoraError::InvalidWeights {
                reason: format!("weights sum to {}, expected 1.0", sum),
            });
        }
        Ok(())
    }
}

/// A versioned weight configuration
///
/// Weights are never mutated in place. Recalibration produces a new
/// version and an audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub version: u32,
    pub weights: FactorWeights,
    pub created_at: DateTime<Utc>,
}

impl WeightsConfig {
    /// Version 1 from the given (validated) weights
    ///
    /// # Errors
    ///
    /// `InvalidWeights` when the weights fail validation.
    pub fn initial(weights: FactorWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            version: 1,
            weights,
            created_at: Utc::now(),
        })
    }

    pub fn next(&self, weights: FactorWeights, at: DateTime<Utc>) -> Self {
        Self {
            version: self.version + 1,
            weights,
            created_at: at,
        }
    }
}

/// Confidence attached 1:1 to a decision version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// clamp(Σ weight·factor, 0, 1)
    pub overall: f64,
    pub factors: FactorSet<f64>,
    pub weights: FactorWeights,
    pub explanation: FactorSet<String>,
    /// Version of the weight configuration used
    pub weights_version: u32,
}

impl ConfidenceScore {
    /// Placeholder carried by a freshly built decision until it is scored
    pub fn unscored(weights: &WeightsConfig) -> Self {
        Self {
            overall: 0.0,
            factors: FactorSet::default(),
            weights: weights.weights.clone(),
            explanation: FactorSet::from_fn(|_| "not yet scored".to_string()),
            weights_version: weights.version,
        }
    }

    /// Recompute `overall` from the stored factors and weights
    pub fn recomputed_overall(&self) -> f64 {
        self.factors.dot(&self.weights).clamp(0.0, 1.0)
    }
}
