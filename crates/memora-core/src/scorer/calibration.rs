//! Weight recalibration from human validation outcomes
//!
//! Fits weights to minimise the mean squared gap between `w·factors` and the
//! outcome target (validated = 1, disputed = 0), using projected gradient
//! descent that keeps every iterate on the probability simplex.

use chrono::{DateTime, Utc};

use crate::config::CalibrationSettings;
use crate::errors::{MemoraError, Result};
use crate::model::{
    CalibrationEvent, Factor, FactorSet, FactorWeights, ValidationSample, WeightsConfig,
};

/// New weights plus the audit record describing the change
#[derive(Debug, Clone, PartialEq)]
pub struct Recalibration {
    pub weights: WeightsConfig,
    pub event: CalibrationEvent,
}

/// Mean squared error of `weights` over `samples`
pub fn prediction_error(weights: &FactorWeights, samples: &[ValidationSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|s| {
            let predicted = s.factors.dot(weights).clamp(0.0, 1.0);
            (predicted - s.outcome.as_target()).powi(2)
        })
        .sum();
    total / samples.len() as f64
}

/// Fit a new weight configuration from the validation history
///
/// The result always passes [`FactorWeights::validate`]. When no iterate
/// improves on the current weights, the current weights are carried into the
/// new version unchanged so that every explicit recalibration is audited.
///
/// # Errors
///
/// `InsufficientCalibrationSamples` when fewer than `settings.min_samples`
/// samples are available.
pub fn recalibrate(
    current: &WeightsConfig,
    history: &[ValidationSample],
    settings: &CalibrationSettings,
    now: DateTime<Utc>,
) -> Result<Recalibration> {
    if history.len() < settings.min_samples.max(1) {
        return Err(MemoraError::InsufficientCalibrationSamples {
            available: history.len(),
            required: settings.min_samples.max(1),
        });
    }

    let error_before = prediction_error(&current.weights, history);
    let mut best = current.weights.clone();
    let mut best_error = error_before;
    let mut w = current.weights.clone();

    for _ in 0..settings.iterations {
        let grad = gradient(&w, history);
        let stepped = FactorSet::from_fn(|f| w.get(f) - settings.learning_rate * grad.get(f));
        w = project_onto_simplex(&stepped);
        let err = prediction_error(&w, history);
        if err < best_error {
            best_error = err;
            best = w.clone();
        }
    }

    let next = current.next(best, now);
    let event = CalibrationEvent {
        event_id: uuid::Uuid::now_v7().to_string(),
        from_version: current.version,
        to_version: next.version,
        before: current.weights.clone(),
        after: next.weights.clone(),
        sample_count: history.len(),
        error_before,
        error_after: best_error,
        recorded_at: now,
    };
    Ok(Recalibration {
        weights: next,
        event,
    })
}

/// ∂MSE/∂w = (2/n) Σ (w·x − y) x
fn gradient(w: &FactorWeights, samples: &[ValidationSample]) -> FactorSet<f64> {
    let n = samples.len() as f64;
    FactorSet::from_fn(|factor| {
        samples
            .iter()
            .map(|s| {
                let residual = s.factors.dot(w) - s.outcome.as_target();
                2.0 * residual * s.factors.get(factor)
            })
            .sum::<f64>()
            / n
    })
}

/// Euclidean projection onto {w : w ≥ 0, Σw = 1}
fn project_onto_simplex(v: &FactorSet<f64>) -> FactorWeights {
    let mut sorted: Vec<f64> = Factor::ALL.iter().map(|f| *v.get(*f)).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (i as f64 + 1.0);
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    let projected = FactorSet::from_fn(|f| (v.get(f) - theta).max(0.0));
    // absorb rounding drift so validate() holds exactly within epsilon
    let sum = projected.sum();
    if sum > 0.0 {
        FactorSet::from_fn(|f| projected.get(f) / sum)
    } else {
        FactorSet::from_fn(|_| 1.0 / Factor::ALL.len() as f64)
    }
}
