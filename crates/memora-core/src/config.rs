//! Engine configuration
//!
//! Layering, lowest precedence first: built-in defaults, an optional TOML
//! file, then `MEMORA__*` environment variables (`__` separates nesting,
//! e.g. `MEMORA__CONSENSUS__REQUIRED_APPROVALS=3`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration as StdDuration;

use crate::errors::{MemoraError, Result};
use crate::model::FactorWeights;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MEMORA";

/// Upper bound for every `*_secs` setting (about a century)
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Whole seconds as a `chrono::Duration`, saturating at `MAX_DURATION_SECS`
pub fn duration_secs(secs: u64) -> chrono::Duration {
    // fits in i64 and chrono's range once clamped
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// How a disputed decision reaches consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusPolicy {
    /// Approvals needed (and approvals must outnumber rejections)
    pub required_approvals: u32,
    /// A single approver at or above this authority settles the dispute
    pub senior_override_authority: f64,
}

impl Default for ConsensusPolicy {
    fn default() -> Self {
        Self {
            required_approvals: 2,
            senior_override_authority: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    pub min_samples: usize,
    pub learning_rate: f64,
    pub iterations: usize,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            min_samples: 10,
            learning_rate: 0.1,
            iterations: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    pub default_max_depth: usize,
    pub max_path_depth: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            default_max_depth: 2,
            max_path_depth: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Candidates requested from the semantic index
    pub top_k: usize,
    pub max_results: usize,
    /// Relevance multiplier applied to graph-expanded neighbours
    pub expansion_decay: f64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_results: 20,
            expansion_decay: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation_threshold: f64,
    pub factor_weights: FactorWeights,
    pub provider_timeout_seconds: f64,
    pub max_provider_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    #[serde(alias = "task_due_window")]
    pub task_due_window_secs: u64,
    #[serde(alias = "archival_retention")]
    pub archival_retention_secs: u64,
    pub auto_accept_above_threshold: bool,
    pub queue_capacity: usize,
    pub deferred_retry_base_secs: u64,
    pub deferred_retry_max_secs: u64,
    pub consensus: ConsensusPolicy,
    pub calibration: CalibrationSettings,
    pub graph: GraphSettings,
    pub query: QuerySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_threshold: 0.7,
            factor_weights: FactorWeights::defaults(),
            provider_timeout_seconds: 5.0,
            max_provider_retries: 3,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5_000,
            task_due_window_secs: 60 * 60,
            archival_retention_secs: 90 * 24 * 60 * 60,
            auto_accept_above_threshold: false,
            queue_capacity: 64,
            deferred_retry_base_secs: 60,
            deferred_retry_max_secs: 60 * 60,
            consensus: ConsensusPolicy::default(),
            calibration: CalibrationSettings::default(),
            graph: GraphSettings::default(),
            query: QuerySettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load defaults, then `path` (if given and present), then environment
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if a source cannot be read or parsed, or the merged
    /// configuration fails [`EngineConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let cfg: EngineConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| MemoraError::InvalidConfig {
                reason: e.to_string(),
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document on top of the defaults
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on parse or validation failure.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(s).map_err(|e| MemoraError::InvalidConfig {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Render the effective configuration as TOML
    ///
    /// # Errors
    ///
    /// `Serialization` if TOML encoding fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MemoraError::Serialization {
            message: e.to_string(),
        })
    }

    /// # Errors
    ///
    /// `InvalidConfig` / `InvalidWeights` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.validation_threshold) {
            return Err(invalid(format!(
                "validation_threshold must be within [0, 1], got {}",
                self.validation_threshold
            )));
        }
        self.factor_weights.validate()?;
        if !(self.provider_timeout_seconds.is_finite() && self.provider_timeout_seconds > 0.0) {
            return Err(invalid("provider_timeout_seconds must be positive"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(invalid("retry_base_delay_ms exceeds retry_max_delay_ms"));
        }
        for (name, secs) in [
            ("task_due_window", self.task_due_window_secs),
            ("archival_retention", self.archival_retention_secs),
            ("deferred_retry_base_secs", self.deferred_retry_base_secs),
            ("deferred_retry_max_secs", self.deferred_retry_max_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(invalid(format!(
                    "{} must be at most {} seconds, got {}",
                    name, MAX_DURATION_SECS, secs
                )));
            }
        }
        if self.deferred_retry_base_secs > self.deferred_retry_max_secs {
            return Err(invalid("deferred_retry_base_secs exceeds deferred_retry_max_secs"));
        }
        if self.task_due_window_secs == 0 {
            return Err(invalid("task_due_window must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be at least 1"));
        }
        if self.consensus.required_approvals == 0 {
            return Err(invalid("consensus.required_approvals must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.consensus.senior_override_authority) {
            return Err(invalid("consensus.senior_override_authority must be within [0, 1]"));
        }
        if !(self.calibration.learning_rate > 0.0 && self.calibration.learning_rate <= 1.0) {
            return Err(invalid("calibration.learning_rate must be within (0, 1]"));
        }
        if self.graph.default_max_depth == 0 || self.graph.max_path_depth == 0 {
            return Err(invalid("graph depths must be at least 1"));
        }
        if self.query.top_k == 0 || self.query.max_results == 0 {
            return Err(invalid("query.top_k and query.max_results must be at least 1"));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> StdDuration {
        StdDuration::from_secs_f64(self.provider_timeout_seconds)
    }

    pub fn task_due_window(&self) -> chrono::Duration {
        duration_secs(self.task_due_window_secs)
    }

    pub fn archival_retention(&self) -> chrono::Duration {
        duration_secs(self.archival_retention_secs)
    }

    /// Backoff before the next attempt of a batch deferred `attempts` times:
    /// `base * 2^attempts`, capped at `deferred_retry_max_secs`
    pub fn deferral_delay(&self, attempts: u32) -> chrono::Duration {
        let secs = self
            .deferred_retry_base_secs
            .saturating_mul(2u64.saturating_pow(attempts))
            .min(self.deferred_retry_max_secs);
        duration_secs(secs)
    }
}

fn invalid(reason: impl Into<String>) -> MemoraError {
    MemoraError::InvalidConfig {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.validation_threshold, 0.7);
        assert!(!cfg.auto_accept_above_threshold);
        assert_eq!(cfg.task_due_window(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_toml_overrides_only_named_keys() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            validation_threshold = 0.6
            task_due_window = 7200
            auto_accept_above_threshold = true

            [consensus]
            required_approvals = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.validation_threshold, 0.6);
        assert_eq!(cfg.task_due_window_secs, 7200);
        assert!(cfg.auto_accept_above_threshold);
        assert_eq!(cfg.consensus.required_approvals, 3);
        assert_eq!(cfg.consensus.senior_override_authority, 0.85);
        assert_eq!(cfg.max_provider_retries, 3);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = EngineConfig::from_toml_str(
            r#"
            [factor_weights]
            evidence_quality = 0.5
            evidence_quantity = 0.5
            participant_authority = 0.5
            temporal_consistency = 0.0
            outcome_validation = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MemoraError::InvalidWeights { .. }));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let cfg = EngineConfig {
            validation_threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(MemoraError::InvalidConfig { .. })));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let cfg = EngineConfig {
            deferred_retry_max_secs: u64::MAX,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(MemoraError::InvalidConfig { .. })));

        let cfg = EngineConfig {
            archival_retention_secs: MAX_DURATION_SECS + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(MemoraError::InvalidConfig { .. })));
    }

    #[test]
    fn test_deferral_delay_saturates_without_panicking() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.deferral_delay(0), chrono::Duration::seconds(60));
        assert_eq!(cfg.deferral_delay(2), chrono::Duration::seconds(240));
        assert_eq!(cfg.deferral_delay(40), chrono::Duration::hours(1));

        // unvalidated configs still never panic
        let huge = EngineConfig {
            deferred_retry_base_secs: u64::MAX,
            deferred_retry_max_secs: u64::MAX,
            archival_retention_secs: u64::MAX,
            ..EngineConfig::default()
        };
        let cap = chrono::Duration::seconds(MAX_DURATION_SECS as i64);
        assert_eq!(huge.deferral_delay(u32::MAX), cap);
        assert_eq!(huge.archival_retention(), cap);
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = EngineConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let cfg = EngineConfig::load(None).unwrap();
        assert_eq!(cfg.queue_capacity, EngineConfig::default().queue_capacity);
    }
}
