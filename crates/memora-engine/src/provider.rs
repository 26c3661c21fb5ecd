//! Inference provider capability and its guard
//!
//! The provider is the only long-latency call in the pipeline. The engine
//! never talks to it directly: [`GuardedProvider`] bounds every attempt with
//! a timeout and retries transient failures with capped exponential
//! backoff. When retries run out the caller receives
//! [`InferenceAttempt::Deferred`] and parks the batch; evidence is never
//! dropped.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use memora_core::errors::{ExError, ExErrorKind};
use memora_core::model::{DecisionEntity, EvidenceItem, ProviderResult};
use memora_core::EngineConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport failure or rate limiting; retried
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Raised by the guard when an attempt exceeds the timeout; retried
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with something that is not a proposal
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::InvalidResponse(_))
    }
}

impl From<ProviderError> for ExError {
    fn from(err: ProviderError) -> Self {
        let kind = match err {
            ProviderError::Unavailable(_) => ExErrorKind::ProviderUnavailable,
            ProviderError::Timeout(_) => ExErrorKind::Timeout,
            ProviderError::InvalidResponse(_) => ExErrorKind::Serialization,
        };
        ExError::new(kind)
            .with_op("infer")
            .with_message(err.to_string())
    }
}

/// Language-model capability that proposes decision content from evidence
///
/// `related_context` carries decisions the semantic index considers close
/// to the batch, so the model can recognise continuations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn infer(
        &self,
        evidence_batch: &[EvidenceItem],
        related_context: &[DecisionEntity],
    ) -> Result<ProviderResult, ProviderError>;
}

/// Timeout and retry schedule for provider calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Bound on a single attempt
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            timeout: config.provider_timeout(),
            max_retries: config.max_provider_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry `retry` (0-based): `base * 2^retry`, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Outcome of a guarded inference
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceAttempt {
    Completed(ProviderResult),
    /// Retries exhausted or the response was unusable
    Deferred { reason: String, attempts: u32 },
}

/// Provider wrapped with timeout and backoff
#[derive(Clone)]
pub struct GuardedProvider {
    inner: Arc<dyn InferenceProvider>,
    policy: RetryPolicy,
}

impl GuardedProvider {
    pub fn new(inner: Arc<dyn InferenceProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one batch through the provider
    ///
    /// Unavailable and timed-out attempts are retried up to
    /// `max_retries` times; an invalid response is not retried.
    pub async fn infer(
        &self,
        evidence_batch: &[EvidenceItem],
        related_context: &[DecisionEntity],
    ) -> InferenceAttempt {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match tokio::time::timeout(
                self.policy.timeout,
                self.inner.infer(evidence_batch, related_context),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.policy.timeout)),
            };

            let err = match result {
                Ok(proposal) => return InferenceAttempt::Completed(proposal),
                Err(e) => e,
            };
            let retry = attempts - 1;
            if !err.is_transient() || retry >= self.policy.max_retries {
                tracing::warn!(
                    attempts,
                    transient = err.is_transient(),
                    error = %err,
                    "inference deferred"
                );
                return InferenceAttempt::Deferred {
                    reason: err.to_string(),
                    attempts,
                };
            }

            let delay = self.policy.delay_for(retry);
            tracing::debug!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying provider call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn proposal() -> ProviderResult {
        ProviderResult {
            is_decision: true,
            title: "Adopt DynamoDB".to_string(),
            ..ProviderResult::default()
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_retries: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(1_000),
        };
        assert_eq!(p.delay_for(0), Duration::from_millis(200));
        assert_eq!(p.delay_for(1), Duration::from_millis(400));
        assert_eq!(p.delay_for(2), Duration::from_millis(800));
        assert_eq!(p.delay_for(3), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(40), Duration::from_millis(1_000));
    }

    #[test]
    fn test_policy_reads_config() {
        let p = RetryPolicy::from_config(&EngineConfig::default());
        assert_eq!(p.timeout, Duration::from_secs(5));
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_delay, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let mut mock = MockInferenceProvider::new();
        let mut calls = 0;
        mock.expect_infer().times(3).returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Err(ProviderError::Unavailable("503".to_string()))
            } else {
                Ok(proposal())
            }
        });
        let guarded = GuardedProvider::new(Arc::new(mock), policy(3));
        assert_eq!(
            guarded.infer(&[], &[]).await,
            InferenceAttempt::Completed(proposal())
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_defer() {
        let mut mock = MockInferenceProvider::new();
        mock.expect_infer()
            .times(3)
            .returning(|_, _| Err(ProviderError::Unavailable("rate limited".to_string())));
        let guarded = GuardedProvider::new(Arc::new(mock), policy(2));
        match guarded.infer(&[], &[]).await {
            InferenceAttempt::Deferred { reason, attempts } => {
                assert_eq!(attempts, 3);
                assert!(reason.contains("rate limited"));
            }
            other => panic!("expected deferral, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let mut mock = MockInferenceProvider::new();
        mock.expect_infer()
            .times(1)
            .returning(|_, _| Err(ProviderError::InvalidResponse("not json".to_string())));
        let guarded = GuardedProvider::new(Arc::new(mock), policy(5));
        assert!(matches!(
            guarded.infer(&[], &[]).await,
            InferenceAttempt::Deferred { attempts: 1, .. }
        ));
    }

    #[test]
    fn test_error_kinds() {
        let e: ExError = ProviderError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(e.kind(), ExErrorKind::Timeout);
        assert!(e.kind().is_transient());
        let e: ExError = ProviderError::InvalidResponse("x".to_string()).into();
        assert_eq!(e.kind(), ExErrorKind::Serialization);
    }
}
