#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use memora_core::builder::{self, BuildContext};
use memora_core::model::{
    DecisionEntity, EventType, EvidenceItem, FactorWeights, IngestionEvent, Platform,
    ProviderResult, ReviewState, Scope, SourceType, WeightsConfig,
};
use memora_core::notifier::RecordingNotifier;
use memora_core::{EngineConfig, StaticAuthorityDirectory};
use memora_engine::{Engine, InferenceProvider, ProviderError};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn scope() -> Scope {
    Scope::Repository("acme/api".to_string())
}

/// rita (0.9), sam and tom (0.6) review `acme/api`; vera (0.95) reviews the
/// `platform` workspace
pub fn directory() -> StaticAuthorityDirectory {
    StaticAuthorityDirectory::new()
        .with_identity("rita", 0.9)
        .with_identity("sam", 0.6)
        .with_identity("tom", 0.6)
        .with_identity("vera", 0.95)
        .with_reviewer(scope(), "rita")
        .with_reviewer(scope(), "sam")
        .with_reviewer(scope(), "tom")
        .with_reviewer(Scope::Workspace("platform".to_string()), "vera")
}

/// Millisecond retries and a 50ms provider timeout
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        provider_timeout_seconds: 0.05,
        max_provider_retries: 2,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 4,
        ..EngineConfig::default()
    }
}

/// Nothing is routed to review: every score clears a zero threshold
pub fn lenient_config() -> EngineConfig {
    EngineConfig {
        validation_threshold: 0.0,
        ..fast_config()
    }
}

/// Every fixture decision scores below this threshold
pub fn strict_config() -> EngineConfig {
    EngineConfig {
        validation_threshold: 0.99,
        ..fast_config()
    }
}

pub fn proposal() -> ProviderResult {
    ProviderResult {
        is_decision: true,
        title: "Adopt DynamoDB for sessions".to_string(),
        description: "Session storage moves from Postgres to DynamoDB".to_string(),
        rationale: "Write throughput at peak exceeds what the primary can absorb".to_string(),
        alternatives_considered: vec!["Shard Postgres".to_string()],
        tags: vec!["storage".to_string()],
        participants: vec![],
        ..ProviderResult::default()
    }
}

/// A PR description plus two approving reviews from senior authors
pub fn dynamo_events(prefix: &str) -> Vec<IngestionEvent> {
    vec![
        IngestionEvent::new(
            format!("{}-1", prefix),
            Platform::Github,
            EventType::PrCreated,
            t0(),
            "alice",
            format!("{}-pr", prefix),
            "Switch the session store to DynamoDB for scale, see `sessions.rs`",
        )
        .with_repository("acme/api"),
        IngestionEvent::new(
            format!("{}-2", prefix),
            Platform::Github,
            EventType::ReviewSubmitted,
            t0() + chrono::Duration::minutes(30),
            "rita",
            format!("{}-review-1", prefix),
            "Looks right for the load we expect",
        )
        .with_repository("acme/api")
        .with_review_state(ReviewState::Approved),
        IngestionEvent::new(
            format!("{}-3", prefix),
            Platform::Github,
            EventType::ReviewSubmitted,
            t0() + chrono::Duration::minutes(45),
            "vera",
            format!("{}-review-2", prefix),
            "Agreed, ship it",
        )
        .with_repository("acme/api")
        .with_review_state(ReviewState::Approved),
    ]
}

pub fn commit_item(source_id: &str, content: &str) -> EvidenceItem {
    EvidenceItem::new(
        SourceType::Commit,
        source_id.to_string(),
        content.to_string(),
        "bob".to_string(),
        t0() + chrono::Duration::hours(2),
        Platform::Github,
        None,
    )
}

/// Unscored `inferred` decision about `title`, with an intent and an
/// execution item authored by alice and bob
pub fn decision(decision_id: &str, scope: Scope, title: &str, body: &str) -> DecisionEntity {
    let weights = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
    let ctx = BuildContext {
        decision_id: decision_id.to_string(),
        scope,
        weights: &weights,
        source_event_ids: vec![format!("evt-{}", decision_id)],
        now: t0(),
    };
    let items = [
        EvidenceItem::new(
            SourceType::PrComment,
            format!("github:pr_created:{}", decision_id),
            body.to_string(),
            "alice".to_string(),
            t0(),
            Platform::Github,
            None,
        ),
        commit_item(&format!("github:commit_pushed:{}", decision_id), body),
    ];
    let proposal = ProviderResult {
        is_decision: true,
        title: title.to_string(),
        description: body.to_string(),
        rationale: body.to_string(),
        ..ProviderResult::default()
    };
    builder::build(&ctx, &items, &proposal).unwrap().unwrap()
}

pub fn dynamo_decision(decision_id: &str) -> DecisionEntity {
    decision(
        decision_id,
        scope(),
        "Adopt DynamoDB for sessions",
        "Switch the session store to DynamoDB for scale",
    )
}

/// Replays scripted answers, then keeps proposing `proposal()`
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResult, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResult, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    async fn infer(
        &self,
        _evidence_batch: &[EvidenceItem],
        _related_context: &[DecisionEntity],
    ) -> Result<ProviderResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(proposal()))
    }
}

/// Answers only after `delay`
pub struct SlowProvider {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

#[async_trait]
impl InferenceProvider for SlowProvider {
    async fn infer(
        &self,
        _evidence_batch: &[EvidenceItem],
        _related_context: &[DecisionEntity],
    ) -> Result<ProviderResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(proposal())
    }
}

pub struct Harness {
    pub engine: Engine,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn harness(config: EngineConfig, script: Vec<Result<ProviderResult, ProviderError>>) -> Harness {
    let provider = Arc::new(ScriptedProvider::new(script));
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = Engine::builder(config)
        .provider(provider.clone())
        .authority(Arc::new(directory()))
        .notifier(notifier.clone())
        .build()
        .await
        .unwrap();
    Harness {
        engine,
        provider,
        notifier,
    }
}

/// Ingest `dynamo_events(prefix)` and run the queue; returns the new decision
pub async fn infer_one(engine: &Engine, prefix: &str) -> DecisionEntity {
    engine.ingest(&dynamo_events(prefix), t0()).await.unwrap();
    let outcomes = engine.run_pending(t0()).await.unwrap();
    match outcomes.into_iter().next() {
        Some(memora_engine::PipelineOutcome::Created { decision, .. }) => *decision,
        other => panic!("expected a created decision, got {:?}", other),
    }
}
