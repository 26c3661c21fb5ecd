//! Decision pipeline and state owner
//!
//! The engine holds the published `Store` behind an `Arc`. Readers take a
//! snapshot and never wait on writers. Writers are serialized through a
//! short gate and follow one path:
//!
//! 1. run the core operation against a private copy (`apply`)
//! 2. commit the journal through the sink, if one is configured
//! 3. publish the new state
//! 4. send notifications and refresh the semantic index
//!
//! The provider call is never made while the gate is held. Any failure
//! before step 3 leaves the published state untouched.
//!
//! Work under the gate follows the size of the write, not of the corpus: the
//! copy shares every collection the operation leaves alone, and invariants
//! are checked only around the decisions it touched. The commit stays inside
//! the gate because the database takes one writer at a time and states must
//! be published in the order they were committed.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use memora_core::apply::{apply, Applied};
use memora_core::builder::{self, BuildContext};
use memora_core::errors::{ExError, ExErrorKind, MemoraError};
use memora_core::model::{
    BatchStatus, CalibrationEvent, DecisionEntity, DecisionRelationship, DecisionStatus,
    EvidenceBatch, EvidenceItem, IngestionEvent, ProviderResult, RelationshipType,
    ReviewerFeedback, Scope, ValidationTask, WeightsConfig,
};
use memora_core::normalizer;
use memora_core::notifier::{self, NoopNotifier, Notification, NotificationReason};
use memora_core::ops::graph_ops::{self, RelatedDecision};
use memora_core::ops::validation_ops::{
    self, FeedbackOutcome, Routing, RoutingOutcome, ScopeCancellation,
};
use memora_core::ops::{decision_ops, OpContext, Store};
use memora_core::queries::{
    self, DecisionDetail, DecisionFilters, DecisionStats, PaginatedDecisions, PaginationParams,
    TaskFilters,
};
use memora_core::rules::invariants::{self, Violation};
use memora_core::{
    AuthorityDirectory, EngineConfig, NoopAuthorityDirectory, ReviewNotifier, StoreSink,
};
use memora_store::SqliteSink;

use crate::index::{SemanticIndex, TokenOverlapIndex};
use crate::provider::{GuardedProvider, InferenceAttempt, InferenceProvider, RetryPolicy};
use crate::query::QueryFacade;
use crate::queue::InferenceQueue;

/// What ingestion did with a set of events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Evidence items seen for the first time
    pub accepted: usize,
    /// Items whose `source_id` was already known
    pub duplicates: usize,
    /// Events that failed normalization, in input order
    pub rejected: Vec<MemoraError>,
    /// Batches now waiting in the queue
    pub enqueued: Vec<String>,
    /// Batches pushed out of a full queue and parked for retry
    pub deferred: Vec<String>,
}

/// How the pipeline settled one batch
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Created {
        decision: Box<DecisionEntity>,
        routing: Routing,
    },
    /// The provider saw no decision, or the evidence could not carry one
    NotADecision { batch_id: String },
    Deferred {
        batch_id: String,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
    },
    /// The batch was dropped upstream while inference was in flight
    Cancelled { batch_id: String },
}

/// Result of a maintenance sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub escalated: Vec<ValidationTask>,
    pub archived: Vec<String>,
}

enum Settled {
    Created(Box<DecisionEntity>, RoutingOutcome),
    NotADecision,
    Cancelled,
}

pub struct EngineBuilder {
    config: EngineConfig,
    provider: Option<Arc<dyn InferenceProvider>>,
    index: Option<Arc<dyn SemanticIndex>>,
    authority: Option<Arc<dyn AuthorityDirectory>>,
    notifier: Option<Arc<dyn ReviewNotifier>>,
    sink: Option<Arc<dyn StoreSink>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            provider: None,
            index: None,
            authority: None,
            notifier: None,
            sink: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn InferenceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn authority(mut self, authority: Arc<dyn AuthorityDirectory>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ReviewNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn StoreSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Persist to a SQLite database, creating and migrating it if needed
    ///
    /// # Errors
    ///
    /// Storage or migration failures from opening the database.
    pub fn sqlite(self, path: &Path) -> Result<Self, ExError> {
        let sink = SqliteSink::open(path)?;
        Ok(self.sink(Arc::new(sink)))
    }

    /// Load state, rebuild the semantic index and restore queued batches
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a configuration that does not validate, or any
    /// error raised while loading from the sink or indexing.
    pub async fn build(self) -> Result<Engine, ExError> {
        self.config.validate()?;
        let weights = WeightsConfig::initial(self.config.factor_weights.clone())?;
        let state = match &self.sink {
            Some(sink) => sink.load(&weights)?,
            None => Store::new(weights),
        };

        let engine = Engine {
            queue: Mutex::new(InferenceQueue::new(self.config.queue_capacity)),
            provider: self.provider.map(|p| {
                GuardedProvider::new(p, RetryPolicy::from_config(&self.config))
            }),
            index: self
                .index
                .unwrap_or_else(|| Arc::new(TokenOverlapIndex::new())),
            authority: self
                .authority
                .unwrap_or_else(|| Arc::new(NoopAuthorityDirectory)),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            sink: self.sink,
            state: RwLock::new(Arc::new(state)),
            write_gate: tokio::sync::Mutex::new(()),
            config: self.config,
        };

        let snapshot = engine.snapshot()?;
        try_join_all(snapshot.list_current().into_iter().map(|d| engine.reindex(d))).await?;
        let queued: Vec<EvidenceBatch> = snapshot
            .pending_batches()
            .filter(|b| b.status == BatchStatus::Queued)
            .cloned()
            .collect();
        for batch in queued {
            engine.enqueue(batch, Utc::now()).await?;
        }
        tracing::debug!(
            decisions = snapshot.decision_count(),
            queued = engine.queue_len(),
            "engine ready"
        );
        Ok(engine)
    }
}

pub struct Engine {
    config: EngineConfig,
    state: RwLock<Arc<Store>>,
    write_gate: tokio::sync::Mutex<()>,
    queue: Mutex<InferenceQueue>,
    provider: Option<GuardedProvider>,
    index: Arc<dyn SemanticIndex>,
    authority: Arc<dyn AuthorityDirectory>,
    notifier: Arc<dyn ReviewNotifier>,
    sink: Option<Arc<dyn StoreSink>>,
}

fn poisoned(what: &str) -> ExError {
    ExError::new(ExErrorKind::Concurrency).with_message(format!("{} lock poisoned", what))
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn index(&self) -> &dyn SemanticIndex {
        self.index.as_ref()
    }

    /// The published state; cheap, never blocks on writers
    ///
    /// # Errors
    ///
    /// `Concurrency` if the state lock was poisoned.
    pub fn snapshot(&self) -> Result<Arc<Store>, ExError> {
        self.state
            .read()
            .map(|s| Arc::clone(&s))
            .map_err(|_| poisoned("state"))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn query_facade(&self) -> QueryFacade<'_> {
        QueryFacade::new(self)
    }

    // ---------- write path ----------

    async fn mutate<T, F>(&self, now: DateTime<Utc>, op: F) -> Result<T, ExError>
    where
        F: FnOnce(&mut Store, &OpContext<'_>) -> memora_core::Result<T>,
    {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot()?;
        let ctx = OpContext::new(&self.config, self.authority.as_ref(), now);
        let Applied {
            state,
            value,
            changes,
        } = apply(&current, |draft| op(draft, &ctx))?;

        if let (Some(sink), false) = (&self.sink, changes.is_empty()) {
            let sink = Arc::clone(sink);
            let count = changes.len();
            tokio::task::spawn_blocking(move || sink.commit(&changes))
                .await
                .map_err(|e| {
                    ExError::new(ExErrorKind::Internal)
                        .with_op("commit")
                        .with_message(e.to_string())
                })??;
            tracing::debug!(changes = count, "change set committed");
        }

        let mut published = self.state.write().map_err(|_| poisoned("state"))?;
        *published = Arc::new(state);
        Ok(value)
    }

    fn dispatch(&self, notifications: &[Notification]) {
        notifier::dispatch(self.notifier.as_ref(), notifications);
    }

    async fn reindex(&self, decision: &DecisionEntity) -> Result<(), ExError> {
        self.index
            .index(&decision.decision_id, &decision.scope, &decision.index_document())
            .await
    }

    /// Refresh the index after a committed write; the write stands either way
    async fn reindex_current(&self, decision_id: &str) {
        let decision = match self.snapshot().and_then(|s| {
            s.current(decision_id)
                .cloned()
                .map_err(ExError::from)
        }) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(decision_id, error = %e, "reindex skipped");
                return;
            }
        };
        if let Err(e) = self.reindex(&decision).await {
            tracing::warn!(decision_id, error = %e, "semantic index update failed");
        }
    }

    // ---------- ingestion and inference ----------

    /// Normalize events, register new evidence and queue one batch per scope
    ///
    /// Malformed events are reported and logged, never silently dropped.
    /// Evidence already known by `source_id` is not inferred again.
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn ingest(
        &self,
        events: &[IngestionEvent],
        now: DateTime<Utc>,
    ) -> Result<IngestReport, ExError> {
        let mut report = IngestReport::default();
        let mut groups: BTreeMap<Scope, (Vec<EvidenceItem>, Vec<String>)> = BTreeMap::new();

        for event in events {
            let scoped = normalizer::normalize(event).and_then(|item| {
                normalizer::scope_of(event)
                    .map(|scope| (scope, item))
                    .ok_or_else(|| MemoraError::MalformedEvent {
                        event_id: event.event_id.clone(),
                        field: "repository".to_string(),
                    })
            });
            match scoped {
                Ok((scope, item)) => {
                    let group = groups.entry(scope).or_default();
                    if group.0.iter().all(|i| i.source_id != item.source_id) {
                        group.0.push(item);
                        group.1.push(event.event_id.clone());
                    } else {
                        report.duplicates += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(event_id = %event.event_id, error = %e, "malformed event rejected");
                    report.rejected.push(e);
                }
            }
        }

        let (batches, duplicates) = self
            .mutate(now, |store, ctx| {
                let mut batches = Vec::new();
                let mut duplicates = 0;
                for (scope, (items, event_ids)) in groups {
                    let seen = items.len();
                    let fresh: Vec<EvidenceItem> = items
                        .into_iter()
                        .filter(|item| store.register_evidence(item.clone()))
                        .collect();
                    duplicates += seen - fresh.len();
                    if fresh.is_empty() {
                        continue;
                    }
                    let batch = EvidenceBatch::new(
                        uuid::Uuid::now_v7().to_string(),
                        scope,
                        fresh,
                        event_ids,
                        ctx.now,
                    );
                    store.put_batch(batch.clone());
                    batches.push(batch);
                }
                Ok((batches, duplicates))
            })
            .await?;

        report.duplicates += duplicates;
        for batch in batches {
            report.accepted += batch.items.len();
            report.enqueued.push(batch.batch_id.clone());
            if let Some(evicted) = self.enqueue(batch, now).await? {
                report.enqueued.retain(|id| id != &evicted);
                report.deferred.push(evicted);
            }
        }
        Ok(report)
    }

    /// Push onto the queue, parking whatever overflows; returns its id
    async fn enqueue(
        &self,
        batch: EvidenceBatch,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ExError> {
        let evicted = self.queue.lock().map_err(|_| poisoned("queue"))?.push(batch);
        match evicted {
            Some(evicted) => {
                let id = evicted.batch_id.clone();
                self.defer_batch(evicted, "inference queue full", now).await?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Run the oldest queued batch through the pipeline
    ///
    /// # Errors
    ///
    /// Persistence or invariant failures while settling the batch.
    pub async fn process_next(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<PipelineOutcome>, ExError> {
        let next = self.queue.lock().map_err(|_| poisoned("queue"))?.pop();
        match next {
            Some(batch) => self.process_batch(batch, now).await.map(Some),
            None => Ok(None),
        }
    }

    /// Drain the queue
    ///
    /// # Errors
    ///
    /// Stops at the first batch that fails to settle.
    pub async fn run_pending(&self, now: DateTime<Utc>) -> Result<Vec<PipelineOutcome>, ExError> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.process_next(now).await? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Retry every deferred batch whose backoff has elapsed
    ///
    /// # Errors
    ///
    /// Stops at the first batch that fails to settle.
    pub async fn retry_deferred(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PipelineOutcome>, ExError> {
        let due: Vec<EvidenceBatch> = self
            .snapshot()?
            .pending_batches()
            .filter(|b| b.is_deferred() && b.is_due(now))
            .cloned()
            .collect();
        let mut outcomes = Vec::with_capacity(due.len());
        for batch in due {
            tracing::debug!(batch_id = %batch.batch_id, attempts = batch.attempts, "retrying deferred batch");
            outcomes.push(self.process_batch(batch, now).await?);
        }
        Ok(outcomes)
    }

    /// Backoff before the next attempt of a batch deferred `attempts` times
    pub fn deferral_delay(&self, attempts: u32) -> chrono::Duration {
        self.config.deferral_delay(attempts)
    }

    async fn process_batch(
        &self,
        batch: EvidenceBatch,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, ExError> {
        if !self
            .snapshot()?
            .pending_batches()
            .any(|b| b.batch_id == batch.batch_id)
        {
            tracing::debug!(batch_id = %batch.batch_id, "batch dropped before inference");
            return Ok(PipelineOutcome::Cancelled {
                batch_id: batch.batch_id,
            });
        }
        let related = self.related_context(&batch).await;
        let attempt = match &self.provider {
            Some(provider) => provider.infer(&batch.items, &related).await,
            None => InferenceAttempt::Deferred {
                reason: "no inference provider configured".to_string(),
                attempts: 0,
            },
        };
        match attempt {
            InferenceAttempt::Completed(proposal) => self.settle_batch(batch, proposal, now).await,
            InferenceAttempt::Deferred { reason, .. } => {
                let batch_id = batch.batch_id.clone();
                match self.defer_batch(batch, &reason, now).await? {
                    Some(parked) => Ok(PipelineOutcome::Deferred {
                        batch_id,
                        attempts: parked.attempts,
                        next_attempt_at: parked.next_attempt_at.unwrap_or(now),
                    }),
                    None => Ok(PipelineOutcome::Cancelled { batch_id }),
                }
            }
        }
    }

    /// Decisions near the batch, handed to the provider as context
    async fn related_context(&self, batch: &EvidenceBatch) -> Vec<DecisionEntity> {
        let text: Vec<&str> = batch.items.iter().map(|i| i.content.as_str()).collect();
        let hits = match self
            .index
            .similarity_search(&text.join("\n"), self.config.query.top_k, Some(&batch.scope))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(batch_id = %batch.batch_id, error = %e, "related context unavailable");
                return Vec::new();
            }
        };
        let Ok(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        hits.iter()
            .filter_map(|hit| snapshot.current(&hit.decision_id).ok().cloned())
            .collect()
    }

    /// Park a batch for a later retry; `None` if it was cancelled meanwhile
    async fn defer_batch(
        &self,
        mut batch: EvidenceBatch,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EvidenceBatch>, ExError> {
        let retry_at = now + self.deferral_delay(batch.attempts);
        batch.defer(reason, retry_at);
        let parked = self
            .mutate(now, |store, _| {
                if !store.pending_batches().any(|b| b.batch_id == batch.batch_id) {
                    return Ok(None);
                }
                store.put_batch(batch.clone());
                Ok(Some(batch))
            })
            .await?;
        if let Some(b) = &parked {
            tracing::warn!(
                batch_id = %b.batch_id,
                attempts = b.attempts,
                retry_at = %retry_at.to_rfc3339(),
                reason,
                "inference deferred"
            );
        }
        Ok(parked)
    }

    async fn settle_batch(
        &self,
        batch: EvidenceBatch,
        proposal: ProviderResult,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, ExError> {
        let batch_id = batch.batch_id.clone();
        let decision_id = uuid::Uuid::now_v7().to_string();

        let settled = self
            .mutate(now, |store, ctx| {
                if store.remove_batch(&batch.batch_id).is_none() {
                    return Ok(Settled::Cancelled);
                }
                let weights = store.weights().clone();
                let build_ctx = BuildContext {
                    decision_id: decision_id.clone(),
                    scope: batch.scope.clone(),
                    weights: &weights,
                    source_event_ids: batch.source_event_ids.clone(),
                    now: ctx.now,
                };
                let built = match builder::build(&build_ctx, &batch.items, &proposal) {
                    Ok(Some(decision)) => decision,
                    Ok(None) | Err(MemoraError::InsufficientEvidence) => {
                        return Ok(Settled::NotADecision)
                    }
                    Err(e) => return Err(e),
                };
                decision_ops::upsert_decision(store, ctx, built, None)?;
                let routing = validation_ops::route(store, ctx, &decision_id)?;
                let decision = store.current(&decision_id)?.clone();
                Ok(Settled::Created(Box::new(decision), routing))
            })
            .await?;

        match settled {
            Settled::Created(decision, routing) => {
                self.dispatch(&routing.notifications);
                if let Err(e) = self.reindex(&decision).await {
                    tracing::warn!(decision_id = %decision.decision_id, error = %e, "semantic index update failed");
                }
                if !proposal.related_past_decisions.is_empty() {
                    // advisory only; links are made explicitly
                    tracing::debug!(
                        decision_id = %decision.decision_id,
                        related = ?proposal.related_past_decisions,
                        "provider named related decisions"
                    );
                }
                Ok(PipelineOutcome::Created {
                    decision,
                    routing: routing.routing,
                })
            }
            Settled::NotADecision => Ok(PipelineOutcome::NotADecision { batch_id }),
            Settled::Cancelled => Ok(PipelineOutcome::Cancelled { batch_id }),
        }
    }

    // ---------- graph ----------

    /// Versioned upsert; see `decision_ops::upsert_decision`
    ///
    /// The written version is routed like any other: low confidence opens a
    /// review, and a decision under review gets its tasks moved to the new
    /// version. Returns the head after routing, which may be one past the
    /// written version.
    ///
    /// # Errors
    ///
    /// `VersionConflict` on a stale base, plus the operation's own errors.
    pub async fn upsert_decision(
        &self,
        decision: DecisionEntity,
        base_version: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<u32, ExError> {
        let decision_id = decision.decision_id.clone();
        let (version, routing) = self
            .mutate(now, |store, ctx| {
                let written = decision_ops::upsert_decision(store, ctx, decision, base_version)?;
                let routing = validation_ops::after_upsert(store, ctx, &decision_id)?;
                Ok((store.head(&decision_id).unwrap_or(written), routing))
            })
            .await?;
        self.dispatch(&routing.notifications);
        self.reindex_current(&decision_id).await;
        Ok(version)
    }

    /// Append corroborating evidence, then re-route or retarget open tasks
    ///
    /// # Errors
    ///
    /// `NotFound`, or `VersionConflict` on a stale base version.
    pub async fn attach_evidence(
        &self,
        decision_id: &str,
        base_version: u32,
        items: Vec<EvidenceItem>,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, ExError> {
        let (version, routing) = self
            .mutate(now, |store, ctx| {
                for item in &items {
                    store.register_evidence(item.clone());
                }
                match decision_ops::attach_evidence(store, ctx, decision_id, base_version, &items)? {
                    Some(version) => {
                        let routing = validation_ops::after_revision(store, ctx, decision_id)?;
                        Ok((Some(version), routing.notifications))
                    }
                    None => Ok((None, Vec::new())),
                }
            })
            .await?;
        self.dispatch(&routing);
        if version.is_some() {
            self.reindex_current(decision_id).await;
        }
        Ok(version)
    }

    /// # Errors
    ///
    /// `SelfLink`, `DuplicateLink`, `NotFound`, `InvalidInput`.
    pub async fn link(
        &self,
        a_id: &str,
        b_id: &str,
        relationship_type: RelationshipType,
        strength: f64,
        evidence: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionRelationship, ExError> {
        self.mutate(now, |store, ctx| {
            graph_ops::link(store, a_id, b_id, relationship_type, strength, evidence, ctx.now)
        })
        .await
    }

    /// # Errors
    ///
    /// `NotFound` when no edge joins the pair.
    pub async fn unlink(&self, a_id: &str, b_id: &str, now: DateTime<Utc>) -> Result<(), ExError> {
        self.mutate(now, |store, _| graph_ops::unlink(store, a_id, b_id))
            .await
    }

    /// # Errors
    ///
    /// `CycleDetected` or `InvalidTransition`.
    pub async fn supersede(
        &self,
        old_id: &str,
        new_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, ExError> {
        self.mutate(now, |store, ctx| graph_ops::supersede(store, ctx, old_id, new_id))
            .await
    }

    /// # Errors
    ///
    /// `NotFound`.
    pub fn get(&self, decision_id: &str) -> Result<DecisionEntity, ExError> {
        Ok(graph_ops::get(&*self.snapshot()?, decision_id)?)
    }

    /// Breadth-first neighbours; `max_depth` defaults to the configured depth
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub fn find_related(
        &self,
        decision_id: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<RelatedDecision>, ExError> {
        let depth = max_depth.unwrap_or(self.config.graph.default_max_depth);
        Ok(graph_ops::find_related(&*self.snapshot()?, decision_id, depth)?)
    }

    /// # Errors
    ///
    /// `NotFound`.
    pub fn find_path(&self, a_id: &str, b_id: &str) -> Result<Option<Vec<String>>, ExError> {
        let depth = self.config.graph.max_path_depth;
        Ok(graph_ops::find_path(&*self.snapshot()?, a_id, b_id, depth)?)
    }

    // ---------- workflow ----------

    /// # Errors
    ///
    /// `InvalidTransition` unless the decision is `inferred`.
    pub async fn request_review(
        &self,
        decision_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Routing, ExError> {
        let outcome = self
            .mutate(now, |store, ctx| validation_ops::request_review(store, ctx, decision_id))
            .await?;
        self.dispatch(&outcome.notifications);
        Ok(outcome.routing)
    }

    /// # Errors
    ///
    /// `NotFound`, `AlreadyResolved` or `InvalidInput`.
    pub async fn start_review(
        &self,
        task_id: &str,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidationTask, ExError> {
        self.mutate(now, |store, _| validation_ops::start_review(store, task_id, reviewer))
            .await
    }

    /// Apply feedback in arrival order
    ///
    /// Stale feedback is rejected and the reviewer is asked to look at the
    /// current version.
    ///
    /// # Errors
    ///
    /// `StaleFeedback`, `AlreadyResolved`, `InvalidTransition`, `NotFound`.
    pub async fn submit_feedback(
        &self,
        feedback: ReviewerFeedback,
        now: DateTime<Utc>,
    ) -> Result<FeedbackOutcome, ExError> {
        let result = self
            .mutate(now, |store, ctx| validation_ops::submit_feedback(store, ctx, &feedback))
            .await;
        match result {
            Ok(outcome) => {
                self.dispatch(&outcome.notifications);
                Ok(outcome)
            }
            Err(e) if e.kind() == ExErrorKind::StaleFeedback => {
                tracing::warn!(
                    task_id = %feedback.task_id,
                    reviewer = %feedback.reviewer,
                    version = feedback.version,
                    "stale feedback rejected"
                );
                if let Ok(task) = self.snapshot()?.task(&feedback.task_id) {
                    self.dispatch(&[Notification {
                        reviewer_id: feedback.reviewer.clone(),
                        task: task.clone(),
                        reason: NotificationReason::ReReviewCurrentVersion,
                    }]);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Escalate overdue tasks and archive expired superseded decisions
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ExError> {
        let (escalation, archived) = self
            .mutate(now, |store, ctx| {
                let escalation = validation_ops::escalate_overdue(store, ctx)?;
                let archived = validation_ops::archive_expired(store, ctx)?;
                Ok((escalation, archived))
            })
            .await?;
        self.dispatch(&escalation.notifications);
        Ok(SweepReport {
            escalated: escalation.escalated,
            archived,
        })
    }

    /// # Errors
    ///
    /// `InvalidTransition` if already archived.
    pub async fn archive_decision(
        &self,
        decision_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, ExError> {
        self.mutate(now, |store, ctx| {
            validation_ops::archive_decision(store, ctx, decision_id, reason)
        })
        .await
    }

    /// Upstream deletion of a workspace or repository
    ///
    /// The scope's batches leave the queue without reaching the provider. A
    /// batch already in flight is reported as cancelled when it settles.
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn cancel_scope(
        &self,
        scope: &Scope,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ScopeCancellation, ExError> {
        let cancellation = self
            .mutate(now, |store, ctx| validation_ops::cancel_scope(store, ctx, scope, reason))
            .await?;
        let dequeued = self
            .queue
            .lock()
            .map_err(|_| poisoned("queue"))?
            .remove_batches(&cancellation.dropped_batches);
        tracing::debug!(
            scope = %scope,
            archived = cancellation.archived.len(),
            dequeued,
            "scope cancelled"
        );
        Ok(cancellation)
    }

    /// # Errors
    ///
    /// `InvalidInput` when the validation history is too short.
    pub async fn recalibrate(&self, now: DateTime<Utc>) -> Result<CalibrationEvent, ExError> {
        self.mutate(now, validation_ops::recalibrate).await
    }

    // ---------- integrity ----------

    /// Every broken invariant in the published state
    ///
    /// # Errors
    ///
    /// `Concurrency` if the state lock was poisoned.
    pub fn verify(&self) -> Result<Vec<Violation>, ExError> {
        Ok(invariants::find_violations(&*self.snapshot()?))
    }

    /// Explicit repair pass removing half edges
    ///
    /// # Errors
    ///
    /// Persistence failures.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<Vec<(String, String)>, ExError> {
        self.mutate(now, |store, _| graph_ops::reconcile_half_edges(store))
            .await
    }

    // ---------- read models ----------

    /// # Errors
    ///
    /// `NotFound`.
    pub fn detail(&self, decision_id: &str) -> Result<DecisionDetail, ExError> {
        Ok(queries::decision_get(&*self.snapshot()?, decision_id)?)
    }

    /// # Errors
    ///
    /// `InvalidInput` for a malformed cursor.
    pub fn list(
        &self,
        filters: &DecisionFilters,
        pagination: &PaginationParams,
    ) -> Result<PaginatedDecisions, ExError> {
        Ok(queries::decision_list(&*self.snapshot()?, filters, pagination)?)
    }

    /// # Errors
    ///
    /// `Concurrency` if the state lock was poisoned.
    pub fn stats(&self, scope: Option<&Scope>) -> Result<DecisionStats, ExError> {
        Ok(queries::decision_stats(&*self.snapshot()?, scope))
    }

    /// # Errors
    ///
    /// `Concurrency` if the state lock was poisoned.
    pub fn tasks(&self, filters: &TaskFilters) -> Result<Vec<ValidationTask>, ExError> {
        Ok(queries::task_list(&*self.snapshot()?, filters))
    }

    /// # Errors
    ///
    /// `NotFound`.
    pub fn render_adr(&self, decision_id: &str) -> Result<String, ExError> {
        Ok(memora_core::render::render_adr(&*self.snapshot()?, decision_id)?)
    }

    /// Live (not archived) decisions in a scope
    ///
    /// # Errors
    ///
    /// `Concurrency` if the state lock was poisoned.
    pub fn live_in_scope(&self, scope: &Scope) -> Result<Vec<DecisionEntity>, ExError> {
        Ok(self
            .snapshot()?
            .list_current()
            .into_iter()
            .filter(|d| &d.scope == scope && d.status != DecisionStatus::Archived)
            .cloned()
            .collect())
    }
}
