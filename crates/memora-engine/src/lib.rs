//! Memora Engine - async orchestration layer
//!
//! Composes the pure core operations into the inference pipeline
//! (normalize → infer → build → score → upsert → route) and owns the
//! collaborators the core only sees through traits: the inference
//! provider, the semantic index, the notifier and the persistence sink.

pub mod commands;
pub mod engine;
pub mod index;
pub mod provider;
pub mod query;
pub mod queue;

pub use engine::{Engine, EngineBuilder, IngestReport, PipelineOutcome, SweepReport};
pub use index::{SemanticIndex, SimilarityHit, TokenOverlapIndex};
pub use provider::{GuardedProvider, InferenceAttempt, InferenceProvider, ProviderError, RetryPolicy};
pub use query::{Inclusion, QueryFacade, QueryHit, QueryResult};
pub use queue::InferenceQueue;
