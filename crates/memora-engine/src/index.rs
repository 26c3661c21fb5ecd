//! Semantic index capability
//!
//! Similarity search is external to the engine. [`TokenOverlapIndex`] is an
//! in-process stand-in ranking documents by token overlap, used when no real
//! vector index is configured.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use memora_core::errors::{ExError, ExErrorKind};
use memora_core::model::Scope;

/// A candidate returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub decision_id: String,
    /// In [0, 1]
    pub similarity: f64,
}

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Insert or replace the document for a decision
    async fn index(&self, decision_id: &str, scope: &Scope, text: &str) -> Result<(), ExError>;

    /// Best `top_k` matches, most similar first, optionally within a scope
    async fn similarity_search(
        &self,
        text: &str,
        top_k: usize,
        scope: Option<&Scope>,
    ) -> Result<Vec<SimilarityHit>, ExError>;
}

/// Jaccard similarity over lower-cased word tokens
#[derive(Debug, Default)]
pub struct TokenOverlapIndex {
    docs: RwLock<BTreeMap<String, (Scope, BTreeSet<String>)>>,
}

impl TokenOverlapIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Alphanumeric runs of three or more characters, lower-cased
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn poisoned() -> ExError {
    ExError::new(ExErrorKind::Concurrency).with_message("semantic index lock poisoned")
}

#[async_trait]
impl SemanticIndex for TokenOverlapIndex {
    async fn index(&self, decision_id: &str, scope: &Scope, text: &str) -> Result<(), ExError> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        docs.insert(decision_id.to_string(), (scope.clone(), tokenize(text)));
        Ok(())
    }

    async fn similarity_search(
        &self,
        text: &str,
        top_k: usize,
        scope: Option<&Scope>,
    ) -> Result<Vec<SimilarityHit>, ExError> {
        let query = tokenize(text);
        let docs = self.docs.read().map_err(|_| poisoned())?;
        let mut hits: Vec<SimilarityHit> = docs
            .iter()
            .filter(|(_, (doc_scope, _))| scope.map_or(true, |s| s == doc_scope))
            .map(|(id, (_, tokens))| SimilarityHit {
                decision_id: id.clone(),
                similarity: jaccard(&query, tokens),
            })
            .filter(|hit| hit.similarity > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.decision_id.cmp(&b.decision_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}
