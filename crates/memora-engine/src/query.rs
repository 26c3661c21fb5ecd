//! "Why" questions over the decision graph
//!
//! Similarity search proposes candidates, one hop of graph expansion adds
//! close neighbours at a decayed relevance, and every surviving result
//! carries the evidence that justifies it. Work is proportional to the
//! candidates and their evidence, never to the whole corpus.

use serde::Serialize;
use std::collections::BTreeMap;

use memora_core::errors::ExError;
use memora_core::model::{DecisionEntity, DecisionStatus, RelationshipType, Scope};
use memora_core::ops::graph_ops;
use memora_core::queries::evidence_trace;

use crate::engine::Engine;

/// How a result entered the answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inclusion {
    Similarity,
    Related {
        via: String,
        relationship_type: RelationshipType,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub decision: DecisionEntity,
    pub relevance: f64,
    pub confidence: f64,
    pub inclusion: Inclusion,
    /// `"{bucket}:{source_id}"` for each supporting evidence item
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub question: String,
    pub results: Vec<QueryHit>,
    /// One line per included decision, in result order
    pub trace: Vec<String>,
}

pub struct QueryFacade<'a> {
    engine: &'a Engine,
}

impl<'a> QueryFacade<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Answer a question within a repository or workspace
    ///
    /// Archived decisions and decisions without evidence are never
    /// returned. Results are ordered by relevance, then confidence, then
    /// id, and capped at `query.max_results`.
    ///
    /// # Errors
    ///
    /// Failures of the semantic index.
    pub async fn answer(&self, question: &str, scope: &Scope) -> Result<QueryResult, ExError> {
        let settings = &self.engine.config().query;
        let hits = self
            .engine
            .index()
            .similarity_search(question, settings.top_k, Some(scope))
            .await?;
        let store = self.engine.snapshot()?;

        let mut candidates: BTreeMap<String, (f64, Inclusion)> = BTreeMap::new();
        let mut offer = |id: &str, relevance: f64, inclusion: Inclusion| {
            let entry = candidates
                .entry(id.to_string())
                .or_insert((relevance, inclusion.clone()));
            if relevance > entry.0 {
                *entry = (relevance, inclusion);
            }
        };

        for hit in &hits {
            if store.current(&hit.decision_id).is_err() {
                continue;
            }
            offer(&hit.decision_id, hit.similarity, Inclusion::Similarity);
            let neighbours = graph_ops::find_related(&store, &hit.decision_id, 1)?;
            for n in neighbours {
                offer(
                    &n.decision_id,
                    hit.similarity * settings.expansion_decay * n.strength,
                    Inclusion::Related {
                        via: hit.decision_id.clone(),
                        relationship_type: n.relationship_type,
                    },
                );
            }
        }

        let mut results: Vec<QueryHit> = candidates
            .into_iter()
            .filter_map(|(id, (relevance, inclusion))| {
                let decision = store.current(&id).ok()?;
                if decision.status == DecisionStatus::Archived || &decision.scope != scope {
                    return None;
                }
                let evidence = evidence_trace(decision);
                if evidence.is_empty() {
                    return None;
                }
                Some(QueryHit {
                    confidence: decision.confidence.overall,
                    decision: decision.clone(),
                    relevance,
                    inclusion,
                    evidence,
                })
            })
            .collect();
        results.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.decision.decision_id.cmp(&b.decision.decision_id))
        });
        results.truncate(settings.max_results);

        let trace = results.iter().map(trace_line).collect();
        tracing::debug!(results = results.len(), candidates = hits.len(), "query answered");
        Ok(QueryResult {
            question: question.to_string(),
            results,
            trace,
        })
    }
}

fn trace_line(hit: &QueryHit) -> String {
    let how = match &hit.inclusion {
        Inclusion::Similarity => "similar to the question".to_string(),
        Inclusion::Related {
            via,
            relationship_type,
        } => format!("{} {}", relationship_type, via),
    };
    format!(
        "{} ({}, relevance {:.2}, confidence {:.2}): {}",
        hit.decision.decision_id,
        how,
        hit.relevance,
        hit.confidence,
        hit.evidence.join(", ")
    )
}
