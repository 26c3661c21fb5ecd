mod common;

use common::*;
use memora_core::model::{RelationshipType, Scope};
use memora_engine::{Engine, Inclusion};

async fn seeded() -> Engine {
    let engine = Engine::builder(lenient_config()).build().await.unwrap();
    let decisions = [
        dynamo_decision("dyn"),
        decision(
            "cache",
            scope(),
            "Cache API responses in Redis",
            "Put a Redis cache in front of hot read endpoints to cut latency",
        ),
        decision(
            "web-dyn",
            Scope::Repository("acme/web".to_string()),
            "Adopt DynamoDB for sessions",
            "Switch the session store to DynamoDB for scale",
        ),
    ];
    for d in decisions {
        engine.upsert_decision(d, None, t0()).await.unwrap();
    }
    engine
        .link("dyn", "cache", RelationshipType::Extends, 0.5, vec![], t0())
        .await
        .unwrap();
    engine
}

const QUESTION: &str = "why did we choose DynamoDB for the session store";

#[tokio::test]
async fn test_answer_ranks_similar_decision_first_and_expands_one_hop() {
    let engine = seeded().await;

    let answer = engine.query_facade().answer(QUESTION, &scope()).await.unwrap();

    let ids: Vec<&str> = answer
        .results
        .iter()
        .map(|h| h.decision.decision_id.as_str())
        .collect();
    assert_eq!(ids, vec!["dyn", "cache"]);

    let direct = &answer.results[0];
    assert_eq!(direct.inclusion, Inclusion::Similarity);
    assert!(direct.relevance > 0.0);
    assert_eq!(
        direct.evidence,
        vec![
            "intent:github:pr_created:dyn".to_string(),
            "execution:github:commit_pushed:dyn".to_string(),
        ]
    );

    let neighbour = &answer.results[1];
    assert_eq!(
        neighbour.inclusion,
        Inclusion::Related {
            via: "dyn".to_string(),
            relationship_type: RelationshipType::Extends,
        }
    );
    // expansion decay 0.5 times edge strength 0.5
    assert!((neighbour.relevance - direct.relevance * 0.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_answer_stays_inside_scope() {
    let engine = seeded().await;

    let answer = engine
        .query_facade()
        .answer(QUESTION, &Scope::Repository("acme/web".to_string()))
        .await
        .unwrap();

    let ids: Vec<&str> = answer
        .results
        .iter()
        .map(|h| h.decision.decision_id.as_str())
        .collect();
    assert_eq!(ids, vec!["web-dyn"]);
}

#[tokio::test]
async fn test_archived_decisions_are_never_returned() {
    let engine = seeded().await;
    engine.archive_decision("cache", "replaced by CDN", t0()).await.unwrap();

    let answer = engine.query_facade().answer(QUESTION, &scope()).await.unwrap();

    assert!(answer
        .results
        .iter()
        .all(|h| h.decision.decision_id != "cache"));
    assert_eq!(answer.results.len(), 1);
}

#[tokio::test]
async fn test_trace_has_one_line_per_result() {
    let engine = seeded().await;

    let answer = engine.query_facade().answer(QUESTION, &scope()).await.unwrap();

    assert_eq!(answer.question, QUESTION);
    assert_eq!(answer.trace.len(), answer.results.len());
    assert!(answer.trace[0].starts_with("dyn (similar to the question"));
    assert!(answer.trace[1].contains("extends dyn"));
    assert!(answer.trace[1].contains("github:pr_created:cache"));
}

#[tokio::test]
async fn test_unrelated_question_has_no_answer() {
    let engine = seeded().await;

    let answer = engine
        .query_facade()
        .answer("quarterly payroll export", &scope())
        .await
        .unwrap();

    assert!(answer.results.is_empty());
    assert!(answer.trace.is_empty());
}
