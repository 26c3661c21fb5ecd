//! Fixtures shared by unit tests

use chrono::{TimeZone, Utc};

use crate::builder::{self, BuildContext};
use crate::model::{
    DecisionEntity, EvidenceItem, FactorWeights, Platform, ProviderResult, Scope, SourceType,
    WeightsConfig,
};
use crate::ops::Store;

pub fn evidence(
    source_type: SourceType,
    source_id: &str,
    author: &str,
    content: &str,
    platform: Platform,
) -> EvidenceItem {
    EvidenceItem::new(
        source_type,
        source_id.to_string(),
        content.to_string(),
        author.to_string(),
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        platform,
        None,
    )
}

/// Inferred, unscored decision with one intent and one execution item
/// (authors alice and bob) in `repository:acme/api`
pub fn decision(decision_id: &str) -> DecisionEntity {
    let weights = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
    let ctx = BuildContext {
        decision_id: decision_id.to_string(),
        scope: Scope::Repository("acme/api".to_string()),
        weights: &weights,
        source_event_ids: vec![format!("evt-{}", decision_id)],
        now: Utc::now(),
    };
    let batch = [
        evidence(
            SourceType::PrComment,
            &format!("github:pr_created:{}", decision_id),
            "alice",
            "Switch the session store to DynamoDB for scale",
            Platform::Github,
        ),
        evidence(
            SourceType::Commit,
            &format!("github:commit_pushed:{}", decision_id),
            "bob",
            "Add `sessions::DynamoStore`",
            Platform::Github,
        ),
    ];
    let proposal = ProviderResult {
        is_decision: true,
        title: "Adopt DynamoDB".to_string(),
        description: "Sessions move to DynamoDB".to_string(),
        rationale: "Postgres write load".to_string(),
        ..ProviderResult::default()
    };
    builder::build(&ctx, &batch, &proposal).unwrap().unwrap()
}

/// Store holding version 1 of each id, journal drained
pub fn seeded_store(ids: &[&str]) -> Store {
    let mut store = Store::default();
    for id in ids {
        store.push_version(decision(id)).unwrap();
    }
    store.take_changes();
    store
}
