use chrono::{DateTime, TimeZone, Utc};
use memora_core::builder::{self, BuildContext};
use memora_core::model::{
    DecisionEntity, EvidenceItem, FactorWeights, Platform, ProviderResult, Scope, SourceType,
    WeightsConfig,
};
use memora_core::{EngineConfig, OpContext, StaticAuthorityDirectory, Store};

/// Fixed clock so versions and due dates are reproducible
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn scope() -> Scope {
    Scope::Repository("acme/api".to_string())
}

/// Reviewers for `acme/api`: rita (0.9), sam and tom (0.6); vera (0.95)
/// reviews the `platform` workspace and catches escalations.
#[allow(dead_code)]
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

/// Threshold high enough that every fixture decision needs review
#[allow(dead_code)]
pub fn strict_config() -> EngineConfig {
    EngineConfig {
        validation_threshold: 0.99,
        ..EngineConfig::default()
    }
}

#[allow(dead_code)]
pub fn ctx<'a>(config: &'a EngineConfig, dir: &'a StaticAuthorityDirectory) -> OpContext<'a> {
    OpContext::new(config, dir, t0())
}

#[allow(dead_code)]
pub fn item(source_type: SourceType, source_id: &str, author: &str, content: &str) -> EvidenceItem {
    EvidenceItem::new(
        source_type,
        source_id.to_string(),
        content.to_string(),
        author.to_string(),
        t0(),
        Platform::Github,
        None,
    )
}

/// Unscored `inferred` decision with one intent and one execution item
#[allow(dead_code)]
pub fn decision(decision_id: &str) -> DecisionEntity {
    let weights = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
    let ctx = BuildContext {
        decision_id: decision_id.to_string(),
        scope: scope(),
        weights: &weights,
        source_event_ids: vec![format!("evt-{}", decision_id)],
        now: t0(),
    };
    let batch = [
        item(
            SourceType::PrComment,
            &format!("github:pr_created:{}", decision_id),
            "alice",
            "Switch the session store to DynamoDB for scale",
        ),
        item(
            SourceType::Commit,
            &format!("github:commit_pushed:{}", decision_id),
            "bob",
            "Add `sessions::DynamoStore`",
        ),
    ];
    let proposal = ProviderResult {
        is_decision: true,
        title: format!("Decision {}", decision_id),
        description: "Sessions move to DynamoDB".to_string(),
        rationale: "Postgres write load".to_string(),
        ..ProviderResult::default()
    };
    builder::build(&ctx, &batch, &proposal).unwrap().unwrap()
}

/// Store holding each id at version 1, journal drained
#[allow(dead_code)]
pub fn seeded_store(ids: &[&str]) -> Store {
    let config = EngineConfig::default();
    let dir = directory();
    let ctx = ctx(&config, &dir);
    let mut store = Store::default();
    for id in ids {
        memora_core::ops::decision_ops::upsert_decision(&mut store, &ctx, decision(id), None)
            .unwrap();
    }
    store.take_changes();
    store
}
