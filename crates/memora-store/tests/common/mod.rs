use chrono::{DateTime, TimeZone, Utc};
use memora_core::builder::{self, BuildContext};
use memora_core::model::{
    DecisionEntity, EvidenceItem, FactorWeights, Platform, ProviderResult, Scope, SourceType,
    WeightsConfig,
};
use memora_core::{EngineConfig, NoopAuthorityDirectory, OpContext};
use memora_store::SqliteSink;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn default_weights() -> WeightsConfig {
    WeightsConfig {
        version: 1,
        weights: FactorWeights::defaults(),
        created_at: t0(),
    }
}

#[allow(dead_code)]
pub fn ctx<'a>(config: &'a EngineConfig) -> OpContext<'a> {
    OpContext::new(config, &NoopAuthorityDirectory, t0())
}

/// Database file inside a fresh temp dir; keep the `TempDir` alive
#[allow(dead_code)]
pub fn temp_sink() -> (TempDir, SqliteSink, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memora.db");
    let sink = SqliteSink::open(&path).unwrap();
    (dir, sink, path)
}

fn item(source_type: SourceType, source_id: &str, author: &str, content: &str) -> EvidenceItem {
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

#[allow(dead_code)]
pub fn decision(decision_id: &str) -> DecisionEntity {
    let weights = default_weights();
    let ctx = BuildContext {
        decision_id: decision_id.to_string(),
        scope: Scope::Repository("acme/api".to_string()),
        weights: &weights,
        source_event_ids: vec![format!("evt-{}", decision_id)],
        now: t0(),
    };
    let batch = [
        item(
            SourceType::PrComment,
            &format!("github:pr_created:{}", decision_id),
            "alice",
            "Move sessions to DynamoDB",
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
        ..ProviderResult::default()
    };
    builder::build(&ctx, &batch, &proposal).unwrap().unwrap()
}
