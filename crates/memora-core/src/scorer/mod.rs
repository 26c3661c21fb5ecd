//! Confidence scoring
//!
//! `score` is a pure function of a decision's evidence buckets, the weight
//! configuration and the authority directory. It always recomputes from
//! scratch; no score is ever patched incrementally.

pub mod calibration;
pub mod factors;

use crate::authority::AuthorityDirectory;
use crate::model::{ConfidenceScore, DecisionEntity, FactorSet, WeightsConfig};

pub use calibration::{prediction_error, recalibrate, Recalibration};

/// Score a decision with the given weight configuration
pub fn score(
    decision: &DecisionEntity,
    weights: &WeightsConfig,
    authority: &dyn AuthorityDirectory,
) -> ConfidenceScore {
    let evidence = &decision.evidence;

    let quality = factors::evidence_quality(evidence);
    let quantity = factors::evidence_quantity(evidence.len());
    let authority = factors::participant_authority(&evidence.authority, authority);
    let temporal = factors::temporal_consistency(&evidence.intent, &evidence.execution);
    let outcome = factors::outcome_validation(&evidence.outcomes);

    let values = FactorSet {
        evidence_quality: quality.value,
        evidence_quantity: quantity.value,
        participant_authority: authority.value,
        temporal_consistency: temporal.value,
        outcome_validation: outcome.value,
    };
    let explanation = FactorSet {
        evidence_quality: quality.explanation,
        evidence_quantity: quantity.explanation,
        participant_authority: authority.explanation,
        temporal_consistency: temporal.explanation,
        outcome_validation: outcome.explanation,
    };

    let overall = values.dot(&weights.weights).clamp(0.0, 1.0);

    ConfidenceScore {
        overall,
        factors: values,
        weights: weights.weights.clone(),
        explanation,
        weights_version: weights.version,
    }
}

/// Replace `decision.confidence` with a fresh score
pub fn rescore(
    decision: &mut DecisionEntity,
    weights: &WeightsConfig,
    authority: &dyn AuthorityDirectory,
) {
    decision.confidence = score(decision, weights, authority);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{NoopAuthorityDirectory, StaticAuthorityDirectory};
    use crate::builder::{build, BuildContext};
    use crate::model::{
        EvidenceItem, FactorWeights, Platform, ProviderResult, Scope, SourceType,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn decision_with(items: Vec<EvidenceItem>, weights: &WeightsConfig) -> DecisionEntity {
        let ctx = BuildContext {
            decision_id: "dec-1".to_string(),
            scope: Scope::Repository("acme/api".to_string()),
            weights,
            source_event_ids: Vec::new(),
            now: Utc::now(),
        };
        let proposal = ProviderResult {
            is_decision: true,
            title: "Adopt DynamoDB".to_string(),
            ..ProviderResult::default()
        };
        build(&ctx, &items, &proposal).unwrap().unwrap()
    }

    fn item(source_type: SourceType, id: &str, author: &str, content: &str, minutes: i64) -> EvidenceItem {
        EvidenceItem::new(
            source_type,
            id.to_string(),
            content.to_string(),
            author.to_string(),
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes),
            Platform::Github,
            None,
        )
    }

    #[test]
    fn test_overall_is_weighted_sum() {
        let weights = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
        let d = decision_with(
            vec![
                item(SourceType::PrComment, "a", "alice", "switch to DynamoDB for scale", 0),
                item(SourceType::Commit, "b", "alice", "add `dynamo.rs` client", 30),
            ],
            &weights,
        );
        let s = score(&d, &weights, &NoopAuthorityDirectory);
        assert!((s.overall - s.recomputed_overall()).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&s.overall));
        assert_eq!(s.weights_version, 1);
        assert_eq!(s.factors.participant_authority, 0.0);
        assert_eq!(s.factors.outcome_validation, 0.5);
    }

    #[test]
    fn test_scoring_is_reproducible() {
        let weights = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
        let dir = StaticAuthorityDirectory::new().with_identity("bob", 0.9);
        let d = decision_with(
            vec![
                item(SourceType::PrComment, "a", "alice", "use DynamoDB", 0),
                item(SourceType::Review, "b", "bob", "approved", 10),
            ],
            &weights,
        );
        assert_eq!(score(&d, &weights, &dir), score(&d, &weights, &dir));
    }

    #[test]
    fn test_rescore_uses_new_weights_version() {
        let v1 = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
        let mut d = decision_with(
            vec![item(SourceType::PrComment, "a", "alice", "use DynamoDB", 0)],
            &v1,
        );
        let v2 = v1.next(FactorWeights::defaults(), Utc::now());
        rescore(&mut d, &v2, &NoopAuthorityDirectory);
        assert_eq!(d.confidence.weights_version, 2);
    }
}
