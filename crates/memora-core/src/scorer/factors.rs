//! Individual confidence factors
//!
//! Every factor returns a value in [0, 1] plus a one-line explanation.

use chrono::Duration;
use std::collections::BTreeSet;

use crate::authority::AuthorityDirectory;
use crate::model::{EvidenceBuckets, EvidenceItem};

/// Content length at which the length component saturates
pub const LENGTH_SATURATION_CHARS: f64 = 280.0;
const LENGTH_WEIGHT: f64 = 0.6;
const CODE_REFERENCE_BONUS: f64 = 0.25;
const LINK_BONUS: f64 = 0.15;

/// Intent/execution spread at which temporal consistency reaches 0
pub const TEMPORAL_HORIZON_DAYS: i64 = 30;
/// Execution may precede intent by this much (e.g. a PR opened after its commits)
pub const EXECUTION_LEAD_GRACE_HOURS: i64 = 24;
/// Score for execution that clearly predates the stated intent
pub const INCONSISTENT_TIMELINE_SCORE: f64 = 0.05;

const NO_OUTCOME_SCORE: f64 = 0.5;

const FILE_EXTENSIONS: [&str; 12] = [
    ".rs", ".py", ".ts", ".js", ".go", ".java", ".kt", ".sql", ".toml", ".yaml", ".yml", ".json",
];
const REVERT_MARKERS: [&str; 5] = ["revert", "rollback", "roll back", "rolled back", "backed out"];

#[derive(Debug, Clone, PartialEq)]
pub struct FactorValue {
    pub value: f64,
    pub explanation: String,
}

impl FactorValue {
    fn new(value: f64, explanation: impl Into<String>) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            explanation: explanation.into(),
        }
    }
}

pub fn has_code_reference(content: &str) -> bool {
    content.contains('`')
        || content.contains("::")
        || content.contains("()")
        || content
            .split_whitespace()
            .any(|word| {
                let word = word.trim_end_matches(|c: char| c == ',' || c == '.' || c == ')' || c == ':');
                FILE_EXTENSIONS.iter().any(|ext| word.len() > ext.len() && word.ends_with(ext))
            })
}

pub fn has_link(content: &str) -> bool {
    content.contains("http://") || content.contains("https://")
}

/// Specificity of one piece of content
///
/// `0.6·min(chars / 280, 1) + 0.25·[code reference] + 0.15·[link]`.
/// Monotonic: more text, a code reference or a link never lowers it.
pub fn specificity(content: &str) -> f64 {
    let chars = content.trim().chars().count() as f64;
    let mut value = LENGTH_WEIGHT * (chars / LENGTH_SATURATION_CHARS).min(1.0);
    if has_code_reference(content) {
        value += CODE_REFERENCE_BONUS;
    }
    if has_link(content) {
        value += LINK_BONUS;
    }
    value.clamp(0.0, 1.0)
}

/// Mean specificity across every bucket
pub fn evidence_quality(evidence: &EvidenceBuckets) -> FactorValue {
    let n = evidence.len();
    if n == 0 {
        return FactorValue::new(0.0, "no evidence");
    }
    let total: f64 = evidence.iter().map(|(_, item)| specificity(&item.content)).sum();
    let mean = total / n as f64;
    FactorValue::new(mean, format!("mean specificity {:.2} over {} items", mean, n))
}

/// `1 - 1/(1+n)`: diminishing returns, never reaches 1
pub fn evidence_quantity(n: usize) -> FactorValue {
    let value = 1.0 - 1.0 / (1.0 + n as f64);
    FactorValue::new(value, format!("{} evidence items", n))
}

/// Mean authority of the distinct authors in the authority bucket
pub fn participant_authority(
    authority_items: &[EvidenceItem],
    directory: &dyn AuthorityDirectory,
) -> FactorValue {
    let authors: BTreeSet<&str> = authority_items.iter().map(|i| i.author.as_str()).collect();
    if authors.is_empty() {
        return FactorValue::new(0.0, "no approvals or reviews");
    }
    let mean = authors.iter().map(|a| directory.authority(a)).sum::<f64>() / authors.len() as f64;
    FactorValue::new(
        mean,
        format!("mean authority {:.2} across {} reviewers", mean, authors.len()),
    )
}

/// 1.0 minus the normalised delay between first intent and first execution
pub fn temporal_consistency(intent: &[EvidenceItem], execution: &[EvidenceItem]) -> FactorValue {
    let (Some(first_intent), Some(first_execution)) = (
        intent.iter().map(|i| i.timestamp).min(),
        execution.iter().map(|i| i.timestamp).min(),
    ) else {
        return FactorValue::new(1.0, "no intent/execution pair to compare");
    };

    if first_execution + Duration::hours(EXECUTION_LEAD_GRACE_HOURS) < first_intent {
        return FactorValue::new(
            INCONSISTENT_TIMELINE_SCORE,
            "execution predates the stated intent",
        );
    }

    let spread = (first_execution - first_intent).max(Duration::zero());
    let horizon = Duration::days(TEMPORAL_HORIZON_DAYS);
    let ratio = spread.num_seconds() as f64 / horizon.num_seconds() as f64;
    FactorValue::new(
        1.0 - ratio.min(1.0),
        format!("acted on {} hours after discussion", spread.num_hours()),
    )
}

pub fn is_reverting(item: &EvidenceItem) -> bool {
    let lower = item.content.to_lowercase();
    REVERT_MARKERS.iter().any(|m| lower.contains(m))
}

/// 1.0 with only stabilizing follow-ups, 0.5 with none, toward 0 as reverts accumulate
pub fn outcome_validation(outcomes: &[EvidenceItem]) -> FactorValue {
    if outcomes.is_empty() {
        return FactorValue::new(NO_OUTCOME_SCORE, "no outcome evidence yet");
    }
    let reverts = outcomes.iter().filter(|i| is_reverting(i)).count();
    let stable = outcomes.len() - reverts;
    if reverts == 0 {
        return FactorValue::new(1.0, format!("{} stabilizing follow-ups, no reverts", stable));
    }
    let stable_share = stable as f64 / outcomes.len() as f64;
    FactorValue::new(
        stable_share / (1.0 + reverts as f64),
        format!("{} reverts against {} stabilizing follow-ups", reverts, stable),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{NoopAuthorityDirectory, StaticAuthorityDirectory};
    use crate::model::{Platform, SourceType};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn item(author: &str, content: &str, ts: DateTime<Utc>) -> EvidenceItem {
        EvidenceItem::new(
            SourceType::PrComment,
            format!("{}-{}", author, ts.timestamp()),
            content.to_string(),
            author.to_string(),
            ts,
            Platform::Github,
            None,
        )
    }

    #[test]
    fn test_specificity_rewards_code_and_links() {
        let plain = specificity("use dynamo");
        let code = specificity("use `dynamo::Client`");
        let link = specificity("use dynamo https://aws.amazon.com/dynamodb");
        assert!(code > plain);
        assert!(link > plain);
        assert!(specificity("see src/store.rs.") > specificity("see src/store"));
        assert_eq!(specificity(""), 0.0);
    }

    #[test]
    fn test_specificity_saturates() {
        let long = "x".repeat(10_000);
        assert!((specificity(&long) - LENGTH_WEIGHT).abs() < 1e-12);
        let everything = format!("{} `a::b` https://x", long);
        assert_eq!(specificity(&everything), 1.0);
    }

    #[test]
    fn test_quantity_saturates_below_one() {
        assert_eq!(evidence_quantity(0).value, 0.0);
        assert_eq!(evidence_quantity(1).value, 0.5);
        assert!(evidence_quantity(1_000).value < 1.0);
        assert!(evidence_quantity(4).value > evidence_quantity(3).value);
    }

    #[test]
    fn test_authority_defaults_and_distinct_authors() {
        assert_eq!(participant_authority(&[], &NoopAuthorityDirectory).value, 0.0);

        let items = [item("bob", "ok", at(0)), item("bob", "ok again", at(1))];
        assert_eq!(participant_authority(&items, &NoopAuthorityDirectory).value, 0.5);

        let dir = StaticAuthorityDirectory::new()
            .with_identity("bob", 0.9)
            .with_identity("eve", 0.7);
        let items = [item("bob", "ok", at(0)), item("eve", "ok", at(1))];
        assert!((participant_authority(&items, &dir).value - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_temporal_consistency() {
        let intent = [item("a", "plan", at(0))];
        let same_day = [item("a", "commit", at(2))];
        let month_later = [item("a", "commit", at(24 * 40))];
        let before = [item("a", "commit", at(-72))];

        assert!(temporal_consistency(&intent, &same_day).value > 0.99);
        assert_eq!(temporal_consistency(&intent, &month_later).value, 0.0);
        assert_eq!(
            temporal_consistency(&intent, &before).value,
            INCONSISTENT_TIMELINE_SCORE
        );
        assert_eq!(temporal_consistency(&intent, &[]).value, 1.0);
    }

    #[test]
    fn test_outcome_validation() {
        assert_eq!(outcome_validation(&[]).value, 0.5);
        let stable = [item("a", "p99 latency stable for a week", at(0))];
        assert_eq!(outcome_validation(&stable).value, 1.0);
        let one_revert = [item("a", "stable", at(0)), item("b", "Revert the change", at(1))];
        assert!((outcome_validation(&one_revert).value - 0.25).abs() < 1e-12);
        let reverts = [item("a", "revert", at(0)), item("b", "rollback", at(1))];
        assert_eq!(outcome_validation(&reverts).value, 0.0);
    }
}
