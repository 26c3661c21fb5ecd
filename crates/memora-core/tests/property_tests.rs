#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use chrono::Utc;
use memora_core::model::{
    EventType, EvidenceBucket, FactorWeights, IngestionEvent, Platform, RelationshipType,
    SourceType, WeightsConfig,
};
use memora_core::normalizer::normalize;
use memora_core::ops::graph_ops;
use memora_core::rules::invariants;
use memora_core::scorer::{self, factors};
use memora_core::{apply, NoopAuthorityDirectory};
use proptest::prelude::*;

fn weights_strategy() -> impl Strategy<Value = FactorWeights> {
    prop::array::uniform5(0.01f64..1.0).prop_map(|raw| {
        let total: f64 = raw.iter().sum();
        FactorWeights {
            evidence_quality: raw[0] / total,
            evidence_quantity: raw[1] / total,
            participant_authority: raw[2] / total,
            temporal_consistency: raw[3] / total,
            outcome_validation: raw[4] / total,
        }
    })
}

fn bucket_strategy() -> impl Strategy<Value = EvidenceBucket> {
    prop_oneof![
        Just(EvidenceBucket::Intent),
        Just(EvidenceBucket::Execution),
        Just(EvidenceBucket::Authority),
        Just(EvidenceBucket::Outcomes),
    ]
}

proptest! {
    #[test]
    fn prop_overall_is_bounded_and_reproducible(
        weights in weights_strategy(),
        extra in prop::collection::vec((bucket_strategy(), "[a-z `:/.]{0,400}"), 0..12),
    ) {
        let config = WeightsConfig { version: 1, weights, created_at: Utc::now() };
        let mut decision = common::decision("dec-p");
        for (i, (bucket, content)) in extra.into_iter().enumerate() {
            let item = common::item(SourceType::PrComment, &format!("src-{}", i), "carol", &content);
            decision.evidence.push(bucket, item);
        }

        let first = scorer::score(&decision, &config, &NoopAuthorityDirectory);
        let second = scorer::score(&decision, &config, &NoopAuthorityDirectory);
        prop_assert!((0.0..=1.0).contains(&first.overall));
        prop_assert_eq!(&first, &second);
        prop_assert!((first.overall - first.recomputed_overall()).abs() < 1e-9);
        for (_, value) in first.factors.iter() {
            prop_assert!((0.0..=1.0).contains(value));
        }
    }

    #[test]
    fn prop_specificity_never_drops_with_more_detail(content in "[a-z ]{0,300}") {
        let base = factors::specificity(&content);
        let more_words = format!("{} and more words", content);
        let with_code = format!("{} `Store::load`", content);
        let with_url = format!("{} https://example.com/adr", content);
        prop_assert!(factors::specificity(&more_words) >= base);
        prop_assert!(factors::specificity(&with_code) >= base);
        prop_assert!(factors::specificity(&with_url) >= base);
    }

    #[test]
    fn prop_quantity_is_monotonic_and_below_one(n in 0usize..500) {
        let a = factors::evidence_quantity(n).value;
        let b = factors::evidence_quantity(n + 1).value;
        prop_assert!(b > a);
        prop_assert!(b < 1.0);
    }

    #[test]
    fn prop_normalize_is_idempotent(
        author in "[a-z]{1,12}",
        source_id in "[a-z0-9]{1,16}",
        content in "[A-Za-z ]{1,120}",
    ) {
        prop_assume!(!content.trim().is_empty());
        let event = IngestionEvent::new(
            "evt", Platform::Slack, EventType::MessageSent, Utc::now(), author, source_id, content,
        );
        let a = normalize(&event).unwrap();
        let b = normalize(&event).unwrap();
        prop_assert_eq!(&a.source_id, &b.source_id);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_links_never_leave_half_edges(
        ops in prop::collection::vec((0usize..4, 0usize..4, any::<bool>(), 0.0f64..=1.0), 1..30),
    ) {
        let ids = ["a", "b", "c", "d"];
        let mut state = common::seeded_store(&ids);
        for (x, y, add, strength) in ops {
            let (a, b) = (ids[x], ids[y]);
            let result = apply(&state, |draft| {
                if add {
                    graph_ops::link(draft, a, b, RelationshipType::Extends, strength, vec![], Utc::now())
                        .map(|_| ())
                } else {
                    graph_ops::unlink(draft, a, b)
                }
            });
            if let Ok(applied) = result {
                state = applied.state;
            }
            prop_assert!(invariants::find_half_edges(&state).is_empty());
            prop_assert!(invariants::find_related_pointer_mismatches(&state).is_empty());
        }
    }
}
