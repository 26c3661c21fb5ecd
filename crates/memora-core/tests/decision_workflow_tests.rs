#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{ctx, decision, directory, item, scope, seeded_store, strict_config, t0};
use memora_core::builder::{self, BuildContext};
use memora_core::model::{
    DecisionStatus, FactorWeights, ProviderResult, ReviewerFeedback, SourceType, TaskKind,
    TaskPriority, TaskStatus, ValidationOutcome, ValidationTask, Verdict, WeightsConfig,
};
use memora_core::ops::validation_ops::{self, Routing};
use memora_core::ops::{decision_ops, graph_ops};
use memora_core::{apply, EngineConfig, MemoraError, OpContext, Store};

fn feedback(task: &ValidationTask, reviewer: &str, verdict: Verdict) -> ReviewerFeedback {
    ReviewerFeedback {
        task_id: task.task_id.clone(),
        reviewer: reviewer.to_string(),
        version: task.version,
        verdict,
        reason: None,
    }
}

fn await_review(store: &mut Store, ctx: &OpContext<'_>, decision_id: &str) -> ValidationTask {
    match validation_ops::route(store, ctx, decision_id).unwrap().routing {
        Routing::AwaitingReview { task } => task,
        other => panic!("expected a review task, got {:?}", other),
    }
}

#[test]
fn test_scenario_a_senior_approvals_fill_authority_bucket() {
    let config = EngineConfig::default();
    let dir = directory();
    let weights = WeightsConfig::initial(FactorWeights::defaults()).unwrap();
    let build_ctx = BuildContext {
        decision_id: "dec-a".to_string(),
        scope: scope(),
        weights: &weights,
        source_event_ids: vec!["evt-1".to_string(), "evt-2".to_string(), "evt-3".to_string()],
        now: t0(),
    };
    let batch = [
        item(
            SourceType::PrComment,
            "github:pr_created:1",
            "alice",
            "switch to DynamoDB for scale",
        ),
        item(SourceType::Review, "github:review_submitted:2", "rita", "[review: approved] LGTM"),
        item(SourceType::Review, "github:review_submitted:3", "vera", "[review: approved] ship it"),
    ];
    let proposal = ProviderResult {
        is_decision: true,
        title: "Switch to DynamoDB".to_string(),
        ..ProviderResult::default()
    };

    let built = builder::build(&build_ctx, &batch, &proposal).unwrap().unwrap();
    assert_eq!(built.evidence.intent.len(), 1);
    assert_eq!(built.evidence.authority.len(), 2);

    let mut store = Store::default();
    let op = ctx(&config, &dir);
    decision_ops::upsert_decision(&mut store, &op, built, None).unwrap();
    let scored = store.current("dec-a").unwrap();

    let factors = &scored.confidence.factors;
    assert!((factors.participant_authority - 0.925).abs() < 1e-9);
    assert!((factors.evidence_quantity - 0.75).abs() < 1e-9);
    assert!(factors.participant_authority > factors.evidence_quantity);
    assert!((scored.confidence.overall - scored.confidence.recomputed_overall()).abs() < 1e-12);
}

#[test]
fn test_scenario_b_low_confidence_opens_single_pending_task() {
    let config = EngineConfig::default();
    let dir = directory();
    let op = ctx(&config, &dir);
    let mut store = seeded_store(&["dec-b"]);

    let overall = store.current("dec-b").unwrap().confidence.overall;
    assert!(overall < config.validation_threshold);
    assert!(overall >= config.validation_threshold / 2.0);

    let task = await_review(&mut store, &op, "dec-b");
    let current = store.current("dec-b").unwrap();
    assert_eq!(current.status, DecisionStatus::PendingValidation);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.kind, TaskKind::LowConfidence);
    assert_eq!(task.priority, TaskPriority::Normal);
    assert_eq!(task.version, current.version);
    assert!(task.due_at <= t0() + config.task_due_window());

    let open: Vec<_> = store.open_tasks_for("dec-b");
    assert_eq!(open.len(), 1);
}

#[test]
fn test_scenario_c_dispute_then_consensus_keeps_weights() {
    let config = strict_config();
    let dir = directory();
    let op = ctx(&config, &dir);
    let mut store = seeded_store(&["dec-c"]);
    let task = await_review(&mut store, &op, "dec-c");

    let disputed =
        validation_ops::submit_feedback(&mut store, &op, &feedback(&task, "rita", Verdict::Reject))
            .unwrap();
    assert_eq!(disputed.status, DecisionStatus::Disputed);

    let first = disputed.next_task.unwrap();
    let after_first =
        validation_ops::submit_feedback(&mut store, &op, &feedback(&first, "sam", Verdict::Approve))
            .unwrap();
    assert_eq!(after_first.status, DecisionStatus::Disputed);

    let second = after_first.next_task.unwrap();
    let settled =
        validation_ops::submit_feedback(&mut store, &op, &feedback(&second, "tom", Verdict::Approve))
            .unwrap();
    assert_eq!(settled.status, DecisionStatus::Validated);

    let outcomes: Vec<ValidationOutcome> =
        store.validation_history().iter().map(|s| s.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ValidationOutcome::Disputed,
            ValidationOutcome::Validated,
            ValidationOutcome::Validated
        ]
    );
    assert_eq!(store.weights().version, 1);
    assert!(store.calibration_log().is_empty());

    let calibrating = EngineConfig {
        calibration: memora_core::config::CalibrationSettings {
            min_samples: 3,
            ..Default::default()
        },
        ..strict_config()
    };
    let event = validation_ops::recalibrate(&mut store, &ctx(&calibrating, &dir)).unwrap();
    assert_eq!(event.from_version, 1);
    assert_eq!(event.to_version, 2);
    assert_eq!(store.weights().version, 2);
    assert!((store.weights().weights.sum() - 1.0).abs() < 1e-6);
    // stored scores are not rewritten by recalibration
    assert_eq!(store.current("dec-c").unwrap().confidence.weights_version, 1);
}

#[test]
fn test_scenario_d_supersession_sets_both_pointers() {
    let config = EngineConfig::default();
    let dir = directory();
    let op = ctx(&config, &dir);
    let mut store = seeded_store(&["d1", "d2"]);

    graph_ops::supersede(&mut store, &op, "d1", "d2").unwrap();

    let d1 = store.current("d1").unwrap();
    let d2 = store.current("d2").unwrap();
    assert_eq!(d1.superseded_by.as_deref(), Some("d2"));
    assert_eq!(d2.supersedes.as_deref(), Some("d1"));
    assert_eq!(d1.status, DecisionStatus::Superseded);
}

#[test]
fn test_n_upserts_keep_n_gapless_versions() {
    let config = EngineConfig::default();
    let dir = directory();
    let op = ctx(&config, &dir);
    let mut store = Store::default();

    let mut base = None;
    for n in 1..=5u32 {
        let mut next = decision("dec-v");
        next.description = format!("revision {}", n);
        let version = decision_ops::upsert_decision(&mut store, &op, next, base).unwrap();
        assert_eq!(version, n);
        base = Some(version);
    }

    let versions: Vec<u32> = store.versions("dec-v").unwrap().iter().map(|d| d.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    assert_eq!(store.current("dec-v").unwrap().description, "revision 5");
    assert_eq!(store.version("dec-v", 2).unwrap().description, "revision 2");
}

#[test]
fn test_stale_base_version_loses_race() {
    let config = EngineConfig::default();
    let dir = directory();
    let op = ctx(&config, &dir);
    let store = seeded_store(&["dec-r"]);

    // two writers both read version 1
    let first = apply(&store, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("dec-r"), Some(1))
    })
    .unwrap();
    let second = apply(&first.state, |draft| {
        decision_ops::upsert_decision(draft, &op, decision("dec-r"), Some(1))
    });

    assert_eq!(first.value, 2);
    assert!(matches!(
        second,
        Err(MemoraError::VersionConflict { expected: Some(1), actual: Some(2), .. })
    ));
    assert_eq!(first.state.head("dec-r"), Some(2));
}

#[test]
fn test_feedback_on_old_version_is_stale() {
    let config = strict_config();
    let dir = directory();
    let op = ctx(&config, &dir);
    let mut store = seeded_store(&["dec-s"]);
    let task = await_review(&mut store, &op, "dec-s");

    let mut stale = feedback(&task, "rita", Verdict::Approve);
    stale.version = 1;
    let err = validation_ops::submit_feedback(&mut store, &op, &stale).unwrap_err();
    assert!(matches!(
        err,
        MemoraError::StaleFeedback { feedback_version: 1, current_version: 2, .. }
    ));
    assert!(store.task(&task.task_id).unwrap().is_open());
}

#[test]
fn test_overdue_task_escalates_to_another_reviewer() {
    let config = strict_config();
    let dir = directory();
    let mut store = seeded_store(&["dec-e"]);
    let task = await_review(&mut store, &ctx(&config, &dir), "dec-e");

    let later = OpContext::new(&config, &dir, t0() + chrono::Duration::hours(2));
    let outcome = validation_ops::escalate_overdue(&mut store, &later).unwrap();
    assert_eq!(outcome.escalated.len(), 1);
    let escalated = store.task(&task.task_id).unwrap();
    assert_eq!(escalated.status, TaskStatus::Escalated);
    assert_eq!(escalated.escalation_count, 1);
    assert_ne!(escalated.assigned_reviewer, task.assigned_reviewer);
    assert!(escalated.due_at > later.now);
    assert_eq!(outcome.notifications.len(), 1);
}

#[test]
fn test_attach_evidence_records_outcomes() {
    let config = EngineConfig::default();
    let dir = directory();
    let op = ctx(&config, &dir);
    let mut store = seeded_store(&["dec-o"]);
    let before = store.current("dec-o").unwrap().confidence.factors.outcome_validation;

    let followup = item(
        SourceType::Commit,
        "github:commit_pushed:99",
        "bob",
        "Tune dec-o capacity after rollout",
    );
    let version = decision_ops::attach_evidence(&mut store, &op, "dec-o", 1, &[followup.clone()])
        .unwrap();
    assert_eq!(version, Some(2));
    let current = store.current("dec-o").unwrap();
    assert_eq!(current.evidence.outcomes.len(), 1);
    assert!(current.confidence.factors.outcome_validation > before);

    // the same item again adds nothing
    let again = decision_ops::attach_evidence(&mut store, &op, "dec-o", 2, &[followup]).unwrap();
    assert_eq!(again, None);
}
