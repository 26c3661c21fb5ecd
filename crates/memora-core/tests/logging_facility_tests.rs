#![allow(clippy::unwrap_used, clippy::expect_used)]

use memora_core::errors::{ExError, MemoraError};
use memora_core::logging_facility::test_capture::init_test_capture;
use memora_core::{log_op_end, log_op_error, log_op_start};
use memora_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ERR_CODE};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name, decision_id = "dec-1");

    let starts = capture.events_for(op_name);
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(starts[0].field("decision_id"), Some("dec-1"));
}

#[test]
fn test_log_op_end_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42, version = 3);

    let end = capture
        .events_for(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .expect("end event");
    assert_eq!(end.field("duration_ms"), Some("42"));
    assert_eq!(end.field("version"), Some("3"));
}

#[test]
fn test_log_op_error_includes_stable_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = MemoraError::VersionConflict {
        decision_id: "dec-1".to_string(),
        expected: Some(1),
        actual: Some(2),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);
    let error_event = capture
        .events_for(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("error event");
    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_VERSION_CONFLICT"));
}

#[test]
fn test_log_op_error_accepts_ex_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_ex_unique_4";

    let err: ExError = MemoraError::InsufficientEvidence.into();
    log_op_error!(op_name, err, duration_ms = 1, batch_id = "b-1");

    let error_event = capture
        .events_for(op_name)
        .into_iter()
        .next()
        .expect("error event");
    assert_eq!(
        error_event.field(FIELD_ERR_CODE),
        Some("ERR_INSUFFICIENT_EVIDENCE")
    );
    assert_eq!(error_event.field("batch_id"), Some("b-1"));
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_5";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 7);

    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START)
    });
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END)
    });
    assert_eq!(starts, 1);
    assert_eq!(ends, 1);
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();
    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}
