//! Canonical schema constants for structured logging and events
//!
//! Field keys are shared by the logging macros and the test capture layer so
//! that assertions and emitters never drift apart.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Entity identifiers
pub const FIELD_DECISION_ID: &str = "decision_id";
pub const FIELD_VERSION: &str = "version";
pub const FIELD_TASK_ID: &str = "task_id";
pub const FIELD_BATCH_ID: &str = "batch_id";
pub const FIELD_SCOPE: &str = "scope";

// Collection sizes
pub const FIELD_EVIDENCE_LEN: &str = "evidence_len";
pub const FIELD_RESULT_LEN: &str = "result_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
