use memora_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using MemoraError
pub type Result<T> = std::result::Result<T, MemoraError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code used for programmatic handling,
/// log assertions, and CLI exit messages. Codes never change once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Ingestion
    MalformedEvent,

    // Inference
    ProviderUnavailable,
    InsufficientEvidence,
    Timeout,

    // Graph
    NotFound,
    VersionConflict,
    DuplicateLink,
    SelfLink,
    CycleDetected,
    InvariantViolation,

    // Workflow
    InvalidTransition,
    StaleFeedback,
    AlreadyResolved,

    // Configuration / input
    InvalidInput,
    InvalidConfig,

    // Infrastructure
    Io,
    Serialization,
    Persistence,
    Migration,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MalformedEvent => "ERR_MALFORMED_EVENT",
            ExErrorKind::ProviderUnavailable => "ERR_PROVIDER_UNAVAILABLE",
            ExErrorKind::InsufficientEvidence => "ERR_INSUFFICIENT_EVIDENCE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::VersionConflict => "ERR_VERSION_CONFLICT",
            ExErrorKind::DuplicateLink => "ERR_DUPLICATE_LINK",
            ExErrorKind::SelfLink => "ERR_SELF_LINK",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ExErrorKind::InvalidTransition => "ERR_INVALID_TRANSITION",
            ExErrorKind::StaleFeedback => "ERR_STALE_FEEDBACK",
            ExErrorKind::AlreadyResolved => "ERR_ALREADY_RESOLVED",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Migration => "ERR_MIGRATION",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Transient kinds are retried locally; everything else propagates.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExErrorKind::ProviderUnavailable | ExErrorKind::Timeout
        )
    }
}

/// Canonical structured error type
///
/// Carries a classification plus optional context. Built with the `with_*`
/// methods and read back through the getters.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    decision_id: Option<String>,
    task_id: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            decision_id: None,
            task_id: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn with_decision_id(mut self, id: impl Into<String>) -> Self {
        self.decision_id = Some(id.into());
        self
    }

    pub fn with_task_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn decision_id(&self) -> Option<&str> {
        self.decision_id.as_deref()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(decision_id) = &self.decision_id {
            write!(f, " (decision_id: {})", decision_id)?;
        }
        if let Some(task_id) = &self.task_id {
            write!(f, " (task_id: {})", task_id)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for Memora operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoraError {
    // ===== Ingestion =====
    /// Ingestion event is missing a required field
    #[error("Malformed event {event_id}: missing or empty field '{field}'")]
    MalformedEvent { event_id: String, field: String },

    // ===== Inference =====
    #[error("Inference provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// Neither intent nor execution evidence is present
    #[error("Insufficient evidence: intent and execution buckets are both empty")]
    InsufficientEvidence,

    // ===== Graph =====
    #[error("Decision not found: {decision_id}")]
    DecisionNotFound { decision_id: String },

    #[error("Decision version not found: {decision_id}@{version}")]
    VersionNotFound { decision_id: String, version: u32 },

    /// Caller's base version is stale (or the decision already exists / is missing)
    #[error("Version conflict on {decision_id}: expected {expected:?}, current {actual:?}")]
    VersionConflict {
        decision_id: String,
        expected: Option<u32>,
        actual: Option<u32>,
    },

    #[error("Decision cannot be linked to itself: {decision_id}")]
    SelfLink { decision_id: String },

    #[error("Relationship already exists: {source_id} -> {target_id}")]
    DuplicateLink { source_id: String, target_id: String },

    #[error("Relationship not found: {source_id} -> {target_id}")]
    LinkNotFound { source_id: String, target_id: String },

    #[error("Relationship strength out of range: {strength}")]
    InvalidStrength { strength: f64 },

    #[error("Supersession would create a cycle: {decision_id} -> {successor_id}")]
    SupersessionCycle {
        decision_id: String,
        successor_id: String,
    },

    #[error("Invariant violation: {}", violations.join("; "))]
    InvariantViolation { violations: Vec<String> },

    // ===== Workflow =====
    #[error("Validation task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("Validation task already resolved: {task_id}")]
    TaskAlreadyResolved { task_id: String },

    #[error("Invalid status transition for {decision_id}: {from} -> {to}")]
    InvalidTransition {
        decision_id: String,
        from: String,
        to: String,
    },

    /// Feedback targets a version that is no longer current
    #[error("Stale feedback for {decision_id}: reviewed v{feedback_version}, current v{current_version}")]
    StaleFeedback {
        decision_id: String,
        task_id: String,
        feedback_version: u32,
        current_version: u32,
    },

    // ===== Scoring / config =====
    #[error("Invalid factor weights: {reason}")]
    InvalidWeights { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Not enough validation samples to recalibrate: have {available}, need {required}")]
    InsufficientCalibrationSamples { available: usize, required: usize },

    // ===== Generic =====
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<MemoraError> for ExError {
    fn from(err: MemoraError) -> Self {
        let message = err.to_string();
        match err {
            MemoraError::MalformedEvent { event_id, .. } => {
                ExError::new(ExErrorKind::MalformedEvent)
                    .with_entity_id(event_id)
                    .with_op("normalize")
                    .with_message(message)
            }

            MemoraError::ProviderUnavailable { .. } => {
                ExError::new(ExErrorKind::ProviderUnavailable)
                    .with_op("infer")
                    .with_message(message)
            }

            MemoraError::InsufficientEvidence => ExError::new(ExErrorKind::InsufficientEvidence)
                .with_op("build")
                .with_message(message),

            MemoraError::DecisionNotFound { decision_id }
            | MemoraError::VersionNotFound { decision_id, .. } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_decision_id(decision_id)
                    .with_message(message)
            }

            MemoraError::VersionConflict { decision_id, .. } => {
                ExError::new(ExErrorKind::VersionConflict)
                    .with_decision_id(decision_id)
                    .with_message(message)
            }

            MemoraError::SelfLink { decision_id } => ExError::new(ExErrorKind::SelfLink)
                .with_decision_id(decision_id)
                .with_op("link")
                .with_message(message),

            MemoraError::DuplicateLink { source_id, target_id } => {
                ExError::new(ExErrorKind::DuplicateLink)
                    .with_decision_id(source_id)
                    .with_entity_id(target_id)
                    .with_op("link")
                    .with_message(message)
            }

            MemoraError::LinkNotFound { source_id, target_id } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_decision_id(source_id)
                    .with_entity_id(target_id)
                    .with_message(message)
            }

            MemoraError::InvalidStrength { .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("link")
                .with_message(message),

            MemoraError::SupersessionCycle { decision_id, successor_id } => {
                ExError::new(ExErrorKind::CycleDetected)
                    .with_decision_id(decision_id)
                    .with_entity_id(successor_id)
                    .with_op("supersede")
                    .with_message(message)
            }

            MemoraError::InvariantViolation { .. } => {
                ExError::new(ExErrorKind::InvariantViolation).with_message(message)
            }

            MemoraError::TaskNotFound { task_id } => ExError::new(ExErrorKind::NotFound)
                .with_task_id(task_id)
                .with_message(message),

            MemoraError::TaskAlreadyResolved { task_id } => {
                ExError::new(ExErrorKind::AlreadyResolved)
                    .with_task_id(task_id)
                    .with_message(message)
            }

            MemoraError::InvalidTransition { decision_id, .. } => {
                ExError::new(ExErrorKind::InvalidTransition)
                    .with_decision_id(decision_id)
                    .with_message(message)
            }

            MemoraError::StaleFeedback { decision_id, task_id, .. } => {
                ExError::new(ExErrorKind::StaleFeedback)
                    .with_decision_id(decision_id)
                    .with_task_id(task_id)
                    .with_op("submit_feedback")
                    .with_message(message)
            }

            MemoraError::InvalidWeights { .. } | MemoraError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(message)
            }

            MemoraError::InsufficientCalibrationSamples { .. } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("recalibrate")
                    .with_message(message)
            }

            MemoraError::InvalidInput { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }

            MemoraError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            MemoraError::Internal { .. } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for MemoraError {
    fn from(err: serde_json::Error) -> Self {
        MemoraError::Serialization {
            message: err.to_string(),
        }
    }
}
