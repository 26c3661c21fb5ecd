pub mod batch;
pub mod calibration;
pub mod confidence;
pub mod decision;
pub mod evidence;
pub mod inference;
pub mod ingestion;
pub mod relationship;
pub mod task;

pub use batch::{BatchStatus, EvidenceBatch};
pub use calibration::{CalibrationEvent, ValidationOutcome, ValidationSample};
pub use confidence::{ConfidenceScore, Factor, FactorSet, FactorWeights, WeightsConfig};
pub use decision::{DecisionEntity, DecisionStatus, EvidenceBucket, EvidenceBuckets, Scope};
pub use evidence::{EvidenceItem, Platform, SourceType};
pub use inference::{FactorHints, ProviderResult};
pub use ingestion::{EventType, IngestionEvent, ReviewState};
pub use relationship::{DecisionRelationship, RelationshipType};
pub use task::{
    ResolutionOutcome, ReviewerFeedback, TaskKind, TaskPriority, TaskResolution, TaskStatus,
    ValidationTask, Verdict,
};
