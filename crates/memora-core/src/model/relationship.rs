//! Typed, directed relationship edges between decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::MemoraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    DependsOn,
    DependedOnBy,
    ConflictsWith,
    Extends,
    ExtendedBy,
    Reverts,
    RevertedBy,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 7] = [
        RelationshipType::DependsOn,
        RelationshipType::DependedOnBy,
        RelationshipType::ConflictsWith,
        RelationshipType::Extends,
        RelationshipType::ExtendedBy,
        RelationshipType::Reverts,
        RelationshipType::RevertedBy,
    ];

    /// Type of the edge stored in the opposite direction
    pub fn inverse(&self) -> RelationshipType {
        match self {
            RelationshipType::DependsOn => RelationshipType::DependedOnBy,
            RelationshipType::DependedOnBy => RelationshipType::DependsOn,
            RelationshipType::ConflictsWith => RelationshipType::ConflictsWith,
            RelationshipType::Extends => RelationshipType::ExtendedBy,
            RelationshipType::ExtendedBy => RelationshipType::Extends,
            RelationshipType::Reverts => RelationshipType::RevertedBy,
            RelationshipType::RevertedBy => RelationshipType::Reverts,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::DependsOn => "depends_on",
            RelationshipType::DependedOnBy => "depended_on_by",
            RelationshipType::ConflictsWith => "conflicts_with",
            RelationshipType::Extends => "extends",
            RelationshipType::ExtendedBy => "extended_by",
            RelationshipType::Reverts => "reverts",
            RelationshipType::RevertedBy => "reverted_by",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = MemoraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MemoraError::InvalidInput {
                reason: format!("unknown relationship type '{}'", s),
            })
    }
}

/// Directed edge. Always stored together with its inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRelationship {
    pub source_decision_id: String,
    pub target_decision_id: String,
    pub relationship_type: RelationshipType,
    /// In [0, 1]
    pub strength: f64,
    /// `source_id`s of the evidence items justifying the edge
    pub evidence: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DecisionRelationship {
    /// The mirror edge: endpoints swapped, inverse type, same strength and evidence
    pub fn inverse(&self) -> DecisionRelationship {
        DecisionRelationship {
            source_decision_id: self.target_decision_id.clone(),
            target_decision_id: self.source_decision_id.clone(),
            relationship_type: self.relationship_type.inverse(),
            strength: self.strength,
            evidence: self.evidence.clone(),
            created_at: self.created_at,
        }
    }

    pub fn key(&self) -> (String, String) {
        (
            self.source_decision_id.clone(),
            self.target_decision_id.clone(),
        )
    }

    /// True if `other` is exactly the mirror of this edge
    pub fn mirrors(&self, other: &DecisionRelationship) -> bool {
        self.source_decision_id == other.target_decision_id
            && self.target_decision_id == other.source_decision_id
            && self.relationship_type.inverse() == other.relationship_type
            && (self.strength - other.strength).abs() < f64::EPSILON
    }
}
