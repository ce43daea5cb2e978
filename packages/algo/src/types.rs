//! Common Types and Constants
//!
//! Shared data structures used across the planning modules: concept snapshots,
//! mastery records, plan parameters and the learning-plan document itself.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Difficulty assumed for a concept the content store could not supply
pub const DEFAULT_DIFFICULTY: f64 = 0.5;

/// Mastery assumed for a concept the learner has never been assessed on
pub const DEFAULT_MASTERY: f64 = 0.0;

/// Default number of concepts packed into one session
pub const DEFAULT_MAX_CONCEPTS_PER_SESSION: usize = 3;

/// Upper bound accepted from callers for concepts per session
pub const MAX_CONCEPTS_PER_SESSION_LIMIT: usize = 50;

/// Fixed planning budget per concept, independent of activity durations
pub const SESSION_MINUTES_PER_CONCEPT: u32 = 30;

pub const LEARN_DURATION_MINUTES: u32 = 15;
pub const ASSESS_DURATION_MINUTES: u32 = 10;
pub const REVIEW_DURATION_MINUTES: u32 = 5;

/// Concepts from older sessions are only reviewed below this mastery
pub const REVIEW_MASTERY_THRESHOLD: f64 = 0.6;

/// Maximum review activities appended to one session
pub const MAX_REVIEWS_PER_SESSION: usize = 2;

/// Effective-difficulty band boundaries used by the adaptive curve
pub const LOW_BAND_UPPER: f64 = 0.3;
pub const MEDIUM_BAND_UPPER: f64 = 0.7;

// ==================== Concept Snapshot ====================

/// Read-only view of a concept as loaded from the content store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConceptInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: String,
    /// Raw difficulty in [0, 1]
    pub difficulty: f64,
    #[serde(default)]
    pub prerequisite_ids: Vec<String>,
}

impl ConceptInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, difficulty: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: String::new(),
            difficulty,
            prerequisite_ids: Vec::new(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisite_ids = prerequisites.into_iter().map(Into::into).collect();
        self
    }
}

// ==================== Mastery ====================

/// Belief state for one (user, concept) pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub user_id: String,
    pub concept_id: String,
    /// Estimated competence in [0, 1]
    pub mastery_level: f64,
    /// Confidence in the estimate, in [0, 1]
    pub confidence: f64,
    pub last_assessed_at: DateTime<Utc>,
}

/// Current mastery levels keyed by concept id
pub type MasterySnapshot = HashMap<String, f64>;

// ==================== Plan Parameters ====================

/// Difficulty pacing applied on top of the prerequisite order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DifficultyCurve {
    /// Easiest (by effective difficulty) first
    #[default]
    Gradual,
    /// Prerequisite levels, hardest first within a level
    Challenging,
    /// Low, medium, then high effective-difficulty bands
    Adaptive,
}

impl DifficultyCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gradual => "gradual",
            Self::Challenging => "challenging",
            Self::Adaptive => "adaptive",
        }
    }

    /// Unrecognised names fall back to [`DifficultyCurve::Gradual`].
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "challenging" => Self::Challenging,
            "adaptive" => Self::Adaptive,
            _ => Self::Gradual,
        }
    }
}

impl From<String> for DifficultyCurve {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl std::fmt::Display for DifficultyCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-tunable knobs for one planning run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    pub target_difficulty_curve: DifficultyCurve,
    pub max_concepts_per_session: usize,
    pub spaced_repetition: bool,
    pub include_assessments: bool,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            target_difficulty_curve: DifficultyCurve::Gradual,
            max_concepts_per_session: DEFAULT_MAX_CONCEPTS_PER_SESSION,
            spaced_repetition: true,
            include_assessments: true,
        }
    }
}

// ==================== Plan Document ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Learn,
    Assess,
    Review,
}

impl ActivityType {
    pub fn duration_minutes(&self) -> u32 {
        match self {
            Self::Learn => LEARN_DURATION_MINUTES,
            Self::Assess => ASSESS_DURATION_MINUTES,
            Self::Review => REVIEW_DURATION_MINUTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub concept_id: String,
    pub difficulty: f64,
    pub duration_minutes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConcept {
    pub concept_id: String,
    pub name: String,
    pub difficulty: f64,
    pub current_mastery: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub concepts: Vec<SessionConcept>,
    pub estimated_duration_minutes: u32,
    pub activities: Vec<Activity>,
}

impl Session {
    pub fn concept_ids(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().map(|c| c.concept_id.as_str())
    }

    pub fn activities_of(&self, kind: ActivityType) -> impl Iterator<Item = &Activity> {
        self.activities.iter().filter(move |a| a.activity_type == kind)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub target_difficulty_curve: DifficultyCurve,
    pub spaced_repetition: bool,
    pub total_concepts: usize,
    pub total_sessions: usize,
    /// Sum of session estimates; review time is not re-aggregated here
    pub estimated_total_duration_minutes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningPlan {
    pub plan_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub concept_ids: Vec<String>,
    pub sessions: Vec<Session>,
    pub metadata: PlanMetadata,
}

impl LearningPlan {
    /// Index of the session whose concept list holds `concept_id`
    pub fn session_index_of(&self, concept_id: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|s| s.concept_ids().any(|id| id == concept_id))
    }

    /// Concept ids in planned order, flattened across sessions
    pub fn ordered_concepts(&self) -> Vec<&str> {
        self.sessions.iter().flat_map(|s| s.concept_ids()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_parse_is_lenient() {
        assert_eq!(DifficultyCurve::parse_lenient("challenging"), DifficultyCurve::Challenging);
        assert_eq!(DifficultyCurve::parse_lenient(" Adaptive "), DifficultyCurve::Adaptive);
        assert_eq!(DifficultyCurve::parse_lenient("zigzag"), DifficultyCurve::Gradual);
    }

    #[test]
    fn test_path_params_defaults_fill_missing_fields() {
        let params: PathParams =
            serde_json::from_str(r#"{"target_difficulty_curve":"nonsense"}"#).unwrap();
        assert_eq!(params.target_difficulty_curve, DifficultyCurve::Gradual);
        assert_eq!(params.max_concepts_per_session, 3);
        assert!(params.spaced_repetition);
        assert!(params.include_assessments);
    }

    #[test]
    fn test_activity_type_serializes_lowercase() {
        let json = serde_json::to_string(&ActivityType::Review).unwrap();
        assert_eq!(json, "\"review\"");
        assert_eq!(ActivityType::Learn.duration_minutes(), 15);
        assert_eq!(ActivityType::Assess.duration_minutes(), 10);
    }
}
