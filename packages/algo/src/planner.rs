//! Plan Assembler
//!
//! Orchestrates prerequisite ordering, difficulty pacing and session packing
//! into one [`LearningPlan`] document.

use chrono::Utc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::context::PlanningContext;
use crate::session::{pack_sessions, PackingOptions};
use crate::types::{LearningPlan, PathParams, PlanMetadata, MAX_CONCEPTS_PER_SESSION_LIMIT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("max_concepts_per_session must be between 1 and {max}, got {value}")]
    InvalidSessionSize { value: usize, max: usize },
    #[error("concept id at position {0} is empty")]
    EmptyConceptId(usize),
}

impl PathParams {
    /// Boundary validation for caller-supplied parameters. The planner itself
    /// tolerates any value.
    pub fn validate(&self) -> Result<(), PlanError> {
        let value = self.max_concepts_per_session;
        if value == 0 || value > MAX_CONCEPTS_PER_SESSION_LIMIT {
            return Err(PlanError::InvalidSessionSize {
                value,
                max: MAX_CONCEPTS_PER_SESSION_LIMIT,
            });
        }
        Ok(())
    }
}

pub fn validate_concept_ids(concept_ids: &[String]) -> Result<(), PlanError> {
    match concept_ids.iter().position(|id| id.trim().is_empty()) {
        Some(index) => Err(PlanError::EmptyConceptId(index)),
        None => Ok(()),
    }
}

/// Concept order the plan will follow, before session packing.
pub fn optimized_sequence(
    concept_ids: &[String],
    ctx: &PlanningContext,
    params: &PathParams,
) -> Vec<String> {
    let graph = ctx.dependency_graph(concept_ids);
    let base = graph.order_requested(concept_ids);
    params.target_difficulty_curve.apply(&base, ctx, &graph)
}

/// Build a learning plan for `user_id` over `concept_ids`.
///
/// Concepts missing from `ctx` are planned with default difficulty and an
/// unmastered level; an empty request yields a plan without sessions.
pub fn optimize_learning_path(
    user_id: &str,
    concept_ids: &[String],
    ctx: &PlanningContext,
    params: &PathParams,
) -> LearningPlan {
    let sequence = optimized_sequence(concept_ids, ctx, params);
    let sessions = pack_sessions(&sequence, ctx, PackingOptions::from(params));

    let metadata = PlanMetadata {
        target_difficulty_curve: params.target_difficulty_curve,
        spaced_repetition: params.spaced_repetition,
        total_concepts: concept_ids.len(),
        total_sessions: sessions.len(),
        estimated_total_duration_minutes: sessions
            .iter()
            .map(|s| s.estimated_duration_minutes)
            .sum(),
    };

    debug!(
        user_id,
        curve = %params.target_difficulty_curve,
        concepts = metadata.total_concepts,
        sessions = metadata.total_sessions,
        "learning path optimized"
    );

    LearningPlan {
        plan_id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        created_at: Utc::now(),
        concept_ids: concept_ids.to_vec(),
        sessions,
        metadata,
    }
}
