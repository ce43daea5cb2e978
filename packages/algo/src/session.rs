//! Session Packer
//!
//! Splits an ordered concept sequence into bounded sessions, attaches
//! learn/assess activities, and schedules spaced-repetition reviews into
//! later sessions.

use std::collections::HashMap;

use uuid::Uuid;

use crate::context::PlanningContext;
use crate::types::{
    Activity, ActivityType, PathParams, Session, SessionConcept, MAX_REVIEWS_PER_SESSION,
    REVIEW_MASTERY_THRESHOLD, SESSION_MINUTES_PER_CONCEPT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingOptions {
    pub max_concepts_per_session: usize,
    pub include_assessments: bool,
    pub spaced_repetition: bool,
}

impl From<&PathParams> for PackingOptions {
    fn from(params: &PathParams) -> Self {
        Self {
            max_concepts_per_session: params.max_concepts_per_session,
            include_assessments: params.include_assessments,
            spaced_repetition: params.spaced_repetition,
        }
    }
}

impl Default for PackingOptions {
    fn default() -> Self {
        Self::from(&PathParams::default())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn activity(kind: ActivityType, concept_id: &str, ctx: &PlanningContext) -> Activity {
    Activity {
        activity_id: new_id(),
        activity_type: kind,
        concept_id: concept_id.to_string(),
        difficulty: ctx.difficulty(concept_id),
        duration_minutes: kind.duration_minutes(),
    }
}

/// Pack `sequence` into sessions of at most `max_concepts_per_session`
/// (values below 1 are treated as 1).
pub fn pack_sessions(
    sequence: &[String],
    ctx: &PlanningContext,
    options: PackingOptions,
) -> Vec<Session> {
    let chunk_size = options.max_concepts_per_session.max(1);

    let mut sessions: Vec<Session> = sequence
        .chunks(chunk_size)
        .map(|chunk| build_session(chunk, ctx, options.include_assessments))
        .collect();

    if options.spaced_repetition && sessions.len() > 1 {
        schedule_reviews(&mut sessions, ctx);
    }

    sessions
}

fn build_session(chunk: &[String], ctx: &PlanningContext, include_assessments: bool) -> Session {
    let concepts = chunk
        .iter()
        .map(|id| SessionConcept {
            concept_id: id.clone(),
            name: ctx.name(id),
            difficulty: ctx.difficulty(id),
            current_mastery: ctx.mastery(id),
        })
        .collect();

    let mut activities = Vec::with_capacity(chunk.len() * 2);
    for id in chunk {
        activities.push(activity(ActivityType::Learn, id, ctx));
        if include_assessments {
            activities.push(activity(ActivityType::Assess, id, ctx));
        }
    }

    Session {
        session_id: new_id(),
        concepts,
        estimated_duration_minutes: SESSION_MINUTES_PER_CONCEPT * chunk.len() as u32,
        activities,
    }
}

/// Review candidates for session `index`: every concept of the previous
/// session, then weakly mastered concepts from older sessions, capped at
/// [`MAX_REVIEWS_PER_SESSION`]. A concept that is still learned in this or a
/// later session is not reviewed here.
pub fn review_candidates(sessions: &[Session], index: usize, ctx: &PlanningContext) -> Vec<String> {
    if index == 0 || index >= sessions.len() {
        return Vec::new();
    }

    let mut last_learned: HashMap<&str, usize> = HashMap::new();
    for (i, session) in sessions.iter().enumerate() {
        for id in session.concept_ids() {
            last_learned.insert(id, i);
        }
    }
    let learned_before = |id: &str| last_learned.get(id).is_some_and(|&i| i < index);

    let previous = sessions[index - 1].concept_ids();
    let older = sessions[..index - 1]
        .iter()
        .flat_map(|s| s.concept_ids())
        .filter(|id| ctx.mastery(id) < REVIEW_MASTERY_THRESHOLD);

    previous
        .chain(older)
        .filter(|id| learned_before(id))
        .take(MAX_REVIEWS_PER_SESSION)
        .map(str::to_string)
        .collect()
}

fn schedule_reviews(sessions: &mut [Session], ctx: &PlanningContext) {
    // Candidates depend only on concept lists, which reviews never change.
    let plan: Vec<Vec<String>> = {
        let view: &[Session] = sessions;
        (0..view.len()).map(|i| review_candidates(view, i, ctx)).collect()
    };

    for (session, candidates) in sessions.iter_mut().zip(plan) {
        for id in candidates {
            session.activities.push(activity(ActivityType::Review, &id, ctx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConceptInfo;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn reviews(session: &Session) -> Vec<&str> {
        session
            .activities_of(ActivityType::Review)
            .map(|a| a.concept_id.as_str())
            .collect()
    }

    #[test]
    fn test_chunks_and_durations() {
        let ctx = PlanningContext::default();
        let sessions = pack_sessions(
            &ids(&["a", "b", "c", "d", "e"]),
            &ctx,
            PackingOptions { max_concepts_per_session: 2, ..PackingOptions::default() },
        );

        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].estimated_duration_minutes, 60);
        assert_eq!(sessions[2].estimated_duration_minutes, 30);
        assert_eq!(sessions[2].concepts.len(), 1);
    }

    #[test]
    fn test_learn_then_assess_per_concept() {
        let ctx = PlanningContext::default();
        let sessions = pack_sessions(&ids(&["a", "b"]), &ctx, PackingOptions::default());
        let kinds: Vec<(ActivityType, &str)> = sessions[0]
            .activities
            .iter()
            .map(|a| (a.activity_type, a.concept_id.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ActivityType::Learn, "a"),
                (ActivityType::Assess, "a"),
                (ActivityType::Learn, "b"),
                (ActivityType::Assess, "b"),
            ]
        );
        assert_eq!(sessions[0].activities[0].duration_minutes, 15);
        assert_eq!(sessions[0].activities[1].duration_minutes, 10);
    }

    #[test]
    fn test_assessments_can_be_disabled() {
        let ctx = PlanningContext::default();
        let options = PackingOptions { include_assessments: false, ..PackingOptions::default() };
        let sessions = pack_sessions(&ids(&["a", "b"]), &ctx, options);
        assert!(sessions[0].activities_of(ActivityType::Assess).next().is_none());
        assert_eq!(sessions[0].estimated_duration_minutes, 60);
    }

    #[test]
    fn test_zero_session_size_is_treated_as_one() {
        let ctx = PlanningContext::default();
        let options = PackingOptions { max_concepts_per_session: 0, ..PackingOptions::default() };
        let sessions = pack_sessions(&ids(&["a", "b"]), &ctx, options);
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_reviews_previous_session_unconditionally() {
        let mut ctx = PlanningContext::from_concepts(vec![
            ConceptInfo::new("a", "A", 0.3),
            ConceptInfo::new("b", "B", 0.3),
        ]);
        ctx.set_mastery("a", 0.95);
        ctx.set_mastery("b", 0.95);

        let options = PackingOptions { max_concepts_per_session: 2, ..PackingOptions::default() };
        let sessions = pack_sessions(&ids(&["a", "b", "c", "d", "e", "f"]), &ctx, options);

        assert!(reviews(&sessions[0]).is_empty());
        assert_eq!(reviews(&sessions[1]), vec!["a", "b"]);
        assert_eq!(reviews(&sessions[2]), vec!["c", "d"]);
        let last = sessions[1].activities.last().unwrap();
        assert_eq!(last.activity_type, ActivityType::Review);
        assert_eq!(last.duration_minutes, 5);
    }

    #[test]
    fn test_older_mastered_concepts_are_skipped() {
        let mut ctx = PlanningContext::default();
        ctx.set_mastery("a", 0.8);
        let options = PackingOptions { max_concepts_per_session: 1, ..PackingOptions::default() };
        let sessions = pack_sessions(&ids(&["a", "b", "c"]), &ctx, options);
        assert_eq!(reviews(&sessions[1]), vec!["a"]);
        assert_eq!(reviews(&sessions[2]), vec!["b"]);
    }

    #[test]
    fn test_older_weak_concepts_fill_remaining_slots() {
        let ctx = PlanningContext::default();
        let options = PackingOptions { max_concepts_per_session: 1, ..PackingOptions::default() };
        let sessions = pack_sessions(&ids(&["a", "b", "c"]), &ctx, options);
        assert_eq!(reviews(&sessions[2]), vec!["b", "a"]);
    }

    #[test]
    fn test_no_reviews_when_disabled_or_single_session() {
        let ctx = PlanningContext::default();
        let disabled = PackingOptions {
            max_concepts_per_session: 1,
            spaced_repetition: false,
            ..PackingOptions::default()
        };
        let sessions = pack_sessions(&ids(&["a", "b"]), &ctx, disabled);
        assert!(sessions.iter().all(|s| reviews(s).is_empty()));

        let single = pack_sessions(&ids(&["a", "b"]), &ctx, PackingOptions::default());
        assert_eq!(single.len(), 1);
        assert!(reviews(&single[0]).is_empty());
    }

    #[test]
    fn test_estimate_ignores_review_time() {
        let ctx = PlanningContext::default();
        let options = PackingOptions { max_concepts_per_session: 1, ..PackingOptions::default() };
        let sessions = pack_sessions(&ids(&["a", "b"]), &ctx, options);
        assert_eq!(reviews(&sessions[1]).len(), 1);
        assert_eq!(sessions[1].estimated_duration_minutes, 30);
    }
}
