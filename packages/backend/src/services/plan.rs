use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use pathway_algo::{
    optimize_learning_path, validate_concept_ids, ConceptInfo, LearningPlan, PathParams, PlanError,
    PlanningContext,
};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::services::concept::{ConceptStore, SqliteConceptStore};
use crate::services::mastery::{MasteryStore, SqliteMasteryStore};

pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Error)]
pub enum PlanServiceError {
    #[error(transparent)]
    InvalidRequest(#[from] PlanError),
    #[error("user id must not be empty")]
    MissingUser,
    #[error("plan not found: {0}")]
    NotFound(String),
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("stored plan is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlan {
    pub status: String,
    pub plan: LearningPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub plan_id: String,
    pub status: String,
    pub total_concepts: i64,
    pub total_sessions: i64,
    pub estimated_total_duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

pub struct PlanService {
    pool: SqlitePool,
    concepts: Arc<dyn ConceptStore>,
    mastery: Arc<dyn MasteryStore>,
}

impl PlanService {
    pub fn new(
        pool: SqlitePool,
        concepts: Arc<dyn ConceptStore>,
        mastery: Arc<dyn MasteryStore>,
    ) -> Self {
        Self { pool, concepts, mastery }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::new(
            pool.clone(),
            Arc::new(SqliteConceptStore::new(pool.clone())),
            Arc::new(SqliteMasteryStore::new(pool)),
        )
    }

    /// Plan `concept_ids` for `user_id` and persist the result.
    ///
    /// Lookup failures degrade to defaults and a failed write is only logged,
    /// so a valid request always yields a plan.
    pub async fn optimize(
        &self,
        user_id: &str,
        concept_ids: &[String],
        params: &PathParams,
    ) -> Result<LearningPlan, PlanServiceError> {
        if user_id.trim().is_empty() {
            return Err(PlanServiceError::MissingUser);
        }
        params.validate()?;
        validate_concept_ids(concept_ids)?;

        let ctx = self.planning_context(user_id, concept_ids).await;
        let plan = optimize_learning_path(user_id, concept_ids, &ctx, params);

        if let Err(err) = self.save(&plan).await {
            tracing::warn!(error = %err, plan_id = %plan.plan_id, "failed to persist learning plan");
        }

        tracing::info!(
            plan_id = %plan.plan_id,
            user_id,
            concepts = plan.metadata.total_concepts,
            sessions = plan.metadata.total_sessions,
            curve = %plan.metadata.target_difficulty_curve,
            "learning path optimized"
        );
        Ok(plan)
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<StoredPlan, PlanServiceError> {
        let row = sqlx::query("SELECT status, plan FROM learning_plans WHERE id = ?")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PlanServiceError::NotFound(plan_id.to_string()))?;

        let raw: String = row.try_get("plan")?;
        Ok(StoredPlan {
            status: row.try_get("status")?,
            plan: serde_json::from_str(&raw)?,
        })
    }

    pub async fn list_plans(&self, user_id: &str) -> Result<Vec<PlanSummary>, PlanServiceError> {
        let rows = sqlx::query(
            r#"SELECT id, status, total_concepts, total_sessions, estimated_total_duration_minutes, created_at
               FROM learning_plans WHERE user_id = ? ORDER BY created_at DESC, id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PlanSummary {
                    plan_id: row.try_get("id")?,
                    status: row.try_get("status")?,
                    total_concepts: row.try_get("total_concepts")?,
                    total_sessions: row.try_get("total_sessions")?,
                    estimated_total_duration_minutes: row.try_get("estimated_total_duration_minutes")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn planning_context(&self, user_id: &str, concept_ids: &[String]) -> PlanningContext {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = concept_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let loaded = join_all(unique.iter().map(|id| self.load_concept(id))).await;
        let mut ctx = PlanningContext::from_concepts(loaded.into_iter().flatten());

        match self.mastery.get_mastery(user_id, None).await {
            Ok(records) => ctx = ctx.with_mastery_records(&records),
            Err(err) => {
                tracing::warn!(error = %err, user_id, "mastery lookup failed, planning from zero mastery");
            }
        }
        ctx
    }

    async fn load_concept(&self, concept_id: &str) -> Option<ConceptInfo> {
        let mut info = match self.concepts.get_concept(concept_id).await {
            Ok(Some(info)) => info,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, concept_id, "concept lookup failed, using defaults");
                return None;
            }
        };

        info.prerequisite_ids = match self.concepts.get_prerequisites(concept_id).await {
            Ok(prerequisites) => prerequisites,
            Err(err) => {
                tracing::warn!(error = %err, concept_id, "prerequisite lookup failed, treating as none");
                Vec::new()
            }
        };
        Some(info)
    }

    async fn save(&self, plan: &LearningPlan) -> Result<(), PlanServiceError> {
        let document = serde_json::to_string(plan)?;
        sqlx::query(
            r#"INSERT INTO learning_plans (id, user_id, status, plan, total_concepts, total_sessions, estimated_total_duration_minutes, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&plan.plan_id)
        .bind(&plan.user_id)
        .bind(STATUS_ACTIVE)
        .bind(document)
        .bind(plan.metadata.total_concepts as i64)
        .bind(plan.metadata.total_sessions as i64)
        .bind(i64::from(plan.metadata.estimated_total_duration_minutes))
        .bind(plan.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pathway_algo::{ActivityType, DifficultyCurve, MasteryRecord};

    use super::*;
    use crate::services::concept::{ConceptError, NewConcept};
    use crate::services::mastery::MasteryError;

    struct FailingConcepts;

    #[async_trait]
    impl ConceptStore for FailingConcepts {
        async fn get_concept(&self, _: &str) -> Result<Option<ConceptInfo>, ConceptError> {
            Err(ConceptError::Sql(sqlx::Error::PoolTimedOut))
        }

        async fn get_prerequisites(&self, _: &str) -> Result<Vec<String>, ConceptError> {
            Err(ConceptError::Sql(sqlx::Error::PoolTimedOut))
        }
    }

    struct FailingMastery;

    #[async_trait]
    impl MasteryStore for FailingMastery {
        async fn get_mastery(&self, _: &str, _: Option<&str>) -> Result<Vec<MasteryRecord>, MasteryError> {
            Err(MasteryError::Sql(sqlx::Error::PoolTimedOut))
        }

        async fn upsert_mastery(&self, _: &str, _: &str, _: f64, _: f64) -> Result<MasteryRecord, MasteryError> {
            Err(MasteryError::Sql(sqlx::Error::PoolTimedOut))
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded_pool() -> SqlitePool {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        let store = SqliteConceptStore::new(pool.clone());
        for (id, difficulty, prereqs) in [
            ("C1", 0.2, vec![]),
            ("C2", 0.5, vec![]),
            ("C3", 0.8, vec![]),
            ("C4", 0.3, vec![]),
            ("B", 0.2, vec!["A"]),
        ] {
            if id == "B" {
                store
                    .create_concept(NewConcept {
                        id: Some("A".into()),
                        name: "Concept A".into(),
                        domain: None,
                        description: None,
                        difficulty: Some(0.9),
                        prerequisite_ids: vec![],
                    })
                    .await
                    .unwrap();
            }
            store
                .create_concept(NewConcept {
                    id: Some(id.into()),
                    name: format!("Concept {id}"),
                    domain: None,
                    description: None,
                    difficulty: Some(difficulty),
                    prerequisite_ids: prereqs.into_iter().map(String::from).collect(),
                })
                .await
                .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_gradual_plan_is_persisted() {
        let pool = seeded_pool().await;
        let service = PlanService::sqlite(pool);
        let params = PathParams { max_concepts_per_session: 2, ..PathParams::default() };

        let plan = service
            .optimize("u1", &ids(&["C1", "C2", "C3", "C4"]), &params)
            .await
            .unwrap();
        assert_eq!(plan.ordered_concepts(), vec!["C1", "C4", "C2", "C3"]);
        assert_eq!(plan.sessions.len(), 2);

        let stored = service.get_plan(&plan.plan_id).await.unwrap();
        assert_eq!(stored.status, STATUS_ACTIVE);
        assert_eq!(stored.plan, plan);

        let summaries = service.list_plans("u1").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_sessions, 2);
        assert!(service.list_plans("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_challenging_plan_respects_stored_prerequisites() {
        let pool = seeded_pool().await;
        let service = PlanService::sqlite(pool);
        let params = PathParams {
            target_difficulty_curve: DifficultyCurve::Challenging,
            ..PathParams::default()
        };

        let plan = service.optimize("u1", &ids(&["B", "A"]), &params).await.unwrap();
        assert_eq!(plan.ordered_concepts(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_mastery_shapes_reviews() {
        let pool = seeded_pool().await;
        let mastery = SqliteMasteryStore::new(pool.clone());
        mastery.upsert_mastery("u1", "C1", 0.9, 0.9).await.unwrap();
        let service = PlanService::sqlite(pool);
        let params = PathParams { max_concepts_per_session: 1, ..PathParams::default() };

        let plan = service.optimize("u1", &ids(&["C1", "C2"]), &params).await.unwrap();
        let session = &plan.sessions[0];
        assert_eq!(session.concepts[0].current_mastery, 0.9);
        // the first learned concept is the one reviewed in session 2
        let reviews: Vec<_> = plan.sessions[1].activities_of(ActivityType::Review).collect();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].concept_id, plan.sessions[0].concepts[0].concept_id);
    }

    #[tokio::test]
    async fn test_store_failures_degrade_to_defaults() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        let service = PlanService::new(pool, Arc::new(FailingConcepts), Arc::new(FailingMastery));

        let plan = service
            .optimize("u1", &ids(&["x", "y"]), &PathParams::default())
            .await
            .unwrap();
        assert_eq!(plan.metadata.total_concepts, 2);
        assert!(plan.sessions[0].concepts.iter().all(|c| c.difficulty == 0.5));
        assert!(plan.sessions[0].concepts.iter().all(|c| c.current_mastery == 0.0));
        assert_eq!(plan.sessions[0].concepts[0].name, "Concept x");
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        let service = PlanService::sqlite(pool);
        let zero = PathParams { max_concepts_per_session: 0, ..PathParams::default() };

        assert!(matches!(
            service.optimize("u1", &ids(&["a"]), &zero).await,
            Err(PlanServiceError::InvalidRequest(PlanError::InvalidSessionSize { .. }))
        ));
        assert!(matches!(
            service.optimize("u1", &ids(&["a", " "]), &PathParams::default()).await,
            Err(PlanServiceError::InvalidRequest(PlanError::EmptyConceptId(1)))
        ));
        assert!(matches!(
            service.optimize("", &ids(&["a"]), &PathParams::default()).await,
            Err(PlanServiceError::MissingUser)
        ));
        assert!(matches!(
            service.get_plan("nope").await,
            Err(PlanServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_request_yields_empty_plan() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        let service = PlanService::sqlite(pool);
        let plan = service.optimize("u1", &[], &PathParams::default()).await.unwrap();
        assert!(plan.sessions.is_empty());
        assert_eq!(plan.metadata.estimated_total_duration_minutes, 0);
    }
}
