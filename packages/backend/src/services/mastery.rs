use async_trait::async_trait;
use chrono::Utc;
use pathway_algo::mastery::{self, Evidence};
use pathway_algo::MasteryRecord;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MasteryError {
    #[error("concept not found: {0}")]
    UnknownConcept(String),
    #[error("invalid evidence: {0}")]
    Invalid(String),
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Persistence for per-(user, concept) mastery beliefs.
#[async_trait]
pub trait MasteryStore: Send + Sync {
    /// All records for the user, or only the one for `concept_id`.
    async fn get_mastery(
        &self,
        user_id: &str,
        concept_id: Option<&str>,
    ) -> Result<Vec<MasteryRecord>, MasteryError>;

    /// Fold new evidence into the stored record and persist the result.
    async fn upsert_mastery(
        &self,
        user_id: &str,
        concept_id: &str,
        score: f64,
        confidence: f64,
    ) -> Result<MasteryRecord, MasteryError>;
}

#[derive(Clone)]
pub struct SqliteMasteryStore {
    pool: SqlitePool,
}

impl SqliteMasteryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MasteryStore for SqliteMasteryStore {
    async fn get_mastery(
        &self,
        user_id: &str,
        concept_id: Option<&str>,
    ) -> Result<Vec<MasteryRecord>, MasteryError> {
        let rows = match concept_id {
            Some(concept_id) => {
                sqlx::query(
                    "SELECT user_id, concept_id, mastery_level, confidence, last_assessed_at FROM concept_mastery WHERE user_id = ? AND concept_id = ?",
                )
                .bind(user_id)
                .bind(concept_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT user_id, concept_id, mastery_level, confidence, last_assessed_at FROM concept_mastery WHERE user_id = ? ORDER BY concept_id",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(map_record).collect()
    }

    async fn upsert_mastery(
        &self,
        user_id: &str,
        concept_id: &str,
        score: f64,
        confidence: f64,
    ) -> Result<MasteryRecord, MasteryError> {
        if !score.is_finite() || !confidence.is_finite() {
            return Err(MasteryError::Invalid(
                "score and confidence must be finite numbers".into(),
            ));
        }

        let evidence = Evidence::new(user_id, concept_id, score, confidence).at(Utc::now());
        let cold_start = mastery::update(None, &evidence);

        let mut tx = self.pool.begin().await?;

        // The first statement writes, so the transaction holds the write lock
        // before the prior row is read and no concurrent update can slip in.
        let inserted = sqlx::query(
            r#"INSERT INTO concept_mastery (id, user_id, concept_id, mastery_level, confidence, last_assessed_at)
               SELECT ?, ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM concepts WHERE id = ?)
               ON CONFLICT (user_id, concept_id) DO NOTHING"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&cold_start.user_id)
        .bind(&cold_start.concept_id)
        .bind(cold_start.mastery_level)
        .bind(cold_start.confidence)
        .bind(cold_start.last_assessed_at)
        .bind(concept_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let record = if inserted > 0 {
            cold_start
        } else {
            let prior = sqlx::query(
                "SELECT user_id, concept_id, mastery_level, confidence, last_assessed_at FROM concept_mastery WHERE user_id = ? AND concept_id = ?",
            )
            .bind(user_id)
            .bind(concept_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| map_record(&row))
            .transpose()?;

            // nothing inserted and nothing stored means the concept is unknown
            let Some(prior) = prior else {
                return Err(MasteryError::UnknownConcept(concept_id.to_string()));
            };

            let record = mastery::update(Some(prior), &evidence);
            sqlx::query(
                "UPDATE concept_mastery SET mastery_level = ?, confidence = ?, last_assessed_at = ? WHERE user_id = ? AND concept_id = ?",
            )
            .bind(record.mastery_level)
            .bind(record.confidence)
            .bind(record.last_assessed_at)
            .bind(&record.user_id)
            .bind(&record.concept_id)
            .execute(&mut *tx)
            .await?;
            record
        };

        tx.commit().await?;

        tracing::debug!(
            user_id,
            concept_id,
            mastery_level = record.mastery_level,
            confidence = record.confidence,
            "mastery updated"
        );
        Ok(record)
    }
}

fn map_record(row: &sqlx::sqlite::SqliteRow) -> Result<MasteryRecord, MasteryError> {
    Ok(MasteryRecord {
        user_id: row.try_get("user_id")?,
        concept_id: row.try_get("concept_id")?,
        mastery_level: row.try_get("mastery_level")?,
        confidence: row.try_get("confidence")?,
        last_assessed_at: row.try_get("last_assessed_at")?,
    })
}
