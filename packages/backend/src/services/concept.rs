use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pathway_algo::ConceptInfo;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConceptError {
    #[error("concept not found: {0}")]
    NotFound(String),
    #[error("concept already exists: {0}")]
    AlreadyExists(String),
    #[error("concept {0} cannot be its own prerequisite")]
    SelfPrerequisite(String),
    #[error("invalid concept: {0}")]
    Invalid(String),
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Read side of the concept catalogue used by the planner.
#[async_trait]
pub trait ConceptStore: Send + Sync {
    /// Catalogue entry without its prerequisite edges.
    async fn get_concept(&self, concept_id: &str) -> Result<Option<ConceptInfo>, ConceptError>;

    /// Direct prerequisites of `concept_id`; empty for unknown concepts.
    async fn get_prerequisites(&self, concept_id: &str) -> Result<Vec<String>, ConceptError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub difficulty: f64,
    pub prerequisite_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Concept {
    pub fn info(&self) -> ConceptInfo {
        ConceptInfo::new(self.id.clone(), self.name.clone(), self.difficulty)
            .with_domain(self.domain.clone())
            .with_prerequisites(self.prerequisite_ids.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConcept {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub prerequisite_ids: Vec<String>,
}

#[derive(Clone)]
pub struct SqliteConceptStore {
    pool: SqlitePool,
}

impl SqliteConceptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_concept(&self, input: NewConcept) -> Result<Concept, ConceptError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ConceptError::Invalid("name must not be empty".into()));
        }
        let difficulty = input.difficulty.unwrap_or(pathway_algo::DEFAULT_DIFFICULTY);
        if !difficulty.is_finite() || !(0.0..=1.0).contains(&difficulty) {
            return Err(ConceptError::Invalid(format!(
                "difficulty must be within [0, 1], got {difficulty}"
            )));
        }
        let id = match input.id.as_deref().map(str::trim) {
            Some("") => return Err(ConceptError::Invalid("id must not be empty".into())),
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let mut prerequisite_ids: Vec<String> = Vec::new();
        for prereq in input.prerequisite_ids {
            if prereq == id {
                return Err(ConceptError::SelfPrerequisite(id));
            }
            if !prerequisite_ids.contains(&prereq) {
                prerequisite_ids.push(prereq);
            }
        }

        let now = Utc::now();
        let domain = input.domain.unwrap_or_default();
        let mut tx = self.pool.begin().await?;

        // Inserting first keeps the existence check and the write under one lock.
        let inserted = sqlx::query(
            "INSERT INTO concepts (id, name, domain, description, difficulty, created_at) VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&id)
        .bind(&name)
        .bind(&domain)
        .bind(&input.description)
        .bind(difficulty)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Err(ConceptError::AlreadyExists(id));
        }

        for prereq in &prerequisite_ids {
            let known = sqlx::query("SELECT 1 FROM concepts WHERE id = ?")
                .bind(prereq)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            if !known {
                return Err(ConceptError::NotFound(prereq.clone()));
            }
            sqlx::query(
                "INSERT INTO concept_prerequisites (concept_id, prerequisite_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(&id)
            .bind(prereq)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(concept_id = %id, prerequisites = prerequisite_ids.len(), "concept created");

        Ok(Concept {
            id,
            name,
            domain,
            description: input.description,
            difficulty,
            prerequisite_ids,
            created_at: now,
        })
    }

    pub async fn find_concept(&self, concept_id: &str) -> Result<Option<Concept>, ConceptError> {
        let row = sqlx::query(
            "SELECT id, name, domain, description, difficulty, created_at FROM concepts WHERE id = ?",
        )
        .bind(concept_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut concept = map_concept(&row)?;
        concept.prerequisite_ids = self.get_prerequisites(concept_id).await?;
        Ok(Some(concept))
    }

    pub async fn list_concepts(&self, domain: Option<&str>) -> Result<Vec<Concept>, ConceptError> {
        let rows = match domain {
            Some(domain) => {
                sqlx::query(
                    "SELECT id, name, domain, description, difficulty, created_at FROM concepts WHERE domain = ? ORDER BY created_at, id",
                )
                .bind(domain)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, name, domain, description, difficulty, created_at FROM concepts ORDER BY created_at, id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let edges = sqlx::query(
            "SELECT concept_id, prerequisite_id FROM concept_prerequisites ORDER BY created_at, prerequisite_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut prerequisites: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &edges {
            prerequisites
                .entry(edge.try_get("concept_id")?)
                .or_default()
                .push(edge.try_get("prerequisite_id")?);
        }

        rows.iter()
            .map(|row| {
                let mut concept = map_concept(row)?;
                concept.prerequisite_ids = prerequisites.remove(&concept.id).unwrap_or_default();
                Ok(concept)
            })
            .collect()
    }

    /// Record that `concept_id` requires `prerequisite_id`. Adding an existing
    /// edge is a no-op.
    pub async fn add_prerequisite(
        &self,
        concept_id: &str,
        prerequisite_id: &str,
    ) -> Result<Concept, ConceptError> {
        if concept_id == prerequisite_id {
            return Err(ConceptError::SelfPrerequisite(concept_id.to_string()));
        }

        for id in [concept_id, prerequisite_id] {
            let known = sqlx::query("SELECT 1 FROM concepts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if !known {
                return Err(ConceptError::NotFound(id.to_string()));
            }
        }

        let result = sqlx::query(
            "INSERT INTO concept_prerequisites (concept_id, prerequisite_id, created_at) VALUES (?, ?, ?) ON CONFLICT (concept_id, prerequisite_id) DO NOTHING",
        )
        .bind(concept_id)
        .bind(prerequisite_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(concept_id, prerequisite_id, "prerequisite added");
        }

        self.find_concept(concept_id)
            .await?
            .ok_or_else(|| ConceptError::NotFound(concept_id.to_string()))
    }
}

#[async_trait]
impl ConceptStore for SqliteConceptStore {
    async fn get_concept(&self, concept_id: &str) -> Result<Option<ConceptInfo>, ConceptError> {
        let row = sqlx::query(
            "SELECT id, name, domain, description, difficulty, created_at FROM concepts WHERE id = ?",
        )
        .bind(concept_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_concept(&row).map(|concept| concept.info()))
            .transpose()
    }

    async fn get_prerequisites(&self, concept_id: &str) -> Result<Vec<String>, ConceptError> {
        let rows = sqlx::query(
            "SELECT prerequisite_id FROM concept_prerequisites WHERE concept_id = ? ORDER BY created_at, prerequisite_id",
        )
        .bind(concept_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("prerequisite_id").map_err(ConceptError::from))
            .collect()
    }
}

fn map_concept(row: &sqlx::sqlite::SqliteRow) -> Result<Concept, ConceptError> {
    Ok(Concept {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        domain: row.try_get("domain")?,
        description: row.try_get("description")?,
        difficulty: row.try_get("difficulty")?,
        prerequisite_ids: Vec::new(),
        created_at: row.try_get("created_at")?,
    })
}
