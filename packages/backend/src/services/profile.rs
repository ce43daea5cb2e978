//! Learner profiles.
//!
//! A profile carries learning-style weights, cognitive traits and free-form
//! preferences. Feedback generation reads the learning style together with
//! `preferences.feedbackPreferences.preferredStyle` and
//! `preferences.motivationProfile` (snake_case keys are accepted too).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::services::feedback::LearnerContext;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile not found for user {0}")]
    NotFound(String),
    #[error("profile already exists for user {0}")]
    AlreadyExists(String),
    #[error("invalid profile: {0}")]
    Invalid(String),
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningProfile {
    pub id: String,
    pub user_id: String,
    pub learning_style: BTreeMap<String, f64>,
    pub cognitive_profile: Map<String, Value>,
    pub preferences: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearningProfile {
    pub fn learner_context(&self) -> LearnerContext {
        let preferred_style = field(&self.preferences, "feedbackPreferences", "feedback_preferences")
            .and_then(Value::as_object)
            .and_then(|prefs| field(prefs, "preferredStyle", "preferred_style"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|style| !style.is_empty())
            .map(str::to_string);

        let motivation_profile =
            field(&self.preferences, "motivationProfile", "motivation_profile")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

        LearnerContext {
            learning_style: self.learning_style.clone(),
            motivation_profile,
            preferred_style,
        }
    }
}

/// Fields supplied on create or update. On update, absent fields are kept
/// and present ones are merged key by key into the stored maps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[serde(default)]
    pub learning_style: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub cognitive_profile: Option<Map<String, Value>>,
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
}

#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_profile(
        &self,
        user_id: &str,
        input: ProfileInput,
    ) -> Result<LearningProfile, ProfileError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ProfileError::Invalid("userId must not be empty".into()));
        }

        let now = Utc::now();
        let profile = LearningProfile {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            learning_style: input.learning_style.unwrap_or_default(),
            cognitive_profile: input.cognitive_profile.unwrap_or_default(),
            preferences: input.preferences.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            r#"INSERT INTO learning_profiles (id, user_id, learning_style, cognitive_profile, preferences, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (user_id) DO NOTHING"#,
        )
        .bind(&profile.id)
        .bind(&profile.user_id)
        .bind(serde_json::to_string(&profile.learning_style)?)
        .bind(serde_json::to_string(&profile.cognitive_profile)?)
        .bind(serde_json::to_string(&profile.preferences)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(ProfileError::AlreadyExists(user_id.to_string()));
        }

        tracing::info!(user_id, "learning profile created");
        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<LearningProfile>, ProfileError> {
        let row = sqlx::query(
            "SELECT id, user_id, learning_style, cognitive_profile, preferences, created_at, updated_at FROM learning_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_profile(&row)).transpose()
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        input: ProfileInput,
    ) -> Result<LearningProfile, ProfileError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Touching the row first takes the write lock before the merge reads it.
        let touched = sqlx::query("UPDATE learning_profiles SET updated_at = ? WHERE user_id = ?")
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Err(ProfileError::NotFound(user_id.to_string()));
        }

        let row = sqlx::query(
            "SELECT id, user_id, learning_style, cognitive_profile, preferences, created_at, updated_at FROM learning_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let mut profile = map_profile(&row)?;

        if let Some(learning_style) = input.learning_style {
            profile.learning_style.extend(learning_style);
        }
        if let Some(cognitive_profile) = input.cognitive_profile {
            profile.cognitive_profile.extend(cognitive_profile);
        }
        if let Some(preferences) = input.preferences {
            profile.preferences.extend(preferences);
        }

        sqlx::query(
            "UPDATE learning_profiles SET learning_style = ?, cognitive_profile = ?, preferences = ? WHERE user_id = ?",
        )
        .bind(serde_json::to_string(&profile.learning_style)?)
        .bind(serde_json::to_string(&profile.cognitive_profile)?)
        .bind(serde_json::to_string(&profile.preferences)?)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(user_id, "learning profile updated");
        Ok(profile)
    }
}

fn field<'a>(map: &'a Map<String, Value>, camel: &str, snake: &str) -> Option<&'a Value> {
    map.get(camel).or_else(|| map.get(snake))
}

fn map_profile(row: &sqlx::sqlite::SqliteRow) -> Result<LearningProfile, ProfileError> {
    let learning_style: String = row.try_get("learning_style")?;
    let cognitive_profile: String = row.try_get("cognitive_profile")?;
    let preferences: String = row.try_get("preferences")?;

    Ok(LearningProfile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        learning_style: serde_json::from_str(&learning_style)?,
        cognitive_profile: serde_json::from_str(&cognitive_profile)?,
        preferences: serde_json::from_str(&preferences)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
