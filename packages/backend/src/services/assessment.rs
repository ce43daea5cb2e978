use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::services::mastery::{MasteryError, MasteryStore};

pub const DEFAULT_DIFFICULTY_LEVEL: f64 = 0.5;
pub const DEFAULT_ASSESSMENT_TYPE: &str = "adaptive";
pub const DEFAULT_MAX_QUESTIONS: usize = 5;
pub const MAX_QUESTIONS_LIMIT: usize = 50;
/// Confidence attached to mastery evidence from a direct assessment
pub const ASSESSMENT_CONFIDENCE: f64 = 0.8;
/// Concept scores at or above this count as strengths
pub const STRENGTH_THRESHOLD: f64 = 0.7;

const QUESTION_TYPE: &str = "multiple_choice";
const CORRECT_OPTION: &str = "a";
const OVERALL_FEEDBACK: &str = "Good work! Keep practising to strengthen your understanding.";

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("assessment not found: {0}")]
    NotFound(String),
    #[error("assessment {assessment_id} does not belong to user {user_id}")]
    NotOwner { assessment_id: String, user_id: String },
    #[error("assessment already submitted: {0}")]
    AlreadyCompleted(String),
    #[error("invalid assessment: {0}")]
    Invalid(String),
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_difficulty_level() -> f64 {
    DEFAULT_DIFFICULTY_LEVEL
}

fn default_assessment_type() -> String {
    DEFAULT_ASSESSMENT_TYPE.to_string()
}

fn default_max_questions() -> usize {
    DEFAULT_MAX_QUESTIONS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssessmentRequest {
    pub user_id: String,
    pub concept_ids: Vec<String>,
    #[serde(default = "default_difficulty_level")]
    pub difficulty_level: f64,
    #[serde(default = "default_assessment_type")]
    pub assessment_type: String,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionContent {
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub correct_answer: String,
}

/// A question as shown to the learner (no answer key).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question_id: String,
    pub concept_id: String,
    pub question_type: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub difficulty: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub assessment_id: String,
    pub user_id: String,
    pub assessment_type: String,
    pub difficulty_level: f64,
    pub max_questions: usize,
    pub concept_ids: Vec<String>,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInput {
    pub question_id: String,
    pub answer: String,
    #[serde(default)]
    pub response_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAssessmentRequest {
    pub user_id: String,
    #[serde(default)]
    pub responses: Vec<ResponseInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptResult {
    pub concept_id: String,
    pub score: f64,
    pub questions_count: u32,
    pub correct_count: u32,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub result_id: String,
    pub assessment_id: String,
    pub user_id: String,
    pub concept_results: Vec<ConceptResult>,
    /// Concepts whose stored mastery could not be updated from this result
    pub mastery_update_failures: Vec<String>,
    pub total_score: f64,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub overall_feedback: String,
    pub completed_at: DateTime<Utc>,
}

pub struct AssessmentService<'a> {
    pool: &'a SqlitePool,
    mastery: &'a dyn MasteryStore,
}

impl<'a> AssessmentService<'a> {
    pub fn new(pool: &'a SqlitePool, mastery: &'a dyn MasteryStore) -> Self {
        Self { pool, mastery }
    }

    pub async fn create_assessment(
        &self,
        request: CreateAssessmentRequest,
    ) -> Result<Assessment, AssessmentError> {
        if request.user_id.trim().is_empty() {
            return Err(AssessmentError::Invalid("userId must not be empty".into()));
        }
        if request.concept_ids.is_empty() {
            return Err(AssessmentError::Invalid("conceptIds must not be empty".into()));
        }
        if request.max_questions == 0 || request.max_questions > MAX_QUESTIONS_LIMIT {
            return Err(AssessmentError::Invalid(format!(
                "maxQuestions must be between 1 and {MAX_QUESTIONS_LIMIT}"
            )));
        }
        let difficulty = pathway_algo::sanitize::sanitize_difficulty(request.difficulty_level);

        let assessment_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let concept_ids: Vec<String> = request
            .concept_ids
            .iter()
            .take(request.max_questions)
            .cloned()
            .collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO assessments (id, user_id, assessment_type, difficulty_level, max_questions, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&assessment_id)
        .bind(&request.user_id)
        .bind(&request.assessment_type)
        .bind(difficulty)
        .bind(request.max_questions as i64)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let mut questions = Vec::with_capacity(concept_ids.len());
        for (position, concept_id) in concept_ids.iter().enumerate() {
            let content = placeholder_question(position, concept_id);
            let question_id = Uuid::new_v4().to_string();

            sqlx::query(
                "INSERT INTO assessment_questions (id, assessment_id, position, concept_id, question_type, content, correct_answer, difficulty) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&question_id)
            .bind(&assessment_id)
            .bind(position as i64)
            .bind(concept_id)
            .bind(QUESTION_TYPE)
            .bind(serde_json::to_string(&content)?)
            .bind(&content.correct_answer)
            .bind(difficulty)
            .execute(&mut *tx)
            .await?;

            questions.push(Question {
                question_id,
                concept_id: concept_id.clone(),
                question_type: QUESTION_TYPE.to_string(),
                text: content.text,
                options: content.options,
                difficulty,
            });
        }
        tx.commit().await?;

        tracing::info!(
            assessment_id = %assessment_id,
            user_id = %request.user_id,
            questions = questions.len(),
            "assessment created"
        );

        Ok(Assessment {
            assessment_id,
            user_id: request.user_id,
            assessment_type: request.assessment_type,
            difficulty_level: difficulty,
            max_questions: request.max_questions,
            concept_ids,
            questions,
            created_at,
        })
    }

    pub async fn submit_assessment(
        &self,
        assessment_id: &str,
        submission: SubmitAssessmentRequest,
    ) -> Result<AssessmentResult, AssessmentError> {
        let user_id = submission.user_id;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Claiming the assessment is the first statement, so the transaction
        // holds the write lock and only one submission can complete it.
        let claimed = sqlx::query(
            "UPDATE assessments SET completed_at = ? WHERE id = ? AND user_id = ? AND completed_at IS NULL",
        )
        .bind(now)
        .bind(assessment_id)
        .bind(&user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            let row = sqlx::query("SELECT user_id FROM assessments WHERE id = ?")
                .bind(assessment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AssessmentError::NotFound(assessment_id.to_string()))?;
            let owner: String = row.try_get("user_id")?;
            if owner != user_id {
                return Err(AssessmentError::NotOwner {
                    assessment_id: assessment_id.to_string(),
                    user_id,
                });
            }
            return Err(AssessmentError::AlreadyCompleted(assessment_id.to_string()));
        }

        let question_rows = sqlx::query(
            "SELECT id, concept_id, correct_answer FROM assessment_questions WHERE assessment_id = ?",
        )
        .bind(assessment_id)
        .fetch_all(&mut *tx)
        .await?;
        let mut answer_key: HashMap<String, (String, String)> = HashMap::new();
        for row in &question_rows {
            answer_key.insert(
                row.try_get("id")?,
                (row.try_get("concept_id")?, row.try_get("correct_answer")?),
            );
        }

        let mut tally = ConceptTally::default();
        let mut total_score = 0.0;

        for response in &submission.responses {
            let Some((concept_id, correct_answer)) = answer_key.get(&response.question_id) else {
                tracing::debug!(question_id = %response.question_id, "skipping response to unknown question");
                continue;
            };

            let is_correct = response.answer.trim().eq_ignore_ascii_case(correct_answer);
            let score = if is_correct { 1.0 } else { 0.0 };
            let feedback = if is_correct {
                "Correct answer".to_string()
            } else {
                format!("Incorrect answer. The correct answer is {correct_answer}")
            };

            sqlx::query(
                "INSERT INTO assessment_responses (id, assessment_id, question_id, user_id, answer, score, feedback, response_time_seconds, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(assessment_id)
            .bind(&response.question_id)
            .bind(&user_id)
            .bind(&response.answer)
            .bind(score)
            .bind(&feedback)
            .bind(response.response_time_seconds.filter(|v| v.is_finite()).unwrap_or(0.0))
            .bind(now)
            .execute(&mut *tx)
            .await?;

            tally.record(concept_id, is_correct);
            total_score += score;
        }

        if !submission.responses.is_empty() {
            total_score /= submission.responses.len() as f64;
        }

        tx.commit().await?;

        let concept_results = tally.into_results();
        let mut mastery_update_failures = Vec::new();
        for result in &concept_results {
            match self
                .mastery
                .upsert_mastery(&user_id, &result.concept_id, result.score, ASSESSMENT_CONFIDENCE)
                .await
            {
                Ok(_) => {}
                Err(MasteryError::UnknownConcept(concept_id)) => {
                    tracing::warn!(%concept_id, "assessment covers a concept missing from the catalogue, mastery not updated");
                }
                Err(err) => {
                    tracing::error!(error = %err, concept_id = %result.concept_id, "mastery update failed");
                    mastery_update_failures.push(result.concept_id.clone());
                }
            }
        }

        let (strengths, areas_for_improvement): (Vec<&ConceptResult>, Vec<&ConceptResult>) =
            concept_results.iter().partition(|r| r.score >= STRENGTH_THRESHOLD);

        tracing::info!(
            assessment_id,
            user_id = %user_id,
            total_score,
            concepts = concept_results.len(),
            mastery_failures = mastery_update_failures.len(),
            "assessment submitted"
        );

        Ok(AssessmentResult {
            result_id: Uuid::new_v4().to_string(),
            assessment_id: assessment_id.to_string(),
            user_id,
            strengths: strengths.iter().map(|r| r.concept_id.clone()).collect(),
            areas_for_improvement: areas_for_improvement
                .iter()
                .map(|r| r.concept_id.clone())
                .collect(),
            concept_results,
            mastery_update_failures,
            total_score,
            overall_feedback: OVERALL_FEEDBACK.to_string(),
            completed_at: now,
        })
    }
}

/// Per-concept correct/answered counts in first-seen order.
#[derive(Default)]
struct ConceptTally {
    order: Vec<String>,
    counts: HashMap<String, (u32, u32)>,
}

impl ConceptTally {
    fn record(&mut self, concept_id: &str, is_correct: bool) {
        if !self.counts.contains_key(concept_id) {
            self.order.push(concept_id.to_string());
        }
        let entry = self.counts.entry(concept_id.to_string()).or_insert((0, 0));
        entry.0 += 1;
        if is_correct {
            entry.1 += 1;
        }
    }

    fn into_results(mut self) -> Vec<ConceptResult> {
        self.order
            .into_iter()
            .filter_map(|concept_id| {
                let (answered, correct) = self.counts.remove(&concept_id)?;
                let score = f64::from(correct) / f64::from(answered);
                Some(ConceptResult {
                    feedback: format!(
                        "You scored {score:.2} on questions covering this concept."
                    ),
                    concept_id,
                    score,
                    questions_count: answered,
                    correct_count: correct,
                })
            })
            .collect()
    }
}

fn placeholder_question(position: usize, concept_id: &str) -> QuestionContent {
    let options = ["A", "B", "C", "D"]
        .iter()
        .map(|label| QuestionOption {
            id: label.to_ascii_lowercase(),
            text: format!("Option {label}"),
        })
        .collect();

    QuestionContent {
        text: format!("Question {} about concept {concept_id}", position + 1),
        options,
        correct_answer: CORRECT_OPTION.to_string(),
    }
}
