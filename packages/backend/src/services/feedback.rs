//! Learner feedback generation.
//!
//! Feedback text comes from a [`TextOracle`]; when the oracle is missing or
//! fails, a basic score summary is returned instead so callers always get a
//! usable document. A learner's preferred style overrides the requested one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::services::llm_provider::LLMError;

const SYSTEM_PROMPT: &str =
    "You are an experienced educator who gives learners helpful, motivating feedback.";
const FEEDBACK_MAX_TOKENS: u32 = 1000;
const FEEDBACK_TEMPERATURE: f32 = 0.5;
const UNKNOWN_ASSESSMENT: &str = "unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

/// Text-generation backend, injected so tests and deployments can swap it.
#[async_trait]
pub trait TextOracle: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LLMError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackParams {
    pub feedback_style: String,
    pub motivational_tone: bool,
    pub include_next_steps: bool,
    pub detail_level: String,
}

impl Default for FeedbackParams {
    fn default() -> Self {
        Self {
            feedback_style: "constructive".to_string(),
            motivational_tone: true,
            include_next_steps: true,
            detail_level: "moderate".to_string(),
        }
    }
}

/// The parts of an assessment outcome feedback is written about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    #[serde(default)]
    pub assessment_id: Option<String>,
    pub total_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
}

/// What feedback personalisation knows about the learner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnerContext {
    pub learning_style: BTreeMap<String, f64>,
    pub motivation_profile: Map<String, Value>,
    pub preferred_style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Adaptive,
    Basic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_style: Option<String>,
    pub score_context: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_params: Option<FeedbackParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub feedback_id: String,
    pub assessment_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub metadata: FeedbackMetadata,
}

pub async fn generate_feedback(
    oracle: &dyn TextOracle,
    input: &FeedbackInput,
    params: &FeedbackParams,
    learner: Option<&LearnerContext>,
) -> Feedback {
    let style = learner
        .and_then(|l| l.preferred_style.as_deref())
        .unwrap_or(&params.feedback_style);
    let assessment_id = input
        .assessment_id
        .clone()
        .unwrap_or_else(|| UNKNOWN_ASSESSMENT.to_string());

    if !oracle.is_available() {
        return basic_feedback(assessment_id, input.total_score, "text generation is not configured".into());
    }

    let options = GenerationOptions {
        max_tokens: Some(FEEDBACK_MAX_TOKENS),
        temperature: Some(FEEDBACK_TEMPERATURE),
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
    };

    let prompt = build_prompt(input, params, style, learner);
    match oracle.generate(&prompt, &options).await {
        Ok(text) if !text.trim().is_empty() => Feedback {
            feedback_id: Uuid::new_v4().to_string(),
            assessment_id,
            content: text.trim().to_string(),
            kind: FeedbackKind::Adaptive,
            metadata: FeedbackMetadata {
                feedback_style: Some(style.to_string()),
                score_context: input.total_score,
                generation_params: Some(params.clone()),
                error: None,
                timestamp: Utc::now(),
            },
        },
        Ok(_) => basic_feedback(assessment_id, input.total_score, "empty response".into()),
        Err(err) => {
            tracing::warn!(error = %err, assessment_id = %assessment_id, "adaptive feedback failed, using basic feedback");
            basic_feedback(assessment_id, input.total_score, err.to_string())
        }
    }
}

pub fn basic_feedback_text(total_score: f64) -> String {
    format!(
        "Your overall score: {total_score:.2} out of 1.0. Keep practising to strengthen your understanding."
    )
}

fn basic_feedback(assessment_id: String, total_score: f64, error: String) -> Feedback {
    Feedback {
        feedback_id: Uuid::new_v4().to_string(),
        assessment_id,
        content: basic_feedback_text(total_score),
        kind: FeedbackKind::Basic,
        metadata: FeedbackMetadata {
            feedback_style: None,
            score_context: total_score,
            generation_params: None,
            error: Some(format!("failed to generate adaptive feedback: {error}")),
            timestamp: Utc::now(),
        },
    }
}

fn build_prompt(
    input: &FeedbackInput,
    params: &FeedbackParams,
    style: &str,
    learner: Option<&LearnerContext>,
) -> String {
    let list_or_default = |items: &[String]| {
        if items.is_empty() {
            "not specified".to_string()
        } else {
            items.join(", ")
        }
    };
    let next_steps = if params.include_next_steps {
        "Includes concrete next steps or practice suggestions"
    } else {
        "Focuses only on the current results"
    };
    let learning_style = learner
        .filter(|l| !l.learning_style.is_empty())
        .map(|l| describe(&l.learning_style));
    let motivation = learner
        .filter(|l| !l.motivation_profile.is_empty())
        .map(|l| describe(&l.motivation_profile));

    format!(
        "Write personalised learning feedback for a student based on their assessment results.\n\
         \n\
         Assessment results:\n\
         - Score: {score:.2} out of 1.0\n\
         - Strengths: {strengths}\n\
         - Areas for improvement: {areas}\n\
         \n\
         Learner profile:\n\
         - Learning style: {learning_style}\n\
         - Motivation profile: {motivation}\n\
         \n\
         Feedback parameters:\n\
         - Style: {style}\n\
         - Motivational tone: {motivational}\n\
         - Include next steps: {include_next}\n\
         - Detail level: {detail}\n\
         \n\
         The feedback should:\n\
         1. Address the specific strengths and weaknesses shown in the results\n\
         2. Suit the learner's learning style and motivation profile\n\
         3. Offer concrete suggestions for improvement\n\
         4. Use a {style} tone the learner will respond well to\n\
         5. {next_steps}\n\
         \n\
         Return the feedback as one coherent paragraph without headings or meta commentary.",
        score = input.total_score,
        strengths = list_or_default(&input.strengths),
        areas = list_or_default(&input.areas_for_improvement),
        learning_style = learning_style.as_deref().unwrap_or("not specified"),
        motivation = motivation.as_deref().unwrap_or("not specified"),
        style = style,
        motivational = params.motivational_tone,
        include_next = params.include_next_steps,
        detail = params.detail_level,
    )
}

fn describe<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "not specified".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Scripted {
        reply: Result<String, &'static str>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextOracle for Scripted {
        async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, LLMError> {
            assert_eq!(options.system_prompt.as_deref(), Some(SYSTEM_PROMPT));
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(LLMError::NotConfigured)
        }
    }

    struct Offline;

    #[async_trait]
    impl TextOracle for Offline {
        fn is_available(&self) -> bool {
            false
        }

        async fn generate(&self, _: &str, _: &GenerationOptions) -> Result<String, LLMError> {
            panic!("offline oracle must not be called");
        }
    }

    fn input() -> FeedbackInput {
        FeedbackInput {
            assessment_id: Some("as-1".into()),
            total_score: 0.75,
            strengths: vec!["fractions".into()],
            areas_for_improvement: vec![],
        }
    }

    #[tokio::test]
    async fn test_adaptive_feedback_uses_oracle_text() {
        let oracle = Scripted { reply: Ok("  Great progress.  ".into()), prompts: Mutex::new(Vec::new()) };
        let feedback = generate_feedback(&oracle, &input(), &FeedbackParams::default(), None).await;

        assert_eq!(feedback.kind, FeedbackKind::Adaptive);
        assert_eq!(feedback.content, "Great progress.");
        assert_eq!(feedback.assessment_id, "as-1");
        assert_eq!(feedback.metadata.feedback_style.as_deref(), Some("constructive"));

        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("Score: 0.75 out of 1.0"));
        assert!(prompts[0].contains("Strengths: fractions"));
        assert!(prompts[0].contains("Areas for improvement: not specified"));
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back_to_basic() {
        let oracle = Scripted { reply: Err("down"), prompts: Mutex::new(Vec::new()) };
        let feedback = generate_feedback(&oracle, &input(), &FeedbackParams::default(), None).await;

        assert_eq!(feedback.kind, FeedbackKind::Basic);
        assert_eq!(
            feedback.content,
            "Your overall score: 0.75 out of 1.0. Keep practising to strengthen your understanding."
        );
        assert!(feedback.metadata.error.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_oracle_is_not_called() {
        let mut no_id = input();
        no_id.assessment_id = None;
        let feedback = generate_feedback(&Offline, &no_id, &FeedbackParams::default(), None).await;
        assert_eq!(feedback.kind, FeedbackKind::Basic);
        assert_eq!(feedback.assessment_id, "unknown");
    }

    #[test]
    fn test_params_default_from_partial_json() {
        let params: FeedbackParams = serde_json::from_str(r#"{"feedbackStyle":"encouraging"}"#).unwrap();
        assert_eq!(params.feedback_style, "encouraging");
        assert!(params.include_next_steps);
        assert_eq!(params.detail_level, "moderate");
    }

    #[tokio::test]
    async fn test_preferred_style_overrides_request() {
        let oracle = Scripted { reply: Ok("Keep going.".into()), prompts: Mutex::new(Vec::new()) };
        let learner = LearnerContext {
            learning_style: BTreeMap::from([("visual".to_string(), 0.9)]),
            motivation_profile: serde_json::json!({ "goal": "exam" }).as_object().unwrap().clone(),
            preferred_style: Some("encouraging".into()),
        };
        let params = FeedbackParams { feedback_style: "direct".into(), ..FeedbackParams::default() };

        let feedback = generate_feedback(&oracle, &input(), &params, Some(&learner)).await;

        assert_eq!(feedback.metadata.feedback_style.as_deref(), Some("encouraging"));
        assert_eq!(feedback.metadata.generation_params.as_ref().unwrap().feedback_style, "direct");
        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("Style: encouraging"));
        assert!(prompts[0].contains(r#"Learning style: {"visual":0.9}"#));
        assert!(prompts[0].contains(r#"Motivation profile: {"goal":"exam"}"#));
    }

    #[tokio::test]
    async fn test_learner_without_preference_keeps_requested_style() {
        let oracle = Scripted { reply: Ok("Fine.".into()), prompts: Mutex::new(Vec::new()) };
        let params = FeedbackParams { feedback_style: "direct".into(), ..FeedbackParams::default() };

        let feedback =
            generate_feedback(&oracle, &input(), &params, Some(&LearnerContext::default())).await;

        assert_eq!(feedback.metadata.feedback_style.as_deref(), Some("direct"));
        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts[0].contains("Learning style: not specified"));
    }
}
