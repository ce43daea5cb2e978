use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::response::{AppError, SuccessResponse};
use crate::services::feedback::{generate_feedback, FeedbackInput, FeedbackParams, LearnerContext};
use crate::services::profile::SqliteProfileStore;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateFeedbackRequest {
    result: FeedbackInput,
    /// Learner whose profile personalises the feedback, when storage is available
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    params: Option<FeedbackParams>,
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateFeedbackRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    if !body.result.total_score.is_finite() {
        return Err(AppError::validation("totalScore must be a finite number"));
    }
    let params = body.params.unwrap_or_default();
    let learner = match body.user_id.as_deref() {
        Some(user_id) => learner_context(&state, user_id).await,
        None => None,
    };
    let oracle = state.oracle();
    let feedback = generate_feedback(oracle.as_ref(), &body.result, &params, learner.as_ref()).await;
    Ok(Json(SuccessResponse::new(feedback)))
}

async fn learner_context(state: &AppState, user_id: &str) -> Option<LearnerContext> {
    let store = SqliteProfileStore::new(state.db()?);
    match store.get_profile(user_id).await {
        Ok(profile) => profile.map(|p| p.learner_context()),
        Err(err) => {
            tracing::warn!(error = %err, user_id, "profile lookup failed, feedback not personalised");
            None
        }
    }
}
