use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::response::{AppError, SuccessResponse};
use crate::services::assessment::{
    AssessmentService, CreateAssessmentRequest, SubmitAssessmentRequest,
};
use crate::services::mastery::SqliteMasteryStore;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_assessment))
        .route("/:id/submit", post(submit_assessment))
}

async fn create_assessment(
    State(state): State<AppState>,
    payload: Result<Json<CreateAssessmentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let pool = state.require_db()?;
    let mastery = SqliteMasteryStore::new(pool.clone());
    let assessment = AssessmentService::new(&pool, &mastery)
        .create_assessment(body)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(assessment))))
}

async fn submit_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SubmitAssessmentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let pool = state.require_db()?;
    let mastery = SqliteMasteryStore::new(pool.clone());
    let result = AssessmentService::new(&pool, &mastery)
        .submit_assessment(&id, body)
        .await?;
    Ok(Json(SuccessResponse::new(result)))
}
