use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pathway_algo::{DifficultyCurve, PathParams};
use serde::Deserialize;

use crate::response::{AppError, SuccessResponse};
use crate::services::plan::PlanService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/path", post(optimize_path))
        .route("/plans/:plan_id", get(get_plan))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizePathRequest {
    user_id: String,
    concept_ids: Vec<String>,
    #[serde(default)]
    path_params: Option<PathParamsInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathParamsInput {
    target_difficulty_curve: Option<DifficultyCurve>,
    max_concepts_per_session: Option<usize>,
    spaced_repetition: Option<bool>,
    include_assessments: Option<bool>,
}

impl From<PathParamsInput> for PathParams {
    fn from(input: PathParamsInput) -> Self {
        let defaults = PathParams::default();
        PathParams {
            target_difficulty_curve: input
                .target_difficulty_curve
                .unwrap_or(defaults.target_difficulty_curve),
            max_concepts_per_session: input
                .max_concepts_per_session
                .unwrap_or(defaults.max_concepts_per_session),
            spaced_repetition: input.spaced_repetition.unwrap_or(defaults.spaced_repetition),
            include_assessments: input
                .include_assessments
                .unwrap_or(defaults.include_assessments),
        }
    }
}

async fn optimize_path(
    State(state): State<AppState>,
    payload: Result<Json<OptimizePathRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let params = PathParams::from(body.path_params.unwrap_or_default());
    let service = PlanService::sqlite(state.require_db()?);
    let plan = service
        .optimize(body.user_id.trim(), &body.concept_ids, &params)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(plan))))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let service = PlanService::sqlite(state.require_db()?);
    let stored = service.get_plan(&plan_id).await?;
    Ok(Json(SuccessResponse::new(stored)))
}

pub(super) async fn list_user_plans(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let service = PlanService::sqlite(state.require_db()?);
    let plans = service.list_plans(&user_id).await?;
    Ok(Json(SuccessResponse::new(plans)))
}
