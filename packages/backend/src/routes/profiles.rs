use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::response::{AppError, SuccessResponse};
use crate::services::profile::{ProfileInput, SqliteProfileStore};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/:user_id",
        get(get_profile).post(create_profile).put(update_profile),
    )
}

async fn create_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let store = SqliteProfileStore::new(state.require_db()?);
    let profile = store.create_profile(&user_id, input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(profile))))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = SqliteProfileStore::new(state.require_db()?);
    let profile = store
        .get_profile(&user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("profile not found for user {user_id}")))?;
    Ok(Json(SuccessResponse::new(profile)))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let store = SqliteProfileStore::new(state.require_db()?);
    let profile = store.update_profile(&user_id, input).await?;
    Ok(Json(SuccessResponse::new(profile).with_message("profile updated")))
}
