use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::response::{AppError, SuccessResponse};
use crate::services::concept::{NewConcept, SqliteConceptStore};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_concept).get(list_concepts))
        .route("/:id", get(get_concept))
        .route("/:id/prerequisites", post(add_prerequisite))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    domain: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPrerequisiteRequest {
    prerequisite_id: String,
}

async fn create_concept(
    State(state): State<AppState>,
    payload: Result<Json<NewConcept>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let store = SqliteConceptStore::new(state.require_db()?);
    let concept = store.create_concept(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(concept))))
}

async fn list_concepts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let store = SqliteConceptStore::new(state.require_db()?);
    let domain = query.domain.as_deref().filter(|d| !d.trim().is_empty());
    let concepts = store.list_concepts(domain).await?;
    Ok(Json(SuccessResponse::new(concepts)))
}

async fn get_concept(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let store = SqliteConceptStore::new(state.require_db()?);
    let concept = store
        .find_concept(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("concept not found: {id}")))?;
    Ok(Json(SuccessResponse::new(concept)))
}

async fn add_prerequisite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddPrerequisiteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let store = SqliteConceptStore::new(state.require_db()?);
    let concept = store.add_prerequisite(&id, body.prerequisite_id.trim()).await?;
    Ok(Json(SuccessResponse::new(concept).with_message("prerequisite recorded")))
}
