use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use pathway_algo::MasteryRecord;
use serde::{Deserialize, Serialize};

use crate::response::{AppError, SuccessResponse};
use crate::services::mastery::{MasteryStore, SqliteMasteryStore};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MasteryQuery {
    concept_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateMasteryRequest {
    score: f64,
    confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MasteryView {
    concept_id: String,
    mastery_level: f64,
    confidence: f64,
    last_assessed_at: String,
}

impl From<MasteryRecord> for MasteryView {
    fn from(record: MasteryRecord) -> Self {
        Self {
            concept_id: record.concept_id,
            mastery_level: record.mastery_level,
            confidence: record.confidence,
            last_assessed_at: record
                .last_assessed_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

pub(super) async fn list_mastery(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<MasteryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let store = SqliteMasteryStore::new(state.require_db()?);
    let records = store
        .get_mastery(&user_id, query.concept_id.as_deref())
        .await?;
    let data: Vec<MasteryView> = records.into_iter().map(MasteryView::from).collect();
    Ok(Json(SuccessResponse::new(data)))
}

pub(super) async fn update_mastery(
    State(state): State<AppState>,
    Path((user_id, concept_id)): Path<(String, String)>,
    payload: Result<Json<UpdateMasteryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;
    let store = SqliteMasteryStore::new(state.require_db()?);
    let record = store
        .upsert_mastery(&user_id, &concept_id, body.score, body.confidence)
        .await?;
    Ok(Json(SuccessResponse::new(MasteryView::from(record))))
}
