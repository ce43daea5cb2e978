#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use pathway_backend::services::feedback::{GenerationOptions, TextOracle};
use pathway_backend::services::llm_provider::LLMError;
use pathway_backend::state::AppState;

/// Oracle that answers every prompt with the same text.
pub struct CannedOracle(pub &'static str);

#[async_trait]
impl TextOracle for CannedOracle {
    async fn generate(&self, _: &str, _: &GenerationOptions) -> Result<String, LLMError> {
        Ok(self.0.to_string())
    }
}

/// Oracle that is always down.
pub struct BrokenOracle;

#[async_trait]
impl TextOracle for BrokenOracle {
    async fn generate(&self, _: &str, _: &GenerationOptions) -> Result<String, LLMError> {
        Err(LLMError::EmptyChoices)
    }
}

pub async fn create_test_app() -> Router {
    std::env::set_var("DATABASE_URL", "");
    std::env::remove_var("LLM_API_KEY");

    pathway_backend::create_app().await
}

pub async fn create_test_app_with_db() -> (Router, SqlitePool) {
    create_test_app_with_oracle(Arc::new(CannedOracle("Nice work on fractions."))).await
}

pub async fn create_test_app_with_oracle(oracle: Arc<dyn TextOracle>) -> (Router, SqlitePool) {
    let pool = pathway_backend::db::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database");
    let app = pathway_backend::build_app(AppState::new(Some(pool.clone()), oracle));
    (app, pool)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn create_concept(app: &Router, id: &str, difficulty: f64, prerequisites: &[&str]) {
    let (status, body) = send(
        app,
        "POST",
        "/api/concepts",
        Some(serde_json::json!({
            "id": id,
            "name": format!("Concept {id}"),
            "domain": "math",
            "difficulty": difficulty,
            "prerequisiteIds": prerequisites,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}
