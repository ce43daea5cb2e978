pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::llm_provider::LLMProvider;
use crate::state::AppState;

/// Open the configured database, logging instead of failing when it is
/// unreachable so the service can start without storage.
pub async fn connect_database(config: &Config) -> Option<sqlx::SqlitePool> {
    let url = config.database_url.as_deref()?;
    match db::connect(url, config.db_max_connections).await {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!(error = %err, "database not initialized");
            None
        }
    }
}

pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn create_app() -> axum::Router {
    let config = Config::from_env();
    let db = connect_database(&config).await;
    let state = AppState::new(db, Arc::new(LLMProvider::from_env()));
    build_app(state)
}
