mod assessments;
mod concepts;
mod feedback;
mod health;
mod learning_path;
mod mastery;
mod profiles;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;

use crate::config::env_bool;
use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let enable_feedback = env_bool("PATHWAY_ENABLE_FEEDBACK").unwrap_or(true);
    let healthcheck_endpoint = normalize_healthcheck_endpoint(
        std::env::var("HEALTHCHECK_ENDPOINT")
            .ok()
            .as_deref()
            .unwrap_or("/health"),
    );

    let mut app = Router::new()
        .nest("/api/concepts", concepts::router())
        .nest("/api/learning", learning_path::router())
        .nest("/api/assessments", assessments::router())
        .nest("/api/profiles", profiles::router())
        .route(
            "/api/users/:user_id/mastery",
            get(mastery::list_mastery).fallback(fallback_handler),
        )
        .route(
            "/api/users/:user_id/mastery/:concept_id",
            put(mastery::update_mastery).fallback(fallback_handler),
        )
        .route(
            "/api/users/:user_id/plans",
            get(learning_path::list_user_plans).fallback(fallback_handler),
        );

    if enable_feedback {
        app = app.nest("/api/feedback", feedback::router());
    }

    if healthcheck_endpoint == "/" {
        app = app.merge(health::router());
    } else {
        app = app.nest(&healthcheck_endpoint, health::router());
    }

    app.fallback(fallback_handler).with_state(state)
}

fn normalize_healthcheck_endpoint(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "/health".to_string();
    }

    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    if with_slash != "/" {
        with_slash.trim_end_matches('/').to_string()
    } else {
        with_slash
    }
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Endpoint not found").into_response()
}
