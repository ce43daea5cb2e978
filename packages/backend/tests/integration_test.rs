use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_health_root_without_database() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_info_reports_text_generation() {
    let app = common::create_test_app().await;
    let (status, body) = common::send(&app, "GET", "/health/info", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "pathway-backend");
    assert_eq!(body["textGeneration"], false);
}

#[tokio::test]
async fn test_health_root_with_database() {
    let (app, _pool) = common::create_test_app_with_db().await;
    let (status, body) = common::send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = common::create_test_app().await;
    let (status, body) = common::send(&app, "GET", "/api/does-not-exist", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_data_routes_need_database() {
    let app = common::create_test_app().await;

    let (status, body) = common::send(
        &app,
        "POST",
        "/api/learning/path",
        Some(json!({ "userId": "u1", "conceptIds": ["a"] })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

    let (status, _) = common::send(&app, "GET", "/api/concepts", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = common::send(&app, "GET", "/api/profiles/u1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_feedback_without_llm_is_basic() {
    let app = common::create_test_app().await;
    let (status, body) = common::send(
        &app,
        "POST",
        "/api/feedback/generate",
        Some(json!({ "userId": "u1", "result": { "totalScore": 0.5 } })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "basic");
    assert_eq!(
        body["data"]["content"],
        "Your overall score: 0.50 out of 1.0. Keep practising to strengthen your understanding."
    );
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let (app, _pool) = common::create_test_app_with_db().await;
    let (status, body) = common::send(
        &app,
        "POST",
        "/api/learning/path",
        Some(json!({ "conceptIds": "not-a-list" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_file_backed_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("pathway.db").display());

    let pool = pathway_backend::db::connect(&url, 2).await.unwrap();
    sqlx::query("INSERT INTO concepts (id, name, difficulty, created_at) VALUES ('a', 'A', 0.4, '2024-01-01T00:00:00Z')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    // reopening keeps data and re-applies the schema without error
    let pool = pathway_backend::db::connect(&url, 2).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM concepts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
