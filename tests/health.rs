mod common;

use axum::http::{Method, StatusCode};

use common::{build_test_app, send};

#[tokio::test]
async fn health_reports_missing_backends_as_null() {
    let (app, _) = build_test_app().await;

    let (status, json) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["db_healthy"].is_null());
    assert!(json["redis_healthy"].is_null());
}
