#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;

use cinema_booking::config::Config;
use cinema_booking::middleware::Claims;
use cinema_booking::models::Film;
use cinema_booking::services::catalog::StaticFilmDirectory;
use cinema_booking::services::ledger::InMemoryLedger;
use cinema_booking::{app, demo_seance, AppState};

pub const SEANCE: i64 = 1;

/// Application wired to the in-memory ledger with the demo hall registered
/// as seance 1 (rows A-P, 23 seats, VIP from row M).
pub async fn build_test_app() -> (Router, Arc<AppState>) {
    let config = Config::defaults().unwrap();
    let films = StaticFilmDirectory::new([Film {
        id: 1,
        title: "Solaris".into(),
        duration_minutes: Some(167),
    }]);
    let state = AppState::assemble(
        config,
        Arc::new(InMemoryLedger::new()),
        Arc::new(films),
        None,
        None,
    );
    state
        .coordinator
        .register_seance(demo_seance(), Vec::new())
        .await
        .unwrap();
    (app(state.clone()), state)
}

/// Signed bearer token for `user_id`, valid for ten minutes.
pub fn token_for(state: &AppState, user_id: &str) -> String {
    let exp = (chrono::Utc::now().timestamp() + 600) as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: user_id.into(),
            exp,
        },
        &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )
    .unwrap()
}

/// Sends one request through the router and returns status plus JSON body
/// (`Null` for empty bodies).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

pub fn seat(row: &str, number: i64) -> serde_json::Value {
    serde_json::json!({ "row": row, "number": number })
}
