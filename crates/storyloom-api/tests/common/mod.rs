//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use storyloom_core::clock::Clock;
use storyloom_posting::application::pipeline::PostingWaits;
use storyloom_test_support::FixedClock;
use tower::ServiceExt;

use storyloom_api::app;
use storyloom_api::state::{AppState, Repositories};

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Builds the state over PostgreSQL repositories and a fixed clock.
pub fn build_test_state(pool: &PgPool) -> AppState {
    AppState::new(
        fixed_clock(),
        Repositories::postgres(pool),
        PostingWaits::default(),
        None,
    )
}

/// Builds the full app router, as `main.rs` does.
pub fn build_test_app(pool: PgPool) -> Router {
    app(build_test_state(&pool))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PUT", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Keeps posting `content` as `member`'s reply in `channel` until an attempt
/// accepts it.
pub async fn reply_when_waiting(app: Router, channel: &str, member: &str, content: &str) {
    let body = serde_json::json!({ "member": member, "content": content });
    loop {
        let (_, json) = post_json(app.clone(), &format!("/api/v1/channels/{channel}/replies"), &body).await;
        if json["delivered"] == true {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
