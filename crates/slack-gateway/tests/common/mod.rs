//! Shared helpers for the gateway integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use slack_gateway::{
    compute_signature, GatewayConfig, InMemoryTokenStore, SlackApp, TokenStore, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
pub const PREFIX: &str = "slack";

pub fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.app.name = "integration".into();
    config.app.prefix = PREFIX.into();
    config.app.signing_secret = SECRET.into();
    config
}

/// App with workspaces T1 and T2 installed
pub fn app_with(config: GatewayConfig) -> (SlackApp, Arc<InMemoryTokenStore>) {
    let (app, tokens) = SlackApp::in_memory(config).expect("valid config");
    tokens.store("T1", "xoxb-team-one");
    tokens.store("T2", "xoxb-team-two");
    (app, tokens)
}

pub fn app() -> (SlackApp, Arc<InMemoryTokenStore>) {
    app_with(config())
}

pub fn now() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

/// POST with valid Slack signature headers
pub fn signed(path: &str, content_type: &str, body: impl Into<String>) -> Request<Body> {
    let body = body.into();
    let timestamp = now();
    let signature = compute_signature(SECRET, &timestamp, body.as_bytes());
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, content_type)
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .expect("valid request")
}

/// POST without any signature headers
pub fn unsigned(path: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .body(Body::from(body.into()))
        .expect("valid request")
}

pub fn command(name: &str, team_id: &str) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("command", name)
        .append_pair("team_id", team_id)
        .append_pair("text", "hello")
        .finish();
    signed(
        &format!("/{PREFIX}/commands"),
        "application/x-www-form-urlencoded",
        body,
    )
}

pub fn interaction_body(payload: &serde_json::Value) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", &payload.to_string())
        .finish()
}

pub fn interaction(payload: serde_json::Value) -> Request<Body> {
    signed(
        &format!("/{PREFIX}/"),
        "application/x-www-form-urlencoded",
        interaction_body(&payload),
    )
}

pub fn event(body: serde_json::Value) -> Request<Body> {
    signed(
        &format!("/{PREFIX}/events"),
        "application/json",
        body.to_string(),
    )
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub async fn send(router: Router, request: Request<Body>) -> Reply {
    let response = router.oneshot(request).await.expect("infallible router");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    Reply {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}
