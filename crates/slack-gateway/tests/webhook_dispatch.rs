//! # End-to-end dispatch tests
//!
//! Drive the full router in-process and check what Slack would see.
//!
//! ## Test Categories
//!
//! 1. **Authentication** - missing, forged and stale signatures
//! 2. **Routing** - every callback family reaches exactly its handler
//! 3. **Error path** - default responses, error callback, status policy
//! 4. **Runtime registration** - handlers added and removed while serving

mod common;

use axum::http::{header, StatusCode};
use common::*;
use serde_json::json;
use slack_gateway::{
    DispatchError, ErrorStatusPolicy, RequestContext, RequestParts, ResponseWriter, SlackApp,
    TimeSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn counting(app: &SlackApp) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    app.on_error(
        move |_: &RequestParts, _: &DispatchError, response: &mut ResponseWriter| {
            seen.fetch_add(1, Ordering::SeqCst);
            response.text(StatusCode::OK, "handled by callback");
        },
    );
    calls
}

fn echo_route(label: &'static str) -> impl Fn(&mut RequestContext) + Send + Sync + 'static {
    move |ctx: &mut RequestContext| {
        let reply = format!("{label}:{}:{}", ctx.team_id, ctx.token);
        ctx.response.text(StatusCode::OK, reply);
    }
}

struct FixedClock(u64);

impl TimeSource for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_missing_signature_is_unauthorized() {
    let (app, _) = app();
    let invoked = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&invoked);
    app.on_command("/ping", move |_: &mut RequestContext| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let callback_calls = counting(&app);

    let reply = send(
        app.router(),
        unsigned("/slack/commands", "command=/ping&team_id=T1"),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, "Unauthorized");
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(callback_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_body_tampered_after_signing() {
    let (app, _) = app();
    app.on_command("/ping", echo_route("ping"));

    let mut request = command("/ping", "T1");
    *request.body_mut() = axum::body::Body::from("command=/ping&team_id=T2&text=hello");

    let reply = send(app.router(), request).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, "Unauthorized");
}

#[tokio::test]
async fn test_signature_for_other_secret() {
    let (app, _) = app();
    app.on_command("/ping", echo_route("ping"));

    let body = "command=/ping&team_id=T1";
    let timestamp = now();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/slack/commands")
        .header(slack_gateway::TIMESTAMP_HEADER, &timestamp)
        .header(
            slack_gateway::SIGNATURE_HEADER,
            slack_gateway::compute_signature("another-secret", &timestamp, body.as_bytes()),
        )
        .body(axum::body::Body::from(body))
        .unwrap();

    assert_eq!(send(app.router(), request).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_replay_window() {
    let mut config = config();
    config.security.max_timestamp_age = Some(Duration::from_secs(300));
    let current: u64 = now().parse().unwrap();

    let fresh = SlackApp::with_time_source(
        config.clone(),
        Arc::new(slack_gateway::InMemoryTokenStore::from_iter([("T1", "xoxb-1")])),
        Arc::new(FixedClock(current + 60)),
    )
    .unwrap();
    fresh.on_command("/ping", echo_route("ping"));
    assert_eq!(
        send(fresh.router(), command("/ping", "T1")).await.status,
        StatusCode::OK
    );

    let later = SlackApp::with_time_source(
        config,
        Arc::new(slack_gateway::InMemoryTokenStore::from_iter([("T1", "xoxb-1")])),
        Arc::new(FixedClock(current + 3600)),
    )
    .unwrap();
    later.on_command("/ping", echo_route("ping"));
    let reply = send(later.router(), command("/ping", "T1")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, "Unauthorized");
}

#[tokio::test]
async fn test_url_verification_bypasses_signature() {
    let (app, _) = app();
    let body = r#"{"type":"url_verification","challenge":"abc"}"#;

    let reply = send(app.router(), unsigned("/slack/events", body)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(reply.body, body);
    assert_eq!(
        app.metrics().url_verifications.load(Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn test_url_verification_only_on_events_route() {
    let (app, _) = app();
    let body = r#"{"type":"url_verification","challenge":"abc"}"#;

    let reply = send(app.router(), unsigned("/slack/commands", body)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// ROUTING
// =============================================================================

#[tokio::test]
async fn test_command_reaches_handler() {
    let (app, _) = app();
    app.on_command("/ping", |ctx: &mut RequestContext| {
        let text = ctx.form_field("text").unwrap_or_default();
        ctx.response
            .json(StatusCode::OK, &json!({ "text": format!("pong {text}") }))
            .unwrap();
    });

    let reply = send(app.router(), command("/ping", "T1")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(reply.body, r#"{"text":"pong hello"}"#);
}

#[tokio::test]
async fn test_token_follows_workspace() {
    let (app, _) = app();
    app.on_command("/whoami", echo_route("whoami"));

    let one = send(app.router(), command("/whoami", "T1")).await;
    let two = send(app.router(), command("/whoami", "T2")).await;

    assert_eq!(one.body, "whoami:T1:xoxb-team-one");
    assert_eq!(two.body, "whoami:T2:xoxb-team-two");
}

#[tokio::test]
async fn test_interaction_families() {
    let (app, _) = app();
    app.on_shortcut("open_ticket", echo_route("shortcut"));
    app.on_action("approve", echo_route("action"));
    app.on_view_submission("survey", echo_route("submit"));
    app.on_view_close("survey", echo_route("close"));

    let cases = [
        (
            json!({"type": "shortcut", "callback_id": "open_ticket", "team": {"id": "T1"}}),
            "shortcut:T1:xoxb-team-one",
        ),
        (
            json!({
                "type": "block_actions",
                "team": {"id": "T2"},
                "actions": [{"action_id": "approve"}, {"action_id": "ignored"}]
            }),
            "action:T2:xoxb-team-two",
        ),
        (
            json!({"type": "view_submission", "team": {"id": "T1"}, "view": {"callback_id": "survey"}}),
            "submit:T1:xoxb-team-one",
        ),
        (
            json!({"type": "view_closed", "team": {"id": "T1"}, "view": {"callback_id": "survey"}}),
            "close:T1:xoxb-team-one",
        ),
    ];

    for (payload, expected) in cases {
        let reply = send(app.router(), interaction(payload)).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, expected);
    }
}

#[tokio::test]
async fn test_interactions_on_nested_path() {
    let (app, _) = app();
    app.on_action("approve", echo_route("action"));

    let payload = json!({"type": "block_actions", "team": {"id": "T1"}, "actions": [{"action_id": "approve"}]});
    let request = signed(
        "/slack/interactive",
        "application/x-www-form-urlencoded",
        interaction_body(&payload),
    );

    let reply = send(app.router(), request).await;
    assert_eq!(reply.body, "action:T1:xoxb-team-one");
}

#[tokio::test]
async fn test_event_callback() {
    let (app, _) = app();
    app.on_event("app_mention", |ctx: &mut RequestContext| {
        let body: serde_json::Value = serde_json::from_slice(&ctx.body).unwrap();
        let text = body["event"]["text"].as_str().unwrap_or_default().to_string();
        ctx.response.text(StatusCode::OK, text);
    });

    let reply = send(
        app.router(),
        event(json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": {"type": "app_mention", "text": "<@U1> deploy"}
        })),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "<@U1> deploy");
}

#[tokio::test]
async fn test_silent_handler_yields_empty_ok() {
    let (app, _) = app();
    app.on_event("reaction_added", |_: &mut RequestContext| {});

    let reply = send(
        app.router(),
        event(json!({"type": "event_callback", "team_id": "T1", "event": {"type": "reaction_added"}})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_empty());
}

#[tokio::test]
async fn test_last_registration_wins() {
    let (app, _) = app();
    app.on_command("/deploy", echo_route("first"));
    app.on_command("/deploy", echo_route("second"));

    let reply = send(app.router(), command("/deploy", "T1")).await;
    assert_eq!(reply.body, "second:T1:xoxb-team-one");
}

// =============================================================================
// ERROR PATH
// =============================================================================

#[tokio::test]
async fn test_unregistered_action_default_response() {
    let (app, _) = app();
    let payload = json!({
        "type": "block_actions",
        "team": {"id": "T1"},
        "actions": [{"action_id": "unregistered_id"}]
    });

    let reply = send(app.router(), interaction(payload)).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.body.contains("unregistered_id"));
    assert_eq!(reply.body, "unrecognized action: unregistered_id");
}

#[tokio::test]
async fn test_missing_credential_never_invokes_handler() {
    let (app, _) = app();
    let invoked = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&invoked);
    app.on_command("/ping", move |_: &mut RequestContext| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    app.on_error(
        move |_: &RequestParts, err: &DispatchError, response: &mut ResponseWriter| {
            sink.lock().unwrap().push(err.clone());
            response.set_status(StatusCode::OK);
        },
    );

    let reply = send(app.router(), command("/ping", "T9")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    let errors = errors.lock().unwrap();
    assert!(matches!(
        errors.as_slice(),
        [DispatchError::CredentialNotFound { team_id }] if team_id == "T9"
    ));
}

#[tokio::test]
async fn test_classification_failures_name_the_field() {
    let (app, _) = app();

    let cases = [
        (
            signed("/slack/commands", "application/x-www-form-urlencoded", "team_id=T1"),
            "missing field: command",
        ),
        (
            interaction(json!({"type": "block_actions", "team": {"id": "T1"}, "actions": []})),
            "missing field: actions",
        ),
        (
            interaction(json!({"type": "dialog_submission", "team": {"id": "T1"}})),
            "unrecognized interaction type: dialog_submission",
        ),
        (
            event(json!({"type": "event_callback", "team_id": "T1"})),
            "missing field: event.type",
        ),
    ];

    for (request, expected) in cases {
        let reply = send(app.router(), request).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply.body, expected);
    }
}

#[tokio::test]
async fn test_error_callback_receives_request() {
    let (app, _) = app();
    app.on_error(
        |request: &RequestParts, err: &DispatchError, response: &mut ResponseWriter| {
            let body = format!("{} {} -> {}", request.method, request.uri.path(), err.kind());
            response.respond(StatusCode::ACCEPTED, body, &[("X-Error-Kind", err.kind())]);
        },
    );

    let reply = send(app.router(), command("/nope", "T1")).await;

    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.headers["x-error-kind"], "unrecognized_route");
    assert_eq!(reply.body, "POST /slack/commands -> unrecognized_route");

    app.clear_error_handler();
    let reply = send(app.router(), command("/nope", "T1")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_distinct_status_policy() {
    let mut config = config();
    config.security.error_status = ErrorStatusPolicy::Distinct;
    let (app, _) = app_with(config);
    app.on_command("/ping", echo_route("ping"));

    let cases = [
        (command("/ping", "T9"), StatusCode::FORBIDDEN),
        (command("/nope", "T1"), StatusCode::NOT_FOUND),
        (
            signed("/slack/commands", "application/x-www-form-urlencoded", "command=/ping"),
            StatusCode::BAD_REQUEST,
        ),
        (unsigned("/slack/commands", "command=/ping&team_id=T1"), StatusCode::UNAUTHORIZED),
    ];

    for (request, expected) in cases {
        assert_eq!(send(app.router(), request).await.status, expected);
    }
}

#[tokio::test]
async fn test_oversized_body_goes_through_error_path() {
    let mut config = config();
    config.limits.max_body_size = 64;
    let (app, _) = app_with(config);
    let callback_calls = counting(&app);

    let long_text = "x".repeat(256);
    let body = format!("command=/ping&team_id=T1&text={long_text}");
    let reply = send(
        app.router(),
        signed("/slack/commands", "application/x-www-form-urlencoded", body),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "handled by callback");
    assert_eq!(callback_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// RUNTIME REGISTRATION
// =============================================================================

#[tokio::test]
async fn test_remove_while_serving() {
    let (app, _) = app();
    app.on_command("/ping", echo_route("ping"));
    let router = app.router();

    assert_eq!(send(router.clone(), command("/ping", "T1")).await.status, StatusCode::OK);

    assert!(app.remove_command("/ping"));
    let reply = send(router.clone(), command("/ping", "T1")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, "unrecognized command: /ping");

    app.on_command("/ping", echo_route("again"));
    let reply = send(router, command("/ping", "T1")).await;
    assert_eq!(reply.body, "again:T1:xoxb-team-one");
}

#[tokio::test]
async fn test_uninstalled_workspace_after_token_removal() {
    let (app, tokens) = app();
    app.on_command("/ping", echo_route("ping"));

    use slack_gateway::TokenStore;
    assert_eq!(tokens.remove("T1").as_deref(), Some("xoxb-team-one"));

    let reply = send(app.router(), command("/ping", "T1")).await;
    assert_eq!(reply.body, "app not installed for workspace: T1");
}

#[tokio::test]
async fn test_metrics_count_outcomes() {
    let (app, _) = app();
    app.on_command("/ping", echo_route("ping"));

    send(app.router(), command("/ping", "T1")).await;
    send(app.router(), command("/nope", "T1")).await;
    send(app.router(), unsigned("/slack/commands", "command=/ping")).await;

    let metrics = app.metrics();
    assert_eq!(metrics.commands_received.load(Ordering::Relaxed), 3);
    assert_eq!(metrics.handled.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.errors.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.auth_failures.load(Ordering::Relaxed), 1);
}
