//! # Slack Gateway Runtime
//!
//! Process entry point for the Slack gateway.
//!
//! ## Startup Sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `slack_gateway=info,gateway_runtime=info`)
//! 2. Load configuration from the environment
//! 3. Seed workspace tokens into the in-memory store
//! 4. Register built-in handlers and the `metrics` route
//! 5. Serve until SIGINT/SIGTERM, then drain within the grace period

mod config;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use slack_gateway::{RequestContext, SlackApp, TokenStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVES: &str = "slack_gateway=info,gateway_runtime=info";

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to install tracing subscriber")
}

/// Handlers every deployment gets.
fn register_builtin_handlers(app: &mut SlackApp) -> Result<()> {
    app.on_command("/ping", |ctx: &mut RequestContext| {
        let reply = serde_json::json!({
            "response_type": "ephemeral",
            "text": "pong",
        });
        if let Err(e) = ctx.response.json(StatusCode::OK, &reply) {
            warn!(error = %e, "Failed to encode /ping reply");
        }
    });

    app.on_event("app_uninstalled", |ctx: &mut RequestContext| {
        info!(team_id = %ctx.team_id, "App uninstalled from workspace");
    });

    let metrics = app.metrics();
    app.custom_route(
        "metrics",
        get(move || {
            let metrics = metrics.clone();
            async move { Json(metrics.to_json()) }
        }),
    )?;

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let runtime_config = config::load_config().context("failed to load configuration")?;

    let (mut app, tokens) = SlackApp::in_memory(runtime_config.gateway)?;
    for (team_id, token) in &runtime_config.workspace_tokens {
        tokens.store(team_id, token);
    }
    info!(workspaces = tokens.len(), "Seeded workspace tokens");

    register_builtin_handlers(&mut app)?;

    let server = app.start().await?;
    info!(addr = %server.local_addr(), "Gateway is running. Press Ctrl+C to stop.");

    shutdown_signal().await;

    let metrics = app.metrics();
    server.shutdown().await?;
    info!(metrics = %metrics.to_json(), "Shutdown complete");

    Ok(())
}
