// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Slack Gateway - signed webhook ingestion and dispatch for multi-tenant Slack apps.
//!
//! One process serves every workspace the app is installed in. Each callback
//! is authenticated with the app's signing secret, classified, matched to the
//! workspace's bot token and handed to exactly one registered handler.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            SLACK GATEWAY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐                 │
//! │  │ /P/commands │  │  /P/events  │  │ /P/ (interactions)│                │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬─────────┘                 │
//! │         └────────────────┼──────────────────┘                           │
//! │                  ┌───────┴────────┐                                     │
//! │                  │  TracingLayer  │                                     │
//! │                  └───────┬────────┘                                     │
//! │  ┌───────────────────────┴────────────────────────────┐                 │
//! │  │                    Dispatcher                       │                │
//! │  │  signature → classifier → credentials → RouteTable  │                │
//! │  └───────────────────────┬────────────────────────────┘                 │
//! └──────────────────────────┼──────────────────────────────────────────────┘
//!                            │
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!   CredentialResolver    Handler          ErrorHandler
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use slack_gateway::{GatewayConfig, RequestContext, SlackApp};
//!
//! let (app, tokens) = SlackApp::in_memory(config)?;
//! tokens.store("T0123", "xoxb-...");
//! app.on_command("/ping", |ctx: &mut RequestContext| {
//!     ctx.response.text(StatusCode::OK, "pong");
//! });
//! let server = app.start().await?;
//! ```
//!
//! # Security
//!
//! - HMAC-SHA256 request signatures, compared in constant time
//! - Optional replay window on `X-Slack-Request-Timestamp`
//! - Request body size limit
//! - Bot tokens never appear in `Debug` output

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod dispatcher;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use adapters::InMemoryTokenStore;
pub use dispatcher::Dispatcher;
pub use domain::config::{ErrorStatusPolicy, GatewayConfig};
pub use domain::context::{RequestContext, RequestParts, ResponseWriter};
pub use domain::error::{ClassificationError, DispatchError, GatewayError};
pub use domain::routes::RouteTable;
pub use domain::types::*;
pub use middleware::signature::{compute_signature, verify, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use middleware::DispatchMetrics;
pub use ports::{CredentialResolver, ErrorHandler, Handler, TimeSource, TokenStore};
pub use service::{ServerHandle, SlackApp};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
