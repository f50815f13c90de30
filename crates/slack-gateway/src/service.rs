//! Slack app service - HTTP surface and server lifecycle.
//!
//! Routes, with `P` the configured prefix:
//!
//! | Path           | Method | Family        |
//! |----------------|--------|---------------|
//! | `/`            | any    | liveness, 200 |
//! | `/P/commands`  | POST   | commands      |
//! | `/P/events`    | POST   | events        |
//! | `/P/`, `/P/*`  | POST   | interactions  |
//! | `/P/<custom>`  | any    | custom routes |
//!
//! Everything else is 404.

use crate::adapters::InMemoryTokenStore;
use crate::dispatcher::Dispatcher;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::domain::routes::RouteTable;
use crate::domain::types::{CallbackFamily, RouteFamily};
use crate::middleware::{DispatchMetrics, TracingLayer};
use crate::ports::outbound::{CredentialResolver, ErrorHandler, Handler, SystemTimeSource, TimeSource};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::Response,
    routing::{any, post, MethodRouter},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};

/// Path segments under the prefix owned by the callback routes
const RESERVED_SEGMENTS: [&str; 2] = ["commands", "events"];

/// A Slack app: handler registrations plus the HTTP surface that feeds them.
///
/// Registration methods take `&self` and may be called while serving.
pub struct SlackApp {
    config: GatewayConfig,
    routes: Arc<RouteTable>,
    dispatcher: Arc<Dispatcher>,
    custom_routes: Vec<(String, MethodRouter)>,
}

impl SlackApp {
    /// Create a new Slack app
    pub fn new(
        config: GatewayConfig,
        resolver: Arc<dyn CredentialResolver>,
    ) -> Result<Self, GatewayError> {
        Self::with_time_source(config, resolver, Arc::new(SystemTimeSource))
    }

    /// Create a Slack app whose replay window reads `time_source`.
    pub fn with_time_source(
        config: GatewayConfig,
        resolver: Arc<dyn CredentialResolver>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let routes = Arc::new(RouteTable::new());
        let metrics = Arc::new(DispatchMetrics::new());
        let dispatcher = Dispatcher::new(&config, Arc::clone(&routes), resolver, metrics)
            .with_time_source(time_source);

        info!(
            app = %config.app.name,
            prefix = config.app.route_prefix(),
            "Slack app configured"
        );

        Ok(Self {
            config,
            routes,
            dispatcher: Arc::new(dispatcher),
            custom_routes: Vec::new(),
        })
    }

    /// App backed by an in-memory token store, returned alongside it.
    pub fn in_memory(config: GatewayConfig) -> Result<(Self, Arc<InMemoryTokenStore>), GatewayError> {
        let tokens = Arc::new(InMemoryTokenStore::new());
        let app = Self::new(config, Arc::clone(&tokens) as Arc<dyn CredentialResolver>)?;
        Ok((app, tokens))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        Arc::clone(&self.routes)
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        self.dispatcher.metrics()
    }

    fn register<H: Handler>(&self, family: RouteFamily, key: impl Into<String>, handler: H) {
        let key = key.into();
        if self
            .routes
            .register(family, key.clone(), Arc::new(handler))
            .is_some()
        {
            debug!(%family, key = %key, "Replaced existing handler");
        }
    }

    fn unregister(&self, family: RouteFamily, key: &str) -> bool {
        self.routes.unregister(family, key).is_some()
    }

    /// Handle the slash command `name` (e.g. `/deploy`).
    pub fn on_command<H: Handler>(&self, name: impl Into<String>, handler: H) {
        self.register(RouteFamily::Command, name, handler);
    }

    pub fn remove_command(&self, name: &str) -> bool {
        self.unregister(RouteFamily::Command, name)
    }

    /// Handle global and message shortcuts with `callback_id`.
    pub fn on_shortcut<H: Handler>(&self, callback_id: impl Into<String>, handler: H) {
        self.register(RouteFamily::Shortcut, callback_id, handler);
    }

    pub fn remove_shortcut(&self, callback_id: &str) -> bool {
        self.unregister(RouteFamily::Shortcut, callback_id)
    }

    /// Handle block actions whose first action carries `action_id`.
    pub fn on_action<H: Handler>(&self, action_id: impl Into<String>, handler: H) {
        self.register(RouteFamily::BlockAction, action_id, handler);
    }

    pub fn remove_action(&self, action_id: &str) -> bool {
        self.unregister(RouteFamily::BlockAction, action_id)
    }

    pub fn on_view_submission<H: Handler>(&self, callback_id: impl Into<String>, handler: H) {
        self.register(RouteFamily::ViewSubmission, callback_id, handler);
    }

    pub fn remove_view_submission(&self, callback_id: &str) -> bool {
        self.unregister(RouteFamily::ViewSubmission, callback_id)
    }

    pub fn on_view_close<H: Handler>(&self, callback_id: impl Into<String>, handler: H) {
        self.register(RouteFamily::ViewClose, callback_id, handler);
    }

    pub fn remove_view_close(&self, callback_id: &str) -> bool {
        self.unregister(RouteFamily::ViewClose, callback_id)
    }

    /// Handle Events API callbacks whose `event.type` is `event_type`.
    pub fn on_event<H: Handler>(&self, event_type: impl Into<String>, handler: H) {
        self.register(RouteFamily::Event, event_type, handler);
    }

    pub fn remove_event(&self, event_type: &str) -> bool {
        self.unregister(RouteFamily::Event, event_type)
    }

    /// Take over the response for every failure except authentication.
    pub fn on_error<E: ErrorHandler>(&self, handler: E) {
        self.dispatcher.set_error_handler(Arc::new(handler));
    }

    /// Restore the default error response.
    pub fn clear_error_handler(&self) {
        self.dispatcher.clear_error_handler();
    }

    /// Mount `route` at `/<prefix>/<pattern>`.
    ///
    /// Only affects routers built afterwards.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RouteConflict`] if the pattern is empty, names a
    /// callback route, contains path parameters, or is already mounted.
    pub fn custom_route(&mut self, pattern: &str, route: MethodRouter) -> Result<(), GatewayError> {
        let pattern = pattern.trim_matches('/');

        if pattern.is_empty() {
            return Err(GatewayError::RouteConflict(
                "custom route pattern cannot be empty".into(),
            ));
        }
        if RESERVED_SEGMENTS.contains(&pattern) {
            return Err(GatewayError::RouteConflict(format!(
                "`{pattern}` is a callback route"
            )));
        }
        if pattern.contains([':', '*']) {
            return Err(GatewayError::RouteConflict(format!(
                "`{pattern}` would overlap the interactions catch-all"
            )));
        }
        if self.custom_routes.iter().any(|(existing, _)| existing == pattern) {
            return Err(GatewayError::RouteConflict(format!(
                "`{pattern}` is already mounted"
            )));
        }

        debug!(pattern, "Mounting custom route");
        self.custom_routes.push((pattern.to_string(), route));
        Ok(())
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let prefix = self.config.app.route_prefix();

        let callbacks = Router::new()
            .route("/", any(root))
            .route(&format!("/{prefix}/commands"), post(handle_commands))
            .route(&format!("/{prefix}/events"), post(handle_events))
            .route(&format!("/{prefix}/"), post(handle_interactions))
            .route(&format!("/{prefix}/*rest"), post(handle_interactions))
            .with_state(Arc::clone(&self.dispatcher));

        // Callback routes enforce the limit themselves so that an oversized
        // body reaches the error path; custom routes get the layer.
        let custom = self
            .custom_routes
            .iter()
            .fold(Router::new(), |router, (pattern, route)| {
                router.route(&format!("/{prefix}/{pattern}"), route.clone())
            })
            .layer(RequestBodyLimitLayer::new(self.config.limits.max_body_size));

        callbacks
            .merge(custom)
            .fallback(not_found)
            .layer(TracingLayer::new())
    }

    /// Bind the listener and serve in the background.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Bind`] if the address cannot be bound.
    pub async fn start(&self) -> Result<ServerHandle, GatewayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        info!(addr = %local_addr, app = %self.config.app.name, "Starting Slack gateway");

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(ServerHandle {
            local_addr,
            grace: self.config.timeouts.shutdown_grace,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }
}

impl std::fmt::Debug for SlackApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApp")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field(
                "custom_routes",
                &self
                    .custom_routes
                    .iter()
                    .map(|(pattern, _)| pattern.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Handle to a running server
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    grace: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    ///
    /// Requests still running after the grace period are aborted and
    /// [`GatewayError::ShutdownTimedOut`] is returned.
    pub async fn shutdown(mut self) -> Result<(), GatewayError> {
        info!(addr = %self.local_addr, "Shutting down Slack gateway");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(self.grace, &mut self.task).await {
            Ok(Ok(result)) => {
                result?;
                info!("Slack gateway stopped");
                Ok(())
            }
            Ok(Err(join_err)) => {
                error!(error = %join_err, "Server task failed");
                Err(GatewayError::Serve(std::io::Error::other(join_err)))
            }
            Err(_) => {
                warn!(
                    grace_ms = self.grace.as_millis() as u64,
                    "Grace period elapsed, aborting in-flight requests"
                );
                self.task.abort();
                Err(GatewayError::ShutdownTimedOut(self.grace))
            }
        }
    }
}

async fn root() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn handle_commands(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.handle(CallbackFamily::Commands, request).await
}

async fn handle_events(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.handle(CallbackFamily::Events, request).await
}

async fn handle_interactions(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
) -> Response {
    dispatcher.handle(CallbackFamily::Interactions, request).await
}
