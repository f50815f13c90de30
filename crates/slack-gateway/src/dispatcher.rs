//! Dispatch orchestrator.
//!
//! One call per inbound callback:
//!
//! ```text
//! read body ─► url_verification? ─yes─► echo body (200, application/json)
//!                   │ no
//!                   ▼
//!            verify signature ─fail─► 401 "Unauthorized" (error handler bypassed)
//!                   ▼
//!               classify ─┐
//!                   ▼     │
//!          resolve token ─┤ fail ─► error handler, or warn! + status per policy
//!                   ▼     │
//!          lookup handler ┤
//!                   ▼     │
//!          invoke handler ┘ (optional deadline)
//! ```

use crate::domain::classifier::{self, is_url_verification};
use crate::domain::config::{ErrorStatusPolicy, GatewayConfig};
use crate::domain::context::{RequestContext, RequestParts, ResponseWriter};
use crate::domain::error::{DispatchError, DispatchResult};
use crate::domain::routes::{RouteTable, SharedHandler};
use crate::domain::types::CallbackFamily;
use crate::middleware::metrics::{DispatchMetrics, RequestTimer};
use crate::middleware::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::middleware::tracing::RequestId;
use crate::ports::outbound::{CredentialResolver, ErrorHandler, SystemTimeSource, TimeSource};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Body of every authentication failure
pub const UNAUTHORIZED_BODY: &str = "Unauthorized";

/// Runs the verify, classify, resolve, route, invoke pipeline.
pub struct Dispatcher {
    signing_secret: String,
    max_body_size: usize,
    max_timestamp_age: Option<Duration>,
    handler_timeout: Option<Duration>,
    error_status: ErrorStatusPolicy,
    routes: Arc<RouteTable>,
    resolver: Arc<dyn CredentialResolver>,
    error_handler: RwLock<Option<Arc<dyn ErrorHandler>>>,
    time_source: Arc<dyn TimeSource>,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    pub fn new(
        config: &GatewayConfig,
        routes: Arc<RouteTable>,
        resolver: Arc<dyn CredentialResolver>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            signing_secret: config.app.signing_secret.clone(),
            max_body_size: config.limits.max_body_size,
            max_timestamp_age: config.security.max_timestamp_age,
            handler_timeout: config.timeouts.handler,
            error_status: config.security.error_status,
            routes,
            resolver,
            error_handler: RwLock::new(None),
            time_source: Arc::new(SystemTimeSource),
            metrics,
        }
    }

    /// Replace the clock used for the replay window.
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.error_handler.write() = Some(handler);
    }

    pub fn clear_error_handler(&self) {
        *self.error_handler.write() = None;
    }

    pub fn has_error_handler(&self) -> bool {
        self.error_handler.read().is_some()
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Buffer the body of `request` and dispatch it.
    pub async fn handle(&self, family: CallbackFamily, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .copied()
            .unwrap_or_default();

        let body = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| e.to_string());

        self.dispatch(family, RequestParts::from(&parts), request_id, body)
            .await
    }

    /// Dispatch one callback whose body has already been read.
    ///
    /// `body` is `Err` when the transport failed or the size limit was hit.
    #[instrument(
        name = "dispatch",
        skip_all,
        fields(family = %family, request_id = %request_id)
    )]
    pub async fn dispatch(
        &self,
        family: CallbackFamily,
        parts: RequestParts,
        request_id: RequestId,
        body: Result<Bytes, String>,
    ) -> Response {
        self.metrics.record_received(family);
        let timer = RequestTimer::new(Arc::clone(&self.metrics));

        let response = match body {
            Ok(body) => self.dispatch_body(family, parts, request_id, body).await,
            Err(reason) => self.fail(&parts, DispatchError::TransportRead(reason)),
        };

        timer.finish();
        response
    }

    async fn dispatch_body(
        &self,
        family: CallbackFamily,
        parts: RequestParts,
        request_id: RequestId,
        body: Bytes,
    ) -> Response {
        // Slack sends the handshake before the app can know its own signature
        // setup, so it is answered without authentication.
        if family == CallbackFamily::Events && is_url_verification(&body) {
            info!("Answering url_verification challenge");
            return self.echo_challenge(body);
        }

        if !self.authenticate(&parts, &body) {
            self.metrics.record_error(&DispatchError::Authentication);
            warn!(path = %parts.uri.path(), "Rejected request with invalid signature");
            return unauthorized();
        }
        debug!("Signature verified");

        match self.route(family, parts.clone(), request_id, body).await {
            Ok(response) => response,
            Err(err) => self.fail(&parts, err),
        }
    }

    /// Steps after authentication; every error here goes through [`Self::fail`].
    async fn route(
        &self,
        family: CallbackFamily,
        parts: RequestParts,
        request_id: RequestId,
        body: Bytes,
    ) -> DispatchResult<Response> {
        let event = classifier::classify(family, &body)?;

        // Only the challenge has no route; one that slipped past the peek
        // (e.g. duplicate keys) still gets its echo.
        let Some((route_family, key)) = event.route().map(|(f, key)| (f, key.to_owned())) else {
            return Ok(self.echo_challenge(body));
        };
        let team_id = event.team_id().unwrap_or_default().to_owned();
        debug!(route = %route_family, key = %key, team_id = %team_id, "Classified");

        let token = self
            .resolver
            .resolve(&team_id)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DispatchError::CredentialNotFound {
                team_id: team_id.clone(),
            })?;

        let handler: SharedHandler = self
            .routes
            .lookup(route_family, &key)
            .ok_or_else(|| DispatchError::UnrecognizedRoute {
                family: route_family,
                key: key.clone(),
            })?;

        let mut ctx = RequestContext {
            request_id: request_id.0,
            body,
            token,
            team_id,
            event,
            request: parts,
            response: ResponseWriter::new(),
        };

        match self.handler_timeout {
            Some(deadline) => {
                if tokio::time::timeout(deadline, handler.handle(&mut ctx))
                    .await
                    .is_err()
                {
                    return Err(DispatchError::HandlerTimeout {
                        family: route_family,
                        key,
                        timeout: deadline,
                    });
                }
            }
            None => handler.handle(&mut ctx).await,
        }

        self.metrics.record_handled();
        info!(route = %route_family, key = %key, team_id = %ctx.team_id, "Handled");
        Ok(ctx.response.into_response())
    }

    fn authenticate(&self, parts: &RequestParts, body: &[u8]) -> bool {
        let timestamp = parts.header(TIMESTAMP_HEADER).unwrap_or_default();
        let supplied = parts.header(SIGNATURE_HEADER).unwrap_or_default();

        if let Some(max_age) = self.max_timestamp_age {
            if !signature::is_timestamp_fresh(timestamp, self.time_source.now(), max_age) {
                debug!(timestamp, "Timestamp outside replay window");
                return false;
            }
        }

        signature::verify(&self.signing_secret, timestamp, body, supplied)
    }

    fn echo_challenge(&self, body: Bytes) -> Response {
        self.metrics.record_url_verification();
        let mut response = Response::new(Body::from(body));
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    /// Error path for everything except authentication.
    fn fail(&self, parts: &RequestParts, err: DispatchError) -> Response {
        self.metrics.record_error(&err);

        let mut writer = ResponseWriter::new();
        let handler = self.error_handler.read().clone();
        match handler {
            Some(handler) => {
                debug!(kind = err.kind(), "Delegating to error handler");
                handler.on_error(parts, &err, &mut writer);
            }
            None => {
                warn!(kind = err.kind(), error = %err, "Dispatch failed");
                writer.text(err.status_code(self.error_status), err.to_string());
            }
        }
        writer.into_response()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .field("error_status", &self.error_status)
            .field("handler_timeout", &self.handler_timeout)
            .field("has_error_handler", &self.has_error_handler())
            .finish_non_exhaustive()
    }
}

fn unauthorized() -> Response {
    let mut writer = ResponseWriter::new();
    writer.text(StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY);
    writer.into_response()
}
