//! Gateway error types.
//!
//! Per-request failures are [`DispatchError`]s and end in an HTTP response.
//! Process-level failures are [`GatewayError`]s and only occur at startup or
//! shutdown.

use crate::domain::config::{ConfigError, ErrorStatusPolicy};
use crate::domain::types::RouteFamily;
use axum::http::StatusCode;
use std::net::SocketAddr;
use std::time::Duration;

/// Why a payload could not be turned into a [`ClassifiedEvent`].
///
/// [`ClassifiedEvent`]: crate::domain::types::ClassifiedEvent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    /// A required field is absent or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field that must hold JSON could not be parsed.
    #[error("malformed JSON in {field}: {reason}")]
    MalformedJson { field: &'static str, reason: String },

    /// Interaction `type` outside the supported set.
    #[error("unrecognized interaction type: {0}")]
    UnrecognizedInteraction(String),
}

impl ClassificationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ClassificationError::MissingField(field) => field,
            ClassificationError::MalformedJson { field, .. } => field,
            ClassificationError::UnrecognizedInteraction(_) => "type",
        }
    }
}

/// A failure scoped to one inbound request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The request body could not be read (transport error or size limit).
    #[error("failed to read request body: {0}")]
    TransportRead(String),

    /// Signature mismatch, missing signature headers or stale timestamp.
    #[error("Unauthorized")]
    Authentication,

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// The workspace never completed installation.
    #[error("app not installed for workspace: {team_id}")]
    CredentialNotFound { team_id: String },

    /// No handler registered for the discriminator.
    #[error("unrecognized {family}: {key}")]
    UnrecognizedRoute { family: RouteFamily, key: String },

    /// The handler ran past the configured deadline.
    #[error("{family} handler `{key}` timed out after {}ms", .timeout.as_millis())]
    HandlerTimeout {
        family: RouteFamily,
        key: String,
        timeout: Duration,
    },
}

impl DispatchError {
    /// Short stable label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::TransportRead(_) => "transport_read",
            DispatchError::Authentication => "authentication",
            DispatchError::Classification(_) => "classification",
            DispatchError::CredentialNotFound { .. } => "credential_not_found",
            DispatchError::UnrecognizedRoute { .. } => "unrecognized_route",
            DispatchError::HandlerTimeout { .. } => "handler_timeout",
        }
    }

    /// Status written by the default error path.
    ///
    /// Authentication failures are always 401 regardless of policy.
    pub fn status_code(&self, policy: ErrorStatusPolicy) -> StatusCode {
        if matches!(self, DispatchError::Authentication) {
            return StatusCode::UNAUTHORIZED;
        }
        match policy {
            ErrorStatusPolicy::Compatible => StatusCode::UNAUTHORIZED,
            ErrorStatusPolicy::Distinct => match self {
                DispatchError::TransportRead(_) | DispatchError::Classification(_) => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::CredentialNotFound { .. } => StatusCode::FORBIDDEN,
                DispatchError::UnrecognizedRoute { .. } => StatusCode::NOT_FOUND,
                DispatchError::HandlerTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                DispatchError::Authentication => StatusCode::UNAUTHORIZED,
            },
        }
    }
}

/// Result type for dispatch steps
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Gateway-level errors (startup, serving, shutdown)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener could not be bound
    #[error("server bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed after binding
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    /// Custom route clashes with a built-in route or another custom route
    #[error("route conflict: {0}")]
    RouteConflict(String),

    /// In-flight requests did not drain within the grace period
    #[error("shutdown grace period of {}ms elapsed with requests in flight", .0.as_millis())]
    ShutdownTimedOut(Duration),
}
