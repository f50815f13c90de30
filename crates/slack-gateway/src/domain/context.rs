//! Per-request context handed to exactly one handler.

use crate::domain::types::{ClassifiedEvent, TeamId};
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// The transport-level view of the inbound request.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestParts {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// Header value as UTF-8, `None` if absent or not valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl From<&axum::http::request::Parts> for RequestParts {
    fn from(parts: &axum::http::request::Parts) -> Self {
        Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone())
    }
}

/// Buffered response that handlers and error callbacks write into.
///
/// A writer nobody touched turns into `200 OK` with an empty body.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Set a header from text; invalid names or values are skipped with a warning.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "Skipping invalid response header"),
        }
    }

    /// Append bytes to the body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Headers, status and body in one call.
    pub fn respond(&mut self, status: StatusCode, body: impl Into<Vec<u8>>, headers: &[(&str, &str)]) {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self.status = status;
        self.body = body.into();
    }

    /// Plain-text response.
    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) {
        self.insert_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.status = status;
        self.body = body.into().into_bytes();
    }

    /// JSON response.
    ///
    /// # Errors
    ///
    /// Returns the serialization error and leaves the writer untouched.
    pub fn json<T: Serialize>(&mut self, status: StatusCode, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.status = status;
        self.body = body;
        Ok(())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Everything a handler needs to answer one Slack callback.
pub struct RequestContext {
    /// Correlates log lines for this request
    pub request_id: Uuid,
    /// Raw body exactly as signed
    pub body: Bytes,
    /// Bot token for the workspace
    pub token: String,
    /// Workspace the callback came from
    pub team_id: TeamId,
    /// Classification that selected the handler
    pub event: ClassifiedEvent,
    /// Inbound request metadata
    pub request: RequestParts,
    /// Response the handler writes into
    pub response: ResponseWriter,
}

impl RequestContext {
    /// First value of a URL-encoded form field in the body (commands and
    /// interactions), e.g. `text`, `user_id` or `response_url`.
    pub fn form_field(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(&self.body)
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("team_id", &self.team_id)
            .field("event", &self.event)
            .field("body_len", &self.body.len())
            .field("token", &"<redacted>")
            .finish()
    }
}
