//! Outbound ports: everything the dispatcher calls but does not own.

use crate::domain::context::{RequestContext, RequestParts, ResponseWriter};
use crate::domain::error::DispatchError;
use async_trait::async_trait;

/// Maps a workspace to its bot token.
///
/// Called on the request task; implementations backed by I/O must bound
/// their own latency.
pub trait CredentialResolver: Send + Sync {
    /// Token for `team_id`, `None` if the app is not installed there.
    fn resolve(&self, team_id: &str) -> Option<String>;
}

/// A credential resolver that can also be written to, e.g. by an install flow.
pub trait TokenStore: CredentialResolver {
    fn store(&self, team_id: &str, token: &str);
    fn remove(&self, team_id: &str) -> Option<String>;
}

/// Handles one classified Slack callback.
///
/// The handler writes its own response into `ctx.response`; the dispatcher
/// adds nothing after it returns.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RequestContext);
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(&mut RequestContext) + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut RequestContext) {
        self(ctx)
    }
}

/// Replaces the default error response for every failure except
/// authentication.
pub trait ErrorHandler: Send + Sync + 'static {
    fn on_error(&self, request: &RequestParts, error: &DispatchError, response: &mut ResponseWriter);
}

impl<F> ErrorHandler for F
where
    F: Fn(&RequestParts, &DispatchError, &mut ResponseWriter) + Send + Sync + 'static,
{
    fn on_error(&self, request: &RequestParts, error: &DispatchError, response: &mut ResponseWriter) {
        self(request, error, response)
    }
}

/// Time source trait for testability
pub trait TimeSource: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> u64;
}

/// System time implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0) // Clock before Unix epoch
    }
}
