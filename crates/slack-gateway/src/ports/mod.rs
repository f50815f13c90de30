//! Ports (hexagonal architecture) for the Slack Gateway.

pub mod outbound;

pub use outbound::{CredentialResolver, ErrorHandler, Handler, SystemTimeSource, TimeSource, TokenStore};
