//! Domain types for the Slack gateway.
//!
//! Configuration, errors, payload classification and the handler tables.
//! Nothing in here touches the network.

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod routes;
pub mod types;

// Re-exports for convenience
pub use classifier::{classify, is_url_verification};
pub use config::{
    AppConfig, ConfigError, ErrorStatusPolicy, GatewayConfig, HttpConfig, LimitsConfig,
    SecurityConfig, TimeoutConfig,
};
pub use context::{RequestContext, RequestParts, ResponseWriter};
pub use error::{ClassificationError, DispatchError, DispatchResult, GatewayError};
pub use routes::{RouteTable, SharedHandler};
pub use types::*;
