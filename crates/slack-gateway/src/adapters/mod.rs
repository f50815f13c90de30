//! Adapters for the Slack Gateway.
//!
//! Infrastructure implementations of the outbound ports.

pub mod token_store;

pub use token_store::InMemoryTokenStore;
