//! Request-path plumbing shared by every callback route.
//!
//! Layer order: Request → Tracing → BodyLimit → Dispatcher (signature check inside)

pub mod metrics;
pub mod signature;
pub mod tracing;

pub use metrics::{DispatchMetrics, RequestTimer};
pub use signature::{
    compute_signature, constant_time_compare, is_timestamp_fresh, verify, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
pub use tracing::{RequestId, TracingLayer};
