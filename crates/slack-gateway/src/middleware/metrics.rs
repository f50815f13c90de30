//! Dispatch counters.
//!
//! Plain atomics; the runtime logs a snapshot at shutdown and embedders can
//! export [`DispatchMetrics::to_json`] however they like.

use crate::domain::error::DispatchError;
use crate::domain::types::CallbackFamily;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for the dispatch pipeline
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    // Inbound, per callback family
    pub commands_received: AtomicU64,
    pub interactions_received: AtomicU64,
    pub events_received: AtomicU64,

    pub url_verifications: AtomicU64,
    pub handled: AtomicU64,

    // Failures
    pub auth_failures: AtomicU64,
    pub errors: AtomicU64,
    pub handler_timeouts: AtomicU64,

    // Latency tracking (simplified - in production use histograms)
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, family: CallbackFamily) {
        let counter = match family {
            CallbackFamily::Commands => &self.commands_received,
            CallbackFamily::Interactions => &self.interactions_received,
            CallbackFamily::Events => &self.events_received,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_url_verification(&self) {
        self.url_verifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed dispatch
    pub fn record_error(&self, error: &DispatchError) {
        match error {
            DispatchError::Authentication => {
                self.auth_failures.fetch_add(1, Ordering::Relaxed);
            }
            DispatchError::HandlerTimeout { .. } => {
                self.handler_timeouts.fetch_add(1, Ordering::Relaxed);
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_latency(&self, latency_ms: u64) {
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn received_total(&self) -> u64 {
        self.commands_received.load(Ordering::Relaxed)
            + self.interactions_received.load(Ordering::Relaxed)
            + self.events_received.load(Ordering::Relaxed)
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "received": {
                "total": self.received_total(),
                "commands": self.commands_received.load(Ordering::Relaxed),
                "interactions": self.interactions_received.load(Ordering::Relaxed),
                "events": self.events_received.load(Ordering::Relaxed),
            },
            "url_verifications": self.url_verifications.load(Ordering::Relaxed),
            "handled": self.handled.load(Ordering::Relaxed),
            "failures": {
                "authentication": self.auth_failures.load(Ordering::Relaxed),
                "errors": self.errors.load(Ordering::Relaxed),
                "handler_timeouts": self.handler_timeouts.load(Ordering::Relaxed),
            },
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<DispatchMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_latency(latency_ms);
    }
}
