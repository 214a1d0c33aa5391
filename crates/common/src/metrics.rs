//! Metrics collection for FarmDispatch
//!
//! This module provides Prometheus metrics for observability.
//! Nothing here feeds back into server selection.

use crate::error::{DispatchError, Result};
use lazy_static::lazy_static;
use prometheus::{Histogram, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics registry for FarmDispatch
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub dispatch: DispatchMetrics,
    pub worker: WorkerMetrics,
}

/// Coordinator dispatch metrics
#[derive(Debug, Clone)]
pub struct DispatchMetrics {
    /// Total number of inbound assignment requests
    pub requests_total: IntCounter,

    /// Requests that came back with a backend decision
    pub assigned_total: IntCounter,

    /// Requests answered with the no-capacity status
    pub no_capacity_total: IntCounter,

    /// Forwarding calls that failed or timed out
    pub downstream_failures_total: IntCounter,

    /// Exclusion entries that could not be parsed
    pub malformed_exclusions_total: IntCounter,

    /// Duration of the forwarding call
    pub forward_duration: Histogram,
}

/// Worker-side session metrics
#[derive(Debug, Clone)]
pub struct WorkerMetrics {
    /// Sessions opened
    pub sessions_opened_total: IntCounter,

    /// Session requests refused for lack of capacity
    pub sessions_rejected_total: IntCounter,

    /// Sessions dropped by the idle reaper
    pub sessions_expired_total: IntCounter,

    /// Currently open sessions
    pub active_sessions: IntGauge,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        // Dispatch metrics
        let requests_total = IntCounter::new(
            "dispatch_requests_total",
            "Total number of assignment requests"
        ).unwrap();

        let assigned_total = IntCounter::new(
            "dispatch_assigned_total",
            "Requests answered with a backend decision"
        ).unwrap();

        let no_capacity_total = IntCounter::new(
            "dispatch_no_capacity_total",
            "Requests rejected because every server was excluded"
        ).unwrap();

        let downstream_failures_total = IntCounter::new(
            "dispatch_downstream_failures_total",
            "Forwarding calls that failed or timed out"
        ).unwrap();

        let malformed_exclusions_total = IntCounter::new(
            "dispatch_malformed_exclusions_total",
            "Exclusion entries skipped because they are not host:port"
        ).unwrap();

        let forward_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "dispatch_forward_duration_seconds",
                "Forwarding call duration in seconds"
            ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
        ).unwrap();

        // Worker metrics
        let sessions_opened_total = IntCounter::new(
            "worker_sessions_opened_total",
            "Total number of sessions opened"
        ).unwrap();

        let sessions_rejected_total = IntCounter::new(
            "worker_sessions_rejected_total",
            "Session requests refused at capacity"
        ).unwrap();

        let sessions_expired_total = IntCounter::new(
            "worker_sessions_expired_total",
            "Sessions dropped after idling past their TTL"
        ).unwrap();

        let active_sessions = IntGauge::new(
            "worker_active_sessions",
            "Current number of open sessions"
        ).unwrap();

        // Register all metrics
        registry.register(Box::new(requests_total.clone())).unwrap();
        registry.register(Box::new(assigned_total.clone())).unwrap();
        registry.register(Box::new(no_capacity_total.clone())).unwrap();
        registry.register(Box::new(downstream_failures_total.clone())).unwrap();
        registry.register(Box::new(malformed_exclusions_total.clone())).unwrap();
        registry.register(Box::new(forward_duration.clone())).unwrap();

        registry.register(Box::new(sessions_opened_total.clone())).unwrap();
        registry.register(Box::new(sessions_rejected_total.clone())).unwrap();
        registry.register(Box::new(sessions_expired_total.clone())).unwrap();
        registry.register(Box::new(active_sessions.clone())).unwrap();

        let dispatch = DispatchMetrics {
            requests_total,
            assigned_total,
            no_capacity_total,
            downstream_failures_total,
            malformed_exclusions_total,
            forward_duration,
        };

        let worker = WorkerMetrics {
            sessions_opened_total,
            sessions_rejected_total,
            sessions_expired_total,
            active_sessions,
        };

        MetricsRegistry {
            registry,
            dispatch,
            worker,
        }
    }

    /// Gather all metrics as text
    pub fn gather(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| DispatchError::internal(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| DispatchError::internal(format!("Metrics are not UTF-8: {}", e)))
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry() {
        let metrics = MetricsRegistry::new();

        metrics.dispatch.requests_total.inc();
        metrics.dispatch.no_capacity_total.inc();
        metrics.worker.active_sessions.set(3);

        let output = metrics.gather().unwrap();
        assert!(output.contains("dispatch_requests_total 1"));
        assert!(output.contains("dispatch_no_capacity_total 1"));
        assert!(output.contains("worker_active_sessions 3"));
    }
}
