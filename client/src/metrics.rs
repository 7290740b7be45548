//! # Prometheus Metrics
//!
//! Counters for the transaction pipeline. Every [`ClientMetrics`] owns its
//! own [`prometheus::Registry`], so two clients in one process never
//! collide and nothing is registered globally. Embedders that already
//! scrape a registry can pull families out with [`ClientMetrics::gather`].

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Handles for every pipeline metric. Cheap to clone.
#[derive(Clone)]
pub struct ClientMetrics {
    registry: Registry,
    /// Submissions sent to the node, retries included.
    pub submit_attempts_total: IntCounter,
    /// Submissions the node rejected with a nonce conflict.
    pub nonce_conflicts_total: IntCounter,
    /// Times the nonce cache was rebound to the node's state.
    pub nonce_rebinds_total: IntCounter,
    /// Requests that ended in an error.
    pub requests_failed_total: IntCounter,
    /// Requests that ended with a committed transaction.
    pub requests_succeeded_total: IntCounter,
    /// Wall time of a whole request, retries and sleeps included.
    pub request_latency_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl ClientMetrics {
    /// Create and register all metrics under `prefix`.
    pub fn new(prefix: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(prefix.to_string()), None)?;

        let submit_attempts_total = register(
            &registry,
            IntCounter::new(
                "submit_attempts_total",
                "Transactions submitted to the node, retries included",
            )?,
        )?;
        let nonce_conflicts_total = register(
            &registry,
            IntCounter::new(
                "nonce_conflicts_total",
                "Submissions rejected with NONCE_TOO_LOW or DUPLICATE_NONCE",
            )?,
        )?;
        let nonce_rebinds_total = register(
            &registry,
            IntCounter::new(
                "nonce_rebinds_total",
                "Nonce cache rebinds to the node's account state",
            )?,
        )?;
        let requests_failed_total = register(
            &registry,
            IntCounter::new("requests_failed_total", "Requests that ended in an error")?,
        )?;
        let requests_succeeded_total = register(
            &registry,
            IntCounter::new(
                "requests_succeeded_total",
                "Requests that ended with a committed transaction",
            )?,
        )?;
        let request_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "request_latency_seconds",
                    "Request latency in seconds, retries included",
                )
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            submit_attempts_total,
            nonce_conflicts_total,
            nonce_rebinds_total,
            requests_failed_total,
            requests_succeeded_total,
            request_latency_seconds,
        })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("submit_attempts_total", &self.submit_attempts_total.get())
            .field("requests_succeeded_total", &self.requests_succeeded_total.get())
            .field("requests_failed_total", &self.requests_failed_total.get())
            .finish()
    }
}
