//! Prometheus metrics for the lifecycle engine.
//!
//! Five series cover the engine's hot paths: request creation, committed
//! transitions (labelled by resulting status), CAS conflicts, notification
//! fan-out, and open subscriptions. The engine records unconditionally;
//! until an exporter installs the global recorder the macros are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use hxp_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new("0.0.0.0:9090".parse()?);
//! exporter.install()?;
//! // Serve exporter.render() output from the application's HTTP surface.
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge};

/// Requests created.
pub const REQUESTS_CREATED: &str = "hxp_requests_created_total";
/// Committed lifecycle transitions, labelled by resulting status.
pub const TRANSITIONS: &str = "hxp_transitions_total";
/// Transitions rejected by the CAS guard.
pub const TRANSITION_CONFLICTS: &str = "hxp_transition_conflicts_total";
/// Event frames delivered to subscribers.
pub const NOTIFICATIONS_DELIVERED: &str = "hxp_notifications_delivered_total";
/// Currently open subscriber channels.
pub const SUBSCRIPTIONS_OPEN: &str = "hxp_subscriptions_open";

/// Errors from installing the exporter.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// The global recorder could not be installed
    #[error("failed to install metrics recorder: {0}")]
    Install(String),
}

/// Prometheus exporter for the engine's metric series.
///
/// Owns the scrape handle after [`install`](Self::install); the embedding
/// application decides where [`render`](Self::render) output is served.
pub struct MetricsExporter {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Exporter reporting the given address as its scrape target.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// Idempotent across the process: when a recorder is already installed
    /// (a second exporter, or a test harness) the existing recorder stays
    /// in place and this exporter keeps no scrape handle.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] when installation fails for any
    /// reason other than a recorder already being present.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        describe_metrics();

        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "metrics recorder installed");
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("metrics recorder already installed, reusing it");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Render the current metric values in the Prometheus text format.
    ///
    /// `None` before [`install`](Self::install), or when another exporter
    /// owns the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn describe_metrics() {
    describe_counter!(
        REQUESTS_CREATED,
        "Total number of execution requests created"
    );
    describe_counter!(
        TRANSITIONS,
        "Total number of committed lifecycle transitions, labelled by status"
    );
    describe_counter!(
        TRANSITION_CONFLICTS,
        "Total number of transitions rejected by the CAS guard"
    );
    describe_counter!(
        NOTIFICATIONS_DELIVERED,
        "Total number of lifecycle event frames delivered to subscribers"
    );
    describe_gauge!(
        SUBSCRIPTIONS_OPEN,
        "Number of currently open subscriber channels"
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

    use super::*;

    #[test]
    fn installed_exporter_renders_recorded_series() {
        let mut exporter = MetricsExporter::new("127.0.0.1:9090".parse().unwrap());
        exporter.install().unwrap();

        counter!(REQUESTS_CREATED).increment(1);
        let rendered = exporter.render().unwrap();
        assert!(rendered.contains(REQUESTS_CREATED));
    }
}
