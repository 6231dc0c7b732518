//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Notifications**: Values submitted to the broadcaster, deliveries and drops
//! - **Streams**: Live subscriber count and finished stream calls by outcome
//! - **Extraction**: Requests processed, finished calls by outcome, engine latency
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::infrastructure::broadcast::Delivery;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Notification counters
    describe_counter!(
        "greet_notifications_submitted_total",
        "Total names submitted to the broadcaster"
    );
    describe_counter!(
        "greet_notifications_delivered_total",
        "Total per-subscriber deliveries"
    );
    describe_counter!(
        "greet_notifications_dropped_total",
        "Total per-subscriber drops due to full buffers"
    );

    // Stream calls
    describe_gauge!(
        "greet_stream_subscribers",
        "Number of registered stream subscribers"
    );
    describe_counter!(
        "greet_stream_calls_total",
        "Total finished stream calls by outcome"
    );

    // Extraction
    describe_counter!(
        "greet_extraction_requests_total",
        "Total extraction requests answered"
    );
    describe_counter!(
        "greet_extraction_calls_total",
        "Total finished extraction calls by outcome"
    );
    describe_histogram!(
        "greet_extraction_seconds",
        "Time spent in the extraction engine per request"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one `submit` and its fan-out result.
pub fn record_notification(delivery: Delivery) {
    counter!("greet_notifications_submitted_total").increment(1);
    counter!("greet_notifications_delivered_total").increment(delivery.delivered as u64);
    counter!("greet_notifications_dropped_total").increment(delivery.dropped as u64);
}

/// Update the registered subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_stream_subscribers(count: usize) {
    gauge!("greet_stream_subscribers").set(count as f64);
}

/// Record a finished stream call.
pub fn record_stream_call(outcome: &'static str) {
    counter!("greet_stream_calls_total", "outcome" => outcome).increment(1);
}

/// Record answered extraction requests.
pub fn record_extraction_requests(count: u64) {
    counter!("greet_extraction_requests_total").increment(count);
}

/// Record a finished extraction call.
pub fn record_extraction_call(outcome: &'static str) {
    counter!("greet_extraction_calls_total", "outcome" => outcome).increment(1);
}

/// Record time spent in the extraction engine for one request.
pub fn record_extraction_duration(duration: Duration) {
    histogram!("greet_extraction_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_notification(Delivery {
            delivered: 2,
            dropped: 1,
        });
        set_stream_subscribers(3);
        record_stream_call("closed");
        record_extraction_requests(4);
        record_extraction_call("done");
        record_extraction_duration(Duration::from_millis(5));
    }

    #[test]
    fn renders_registered_metrics() {
        let handle = init_metrics();
        record_stream_call("cancelled");
        record_extraction_duration(Duration::from_millis(1));

        let rendered = handle.render();
        assert!(rendered.contains("greet_stream_calls_total"));
        assert!(rendered.contains("outcome=\"cancelled\""));
        assert!(get_metrics_handle().is_some());
    }
}
