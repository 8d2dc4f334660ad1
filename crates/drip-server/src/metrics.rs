//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// Messages delivered and acked (counter).
pub const MESSAGES_SENT_TOTAL: &str = "messages_sent_total";
/// Sends that failed or were rejected (counter).
pub const SEND_FAILURES_TOTAL: &str = "send_failures_total";
/// Reconnect attempts scheduled (counter).
pub const RECONNECTS_TOTAL: &str = "reconnects_total";
/// Connect attempts that failed or dropped before opening (counter).
pub const RECONNECT_FAILURES_TOTAL: &str = "reconnect_failures_total";
/// Session connectivity (gauge). 1 = connected, 0 = not.
pub const SESSION_CONNECTED: &str = "session_connected";
/// Live dispatch jobs (gauge). 0 or 1 under the single-job policy.
pub const DISPATCH_JOBS_ACTIVE: &str = "dispatch_jobs_active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prometheus_safe() {
        let names = [
            MESSAGES_SENT_TOTAL,
            SEND_FAILURES_TOTAL,
            RECONNECTS_TOTAL,
            RECONNECT_FAILURES_TOTAL,
            SESSION_CONNECTED,
            DISPATCH_JOBS_ACTIVE,
        ];
        for name in names {
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                "bad metric name: {name}"
            );
        }
    }

    #[test]
    fn counter_names_end_in_total() {
        for name in [
            MESSAGES_SENT_TOTAL,
            SEND_FAILURES_TOTAL,
            RECONNECTS_TOTAL,
            RECONNECT_FAILURES_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "counter missing suffix: {name}");
        }
    }
}
