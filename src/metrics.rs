use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder
///
/// Fails if a global recorder is already installed (e.g. a second call in tests).
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "query_monitor_observations_total",
        "Query observations accepted into the buffer"
    );
    describe_counter!(
        "query_monitor_observations_skipped_total",
        "Query observations ignored (collector disabled or self-referencing)"
    );
    describe_counter!(
        "query_monitor_flushed_total",
        "Observations persisted to the database"
    );
    describe_counter!(
        "query_monitor_flush_failures_total",
        "Observations dropped because a flush failed"
    );
    describe_histogram!(
        "query_monitor_flush_duration_seconds",
        "Time spent persisting one batch"
    );
    describe_gauge!(
        "query_monitor_pending_observations",
        "Observations waiting in the in-memory buffer"
    );
    describe_gauge!(
        "query_monitor_info",
        "Query monitor version information"
    );

    gauge!("query_monitor_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_observation() {
    counter!("query_monitor_observations_total").increment(1);
}

pub fn record_skipped(reason: &'static str) {
    counter!("query_monitor_observations_skipped_total", "reason" => reason).increment(1);
}

pub fn record_flush(count: usize, elapsed: Duration) {
    counter!("query_monitor_flushed_total").increment(count as u64);
    histogram!("query_monitor_flush_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_flush_failure(count: usize) {
    counter!("query_monitor_flush_failures_total").increment(count as u64);
}

pub fn set_pending(depth: usize) {
    gauge!("query_monitor_pending_observations").set(depth as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // No global recorder is installed in unit tests; calls must not panic.
        record_observation();
        record_skipped("disabled");
        record_flush(3, Duration::from_millis(5));
        record_flush_failure(1);
        set_pending(7);
    }
}
