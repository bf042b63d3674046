//! Metrics collection and exposition.
//!
//! # Metrics
//! - `metronome_subscribers` (gauge): current hub members
//! - `metronome_publishes_total` (counter): frames published by the hub
//! - `metronome_deliveries_total` (counter): frames queued to subscribers
//! - `metronome_slow_consumers_total` (counter): members evicted for a full queue
//! - `metronome_rounds_total` (counter): collection rounds, by outcome
//! - `metronome_plugin_failures_total` (counter): skipped plugin snapshots, by plugin and reason

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_subscribers(count: usize) {
    metrics::gauge!("metronome_subscribers").set(count as f64);
}

pub fn record_publish(recipients: usize) {
    metrics::counter!("metronome_publishes_total").increment(1);
    metrics::counter!("metronome_deliveries_total").increment(recipients as u64);
}

pub fn record_slow_consumer() {
    metrics::counter!("metronome_slow_consumers_total").increment(1);
}

pub fn record_round(outcome: &'static str) {
    metrics::counter!("metronome_rounds_total", "outcome" => outcome).increment(1);
}

pub fn record_plugin_failure(plugin: &str, reason: &'static str) {
    metrics::counter!(
        "metronome_plugin_failures_total",
        "plugin" => plugin.to_string(),
        "reason" => reason
    )
    .increment(1);
}
