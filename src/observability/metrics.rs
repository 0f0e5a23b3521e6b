//! Metrics collection and exposition.
//!
//! # Metrics
//! - `provider_startup_stages_total` (counter): startup steps by stage, result
//! - `provider_resource_close_total` (counter): close attempts by resource, result
//! - `provider_resource_close_duration_seconds` (histogram): close latency by resource
//! - `provider_watchdog_fired_total` (counter): forced terminations
//! - `provider_tasks_enqueued_total` (counter): tasks pushed onto the provider queue
//! - `provider_advertisements_published_total` (counter)
//! - `provider_announcements_served_total` (counter)
//! - `provider_monitor_fetches_total` (counter): monitor polls by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exposition is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

pub fn record_startup_stage(stage: &'static str, ok: bool) {
    counter!("provider_startup_stages_total", "stage" => stage, "result" => result_label(ok))
        .increment(1);
}

pub fn record_resource_close(resource: &'static str, ok: bool, started: Instant) {
    counter!("provider_resource_close_total", "resource" => resource, "result" => result_label(ok))
        .increment(1);
    histogram!("provider_resource_close_duration_seconds", "resource" => resource)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_watchdog_fired() {
    counter!("provider_watchdog_fired_total").increment(1);
}

pub fn record_task_enqueued(source: &str) {
    counter!("provider_tasks_enqueued_total", "source" => source.to_string()).increment(1);
}

pub fn record_advertisement_published() {
    counter!("provider_advertisements_published_total").increment(1);
}

pub fn record_announcement_served() {
    counter!("provider_announcements_served_total").increment(1);
}

pub fn record_monitor_fetch(outcome: &'static str) {
    counter!("provider_monitor_fetches_total", "outcome" => outcome).increment(1);
}
