//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_sync_fetch_total` (counter): fetches by group and outcome
//! - `config_sync_listen_total` (counter): long-polls by outcome
//! - `config_sync_publish_total` (counter): snapshots delivered per group
//! - `config_sync_engine_state` (gauge): current engine state code
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus exporter is installed by the agent binary only

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::DataGroup;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_fetch(group: &'static str, outcome: &'static str) {
    counter!("config_sync_fetch_total", "group" => group, "outcome" => outcome).increment(1);
}

pub fn record_listen(outcome: &'static str) {
    counter!("config_sync_listen_total", "outcome" => outcome).increment(1);
}

pub fn record_publish(group: DataGroup) {
    counter!("config_sync_publish_total", "group" => group.as_str()).increment(1);
}

pub fn record_engine_state(code: u8) {
    gauge!("config_sync_engine_state").set(f64::from(code));
}
