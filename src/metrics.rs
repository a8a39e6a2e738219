//! Prometheus metrics.
//!
//! Thin wrappers over the `metrics` facade. Until [`install`] runs every
//! recording call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use crate::error::{CinelinkError, Result};

/// Install the global Prometheus recorder and return a render handle.
pub fn install() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| CinelinkError::Config(format!("failed to install metrics recorder: {e}")))
}

/// Count one cache lookup, labelled by cache role and hit/miss.
pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("cinelink_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}

/// Count one finished link probe.
pub fn record_probe(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    counter!("cinelink_probes_total", "outcome" => outcome).increment(1);
}

/// Count one finished race.
pub fn record_race(won: bool) {
    let outcome = if won { "winner" } else { "no_winner" };
    counter!("cinelink_races_total", "outcome" => outcome).increment(1);
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "cinelink_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("cinelink_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}
