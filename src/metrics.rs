// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus self-metrics for the Datadog operator.
//!
//! This module provides metrics about the forwarders themselves with the namespace
//! prefix `datadog_operator_`. These are scraped from the operator's `/metrics`
//! endpoint; they are unrelated to the gauges forwarded to Datadog.
//!
//! # Metrics Categories
//!
//! - **Forwarder Lifecycle Metrics** - Track running forwarder tasks
//! - **Forwarding Metrics** - Track forwarding cycle outcomes and duration
//! - **Telemetry Loss Metrics** - Track reconcile errors and events dropped on full channels
//! - **Datadog API Metrics** - Track outbound API requests
//! - **Secret Backend Metrics** - Track credential cache hits and decrypt calls
//!
//! # Example
//!
//! ```rust,no_run
//! use datadog_operator::metrics::record_cycle_success;
//!
//! record_cycle_success("DatadogAgent", std::time::Duration::from_millis(250));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator self-metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "datadog_operator";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Forwarder Lifecycle Metrics
// ============================================================================

/// Number of running forwarder tasks
///
/// Labels:
/// - `kind`: Kind of the monitored object (e.g., `DatadogAgent`)
pub static FORWARDERS_ACTIVE: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_forwarders_active"),
        "Number of running metrics forwarders by monitored kind",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Forwarding Metrics
// ============================================================================

/// Total number of connection attempts and forwarding cycles by outcome
///
/// Labels:
/// - `kind`: Kind of the monitored object
/// - `outcome`: `success` or the failure reason (e.g., `InvalidCredentials`)
pub static FORWARD_CYCLES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_forward_cycles_total"),
        "Total number of forwarding cycles by monitored kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of forwarding cycles in seconds
///
/// Labels:
/// - `kind`: Kind of the monitored object
pub static FORWARD_CYCLE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_forward_cycle_duration_seconds"),
        "Duration of forwarding cycles in seconds by monitored kind",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Telemetry Loss Metrics
// ============================================================================

/// Total number of reconcile errors and events dropped before reaching a forwarder
///
/// Labels:
/// - `kind`: Kind of the monitored object
/// - `channel`: `error` or `event`
/// - `reason`: `full`, `closed` or `unregistered`
pub static DROPPED_TELEMETRY_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_forwarder_dropped_telemetry_total"),
        "Total number of reconcile errors and events dropped by forwarders",
    );
    let counter = CounterVec::new(opts, &["kind", "channel", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Datadog API Metrics
// ============================================================================

/// Total number of Datadog API requests by endpoint and outcome
///
/// Labels:
/// - `endpoint`: `validate`, `series` or `events`
/// - `outcome`: `success` or `error`
pub static DATADOG_API_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_datadog_api_requests_total"),
        "Total number of Datadog API requests by endpoint and outcome",
    );
    let counter = CounterVec::new(opts, &["endpoint", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Secret Backend Metrics
// ============================================================================

/// Total number of encrypted credential resolutions by outcome
///
/// Labels:
/// - `outcome`: `cache_hit`, `decrypted` or `error`
pub static SECRET_RESOLUTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_secret_resolutions_total"),
        "Total number of encrypted credential resolutions by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a forwarder task start
///
/// # Arguments
/// * `kind` - Kind of the monitored object
pub fn record_forwarder_started(kind: &str) {
    FORWARDERS_ACTIVE.with_label_values(&[kind]).inc();
}

/// Record a forwarder task exit
///
/// # Arguments
/// * `kind` - Kind of the monitored object
pub fn record_forwarder_stopped(kind: &str) {
    FORWARDERS_ACTIVE.with_label_values(&[kind]).dec();
}

/// Record a successful connection attempt or forwarding cycle
///
/// # Arguments
/// * `kind` - Kind of the monitored object
/// * `duration` - Duration of the cycle
pub fn record_cycle_success(kind: &str, duration: Duration) {
    FORWARD_CYCLES_TOTAL
        .with_label_values(&[kind, "success"])
        .inc();
    FORWARD_CYCLE_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a failed connection attempt or forwarding cycle
///
/// # Arguments
/// * `kind` - Kind of the monitored object
/// * `reason` - Condition reason of the failure
/// * `duration` - Duration of the cycle before failure
pub fn record_cycle_error(kind: &str, reason: &str, duration: Duration) {
    FORWARD_CYCLES_TOTAL.with_label_values(&[kind, reason]).inc();
    FORWARD_CYCLE_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a dropped reconcile error or event
///
/// # Arguments
/// * `kind` - Kind of the monitored object
/// * `channel` - `error` or `event`
/// * `reason` - `full`, `closed` or `unregistered`
pub fn record_dropped_telemetry(kind: &str, channel: &str, reason: &str) {
    DROPPED_TELEMETRY_TOTAL
        .with_label_values(&[kind, channel, reason])
        .inc();
}

/// Record a Datadog API request
///
/// # Arguments
/// * `endpoint` - `validate`, `series` or `events`
/// * `success` - Whether the request eventually succeeded
pub fn record_api_request(endpoint: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    DATADOG_API_REQUESTS_TOTAL
        .with_label_values(&[endpoint, outcome])
        .inc();
}

/// Record an encrypted credential resolution
///
/// # Arguments
/// * `outcome` - `cache_hit`, `decrypted` or `error`
pub fn record_secret_resolution(outcome: &str) {
    SECRET_RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
