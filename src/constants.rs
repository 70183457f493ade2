// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Datadog operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Datadog CRDs
pub const API_GROUP: &str = "datadoghq.com";

/// API version for the monitored Datadog CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Kind name for `DatadogAgent` resource
pub const KIND_DATADOG_AGENT: &str = "DatadogAgent";

/// Kind name for `DatadogAgentInternal` resource
pub const KIND_DATADOG_AGENT_INTERNAL: &str = "DatadogAgentInternal";

/// Kind name for `DatadogMonitor` resource
pub const KIND_DATADOG_MONITOR: &str = "DatadogMonitor";

/// Field manager used when patching status
pub const FIELD_MANAGER: &str = "datadog-operator";

// ============================================================================
// Datadog API Constants
// ============================================================================

/// Default Datadog API base URL when neither `ddUrl` nor `site` is set
pub const DEFAULT_BASE_URL: &str = "https://api.datadoghq.com";

/// Credential validation endpoint
pub const VALIDATE_PATH: &str = "/api/v1/validate";

/// Metric submission endpoint
pub const SERIES_PATH: &str = "/api/v1/series";

/// Event submission endpoint
pub const EVENTS_PATH: &str = "/api/v1/events";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "DD-API-KEY";

/// Header carrying the application key
pub const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";

/// Source type attached to every event
pub const EVENT_SOURCE_TYPE: &str = "datadog_operator";

/// Metric type used for every submitted series
pub const GAUGE_TYPE: &str = "gauge";

/// Default per-request timeout for Datadog API calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Forwarder Constants
// ============================================================================

/// Default interval between two connection attempts
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default interval between two metric forwarding cycles
pub const DEFAULT_SEND_INTERVAL_SECS: u64 = 15;

/// Default metric name prefix
pub const DEFAULT_METRICS_PREFIX: &str = "datadog.operator";

/// Capacity of a forwarder's reconcile error channel
pub const ERROR_CHANNEL_CAPACITY: usize = 100;

/// Capacity of a forwarder's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Default key holding the API key in a credentials Secret
pub const DEFAULT_API_KEY_KEY: &str = "api_key";

/// Default key holding the APP key in a credentials Secret
pub const DEFAULT_APP_KEY_KEY: &str = "app_key";

// ============================================================================
// Metric Values and Names
// ============================================================================

/// Gauge value reported for a healthy deployment, monitor condition or reconcile
pub const SUCCESS_VALUE: f64 = 1.0;

/// Gauge value reported for an unhealthy deployment, monitor condition or reconcile
pub const FAILURE_VALUE: f64 = 0.0;

/// Suffix for deployment gauges: `<prefix>.<component>.deployment.success`
pub const DEPLOYMENT_METRIC_SUFFIX: &str = "deployment.success";

/// Suffix for the reconcile gauge: `<prefix>.reconcile.success`
pub const RECONCILE_METRIC_SUFFIX: &str = "reconcile.success";

/// Infix for monitor gauges: `<prefix>.monitor.<condition>`
pub const MONITOR_METRIC_INFIX: &str = "monitor";

/// Component name of the node agent
pub const COMPONENT_AGENT: &str = "agent";

/// Component name of the cluster agent
pub const COMPONENT_CLUSTER_AGENT: &str = "clusteragent";

/// Component name of the cluster checks runner
pub const COMPONENT_CLUSTER_CHECKS_RUNNER: &str = "clustercheckrunner";

// ============================================================================
// Tag Prefixes
// ============================================================================

pub const TAG_CR_NAMESPACE: &str = "cr_namespace";
pub const TAG_CR_NAME: &str = "cr_name";
pub const TAG_CLUSTER_NAME: &str = "cluster_name";
pub const TAG_STATE: &str = "state";
pub const TAG_RECONCILE_ERR: &str = "reconcile_err";
pub const TAG_MONITOR_ID: &str = "monitor_id";
pub const TAG_MONITOR_STATE: &str = "monitor_state";
pub const TAG_MONITOR_SYNC_STATUS: &str = "monitor_sync_status";

/// Value of `reconcile_err` when the last reconcile succeeded
pub const RECONCILE_ERR_NULL: &str = "null";

// ============================================================================
// Status Condition Constants
// ============================================================================

/// Condition type reflecting the health of metrics forwarding
pub const CONDITION_ACTIVE_DATADOG_METRICS: &str = "ActiveDatadogMetrics";

/// Condition message when forwarding is healthy
pub const FORWARDING_OK_MESSAGE: &str = "Datadog metrics forwarding ok";

/// Interval between two status publication passes
pub const STATUS_PUBLISH_INTERVAL_SECS: u64 = 30;

// ============================================================================
// Secret Backend Constants
// ============================================================================

/// Prefix of an encrypted credential value
pub const ENC_PREFIX: &str = "ENC[";

/// Suffix of an encrypted credential value
pub const ENC_SUFFIX: &str = "]";

/// Version of the secret backend payload
pub const SECRET_BACKEND_PAYLOAD_VERSION: &str = "1.0";

/// Default secret backend command timeout
pub const DEFAULT_SECRET_BACKEND_TIMEOUT_SECS: u64 = 30;

/// Default maximum secret backend output size (1 MiB)
pub const DEFAULT_SECRET_BACKEND_OUTPUT_MAX_BYTES: usize = 1024 * 1024;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the metrics and health server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8383";
