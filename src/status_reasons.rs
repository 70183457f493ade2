// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for metrics forwarding.
//!
//! This module defines constants for condition reasons following Kubernetes conventions.
//! Reasons are programmatic identifiers in `CamelCase` that explain why a condition has
//! a particular status.
//!
//! # Condition Type
//!
//! Every forwarder maintains a single `type: ActiveDatadogMetrics` condition. It is
//! `True` when the last connection attempt or forwarding cycle succeeded and `False`
//! otherwise. The reason names the step that failed.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ActiveDatadogMetrics
//!       status: "True"
//!       reason: MetricsForwardingOk
//!       message: "Datadog metrics forwarding ok"
//! ```
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: ActiveDatadogMetrics
//!       status: "False"
//!       reason: InvalidCredentials
//!       message: "Cannot connect to Datadog API: Invalid Datadog credentials on https://api.datadoghq.com"
//! ```

// ============================================================================
// Success Reasons
// ============================================================================

/// The last attempt connected and forwarded metrics successfully.
pub const REASON_METRICS_FORWARDING_OK: &str = "MetricsForwardingOk";

// ============================================================================
// Credential Reasons
// ============================================================================

/// API or APP key is missing from the spec, the referenced Secret and the operator defaults.
///
/// **Common Causes:**
/// - Referenced Secret does not exist or lacks the key
/// - Operator started without default credentials
pub const REASON_CREDENTIALS_UNAVAILABLE: &str = "CredentialsUnavailable";

/// Encrypted credentials could not be decrypted by the secret backend.
///
/// **Common Causes:**
/// - Secret backend command missing or not executable
/// - Backend returned an error or an empty value for a handle
/// - Backend timed out or produced oversized output
pub const REASON_SECRET_DECRYPTION_FAILED: &str = "SecretDecryptionFailed";

/// The Datadog validate endpoint rejected the API/APP key pair.
pub const REASON_INVALID_CREDENTIALS: &str = "InvalidCredentials";

// ============================================================================
// Connectivity Reasons
// ============================================================================

/// The Datadog API could not be reached or answered with an error.
pub const REASON_DATADOG_API_UNREACHABLE: &str = "DatadogApiUnreachable";

/// Connection attempts were exhausted; the forwarder stopped retrying.
pub const REASON_CONNECT_ATTEMPTS_EXHAUSTED: &str = "ConnectAttemptsExhausted";

/// A metric or event submission to Datadog failed.
pub const REASON_METRICS_SUBMISSION_FAILED: &str = "MetricsSubmissionFailed";

// ============================================================================
// Object Reasons
// ============================================================================

/// The monitored object no longer exists in the cluster.
pub const REASON_OBJECT_NOT_FOUND: &str = "ObjectNotFound";

/// The monitored object could not be read or decoded.
pub const REASON_OBJECT_READ_FAILED: &str = "ObjectReadFailed";

/// No reconcile outcome has been reported for the object yet.
pub const REASON_RECONCILE_STATE_UNKNOWN: &str = "ReconcileStateUnknown";

// ============================================================================
// Condition Statuses
// ============================================================================

/// Condition status for a healthy condition
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status for an unhealthy condition
pub const CONDITION_STATUS_FALSE: &str = "False";
