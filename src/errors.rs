// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the metrics forwarding subsystem.
//!
//! This module provides specialized error types for:
//! - Monitored object identification (unsupported kinds, missing metadata)
//! - Credential resolution (empty keys, unreadable Secrets, decryption)
//! - The secret backend command protocol
//! - Datadog public API calls (validation, metric and event submission)
//! - Cluster reads performed by forwarders
//!
//! [`ForwarderError`] wraps all of them for a single forwarding attempt and maps
//! each failure onto a status condition reason through [`ForwarderError::reason`].

use crate::status_reasons::{
    REASON_CONNECT_ATTEMPTS_EXHAUSTED, REASON_CREDENTIALS_UNAVAILABLE,
    REASON_DATADOG_API_UNREACHABLE, REASON_INVALID_CREDENTIALS, REASON_METRICS_SUBMISSION_FAILED,
    REASON_OBJECT_NOT_FOUND, REASON_OBJECT_READ_FAILED, REASON_RECONCILE_STATE_UNKNOWN,
    REASON_SECRET_DECRYPTION_FAILED,
};
use thiserror::Error;

/// Errors raised while identifying a monitored object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// The resource kind is not one the forwarders know how to monitor
    #[error("Unsupported kind '{kind}': expected DatadogAgent, DatadogAgentInternal or DatadogMonitor")]
    UnsupportedKind {
        /// The kind that was rejected
        kind: String,
    },

    /// The resource has no namespace in its metadata
    #[error("Resource '{name}' has no namespace")]
    MissingNamespace {
        /// Name of the resource
        name: String,
    },

    /// The resource has no name in its metadata
    #[error("Resource has no name")]
    MissingName,
}

/// Errors that can occur while decrypting `ENC[...]` values through the secret backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// The secret backend command could not be started
    #[error("Failed to start secret backend command '{command}': {reason}")]
    Spawn {
        /// The configured command
        command: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The secret backend command did not finish in time
    #[error("Secret backend command '{command}' timed out after {timeout_secs}s")]
    Timeout {
        /// The configured command
        command: String,
        /// Configured timeout in seconds
        timeout_secs: u64,
    },

    /// The secret backend produced more output than allowed
    #[error("Secret backend output exceeded {limit} bytes")]
    OutputTooLarge {
        /// Configured output limit in bytes
        limit: usize,
    },

    /// The secret backend command exited unsuccessfully
    #[error("Secret backend command '{command}' failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        /// The configured command
        command: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The response could not be parsed as the expected JSON document
    #[error("Invalid secret backend response: {reason}")]
    InvalidResponse {
        /// Parser error
        reason: String,
    },

    /// A requested handle is absent from the response
    #[error("Secret backend did not return a value for handle '{handle}'")]
    MissingHandle {
        /// The handle that was requested
        handle: String,
    },

    /// The backend reported an error for a handle
    #[error("Secret backend failed to decrypt handle '{handle}': {error}")]
    HandleError {
        /// The handle that failed
        handle: String,
        /// Error message returned by the backend
        error: String,
    },

    /// The backend returned an empty value for a handle
    #[error("Secret backend returned an empty value for handle '{handle}'")]
    EmptyValue {
        /// The handle with an empty value
        handle: String,
    },

    /// Encrypted values were found but no secret backend is configured
    #[error("Encrypted credentials found but no secret backend command is configured")]
    NotConfigured,
}

/// Errors that can occur while resolving Datadog API and APP keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No API key was found in the spec, the referenced Secret or the operator defaults
    #[error("Empty API key")]
    EmptyApiKey,

    /// No APP key was found in the spec, the referenced Secret or the operator defaults
    #[error("Empty APP key")]
    EmptyAppKey,

    /// The referenced credentials Secret could not be read
    #[error("Failed to read Secret {namespace}/{name}: {reason}")]
    SecretRead {
        /// Namespace of the Secret
        namespace: String,
        /// Name of the Secret
        name: String,
        /// Underlying error
        reason: String,
    },

    /// Decryption of encrypted credentials failed
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

/// Errors that can occur when talking to the Datadog public API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatadogApiError {
    /// The validate endpoint reported the key pair as invalid
    #[error("Invalid Datadog credentials on {base_url}")]
    InvalidCredentials {
        /// Base URL the credentials were validated against
        base_url: String,
    },

    /// The configured base URL cannot be used to build request URLs
    #[error("Invalid Datadog base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL
        url: String,
        /// Parser error
        reason: String,
    },

    /// The request could not be sent or timed out
    #[error("Request to {url} failed: {reason}")]
    Transport {
        /// Request URL
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// The API answered with a non-success status code
    #[error("Request to {url} returned HTTP {status}: {body}")]
    Status {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// The response body could not be decoded
    #[error("Failed to decode response from {url}: {reason}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder error
        reason: String,
    },
}

/// Errors that can occur when a forwarder reads cluster state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// The object no longer exists
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
    },

    /// The Kubernetes API call failed
    #[error("Failed to read {kind} {namespace}/{name}: {reason}")]
    Api {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Underlying error
        reason: String,
    },

    /// The object was read but its spec or status could not be decoded
    #[error("Failed to decode {kind} {namespace}/{name}: {reason}")]
    Decode {
        /// Kind of the object
        kind: String,
        /// Namespace of the object
        namespace: String,
        /// Name of the object
        name: String,
        /// Decoder error
        reason: String,
    },
}

/// Failure of a single connection attempt or forwarding cycle.
///
/// These errors never end a forwarder task; they are logged and reflected in the
/// `ActiveDatadogMetrics` status condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwarderError {
    /// The monitored object could not be read
    #[error(transparent)]
    Object(#[from] ReaderError),

    /// Credentials could not be resolved
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// The Datadog client could not be created or validated
    #[error("Cannot connect to Datadog API: {0}")]
    Connect(DatadogApiError),

    /// A metric or event submission failed
    #[error("Cannot send to Datadog API: {0}")]
    Submission(DatadogApiError),

    /// No client is available yet for a submission
    #[error("Datadog client is not initialized")]
    NotConnected,

    /// The reconcile metric cannot be computed before the first reconcile outcome
    #[error("Last reconcile result is not known yet")]
    ReconcileNeverSet,

    /// Connection attempts were exhausted
    #[error("Gave up connecting to Datadog API after {attempts} attempts")]
    AttemptsExhausted {
        /// Number of attempts performed
        attempts: u32,
    },
}

impl ForwarderError {
    /// `CamelCase` condition reason describing this failure.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Object(ReaderError::NotFound { .. }) => REASON_OBJECT_NOT_FOUND,
            Self::Object(_) => REASON_OBJECT_READ_FAILED,
            Self::Credentials(CredentialError::Decrypt(_)) => REASON_SECRET_DECRYPTION_FAILED,
            Self::Credentials(_) => REASON_CREDENTIALS_UNAVAILABLE,
            Self::Connect(DatadogApiError::InvalidCredentials { .. }) => {
                REASON_INVALID_CREDENTIALS
            }
            Self::Connect(_) | Self::NotConnected => REASON_DATADOG_API_UNREACHABLE,
            Self::Submission(_) => REASON_METRICS_SUBMISSION_FAILED,
            Self::ReconcileNeverSet => REASON_RECONCILE_STATE_UNKNOWN,
            Self::AttemptsExhausted { .. } => REASON_CONNECT_ATTEMPTS_EXHAUSTED,
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
