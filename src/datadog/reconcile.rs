// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile outcomes reported to forwarders.
//!
//! Reconcilers report the result of every reconcile; the forwarder keeps the last
//! one and turns it into the `reconcile.success` gauge with a `reconcile_err` tag.

use std::fmt::Display;

/// A failed reconcile, compared by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileFailure {
    /// Kubernetes API status reason (e.g. `Unauthorized`), when known.
    pub reason: Option<String>,
    /// Error message.
    pub message: String,
}

impl ReconcileFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            reason: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_reason(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            message: message.into(),
        }
    }

    /// Build a failure from any displayable error, without reason.
    pub fn from_error<E: Display + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    /// Value of the `reconcile_err` tag: the reason when present, else the message.
    #[must_use]
    pub fn tag_value(&self) -> &str {
        self.reason
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.message)
    }
}

impl From<&kube::Error> for ReconcileFailure {
    fn from(err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(response) if !response.reason.is_empty() => {
                Self::with_reason(response.reason.clone(), response.message.clone())
            }
            other => Self::from_error(other),
        }
    }
}

/// Last reconcile outcome known by a forwarder.
///
/// `NeverSet` distinguishes a forwarder that has not been told anything yet from
/// one whose last reconcile succeeded (`Outcome(None)`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LastReconcile {
    #[default]
    NeverSet,
    Outcome(Option<ReconcileFailure>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kube_api_error_uses_reason() {
        let err = kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: "Unauthorized".to_string(),
            reason: "Unauthorized".to_string(),
            code: 401,
            metadata: None,
            details: None,
        }));

        let failure = ReconcileFailure::from(&err);
        assert_eq!(failure.reason.as_deref(), Some("Unauthorized"));
        assert_eq!(failure.tag_value(), "Unauthorized");
    }

    #[test]
    fn test_plain_error_uses_message() {
        let failure = ReconcileFailure::from_error("err_msg");
        assert_eq!(failure.reason, None);
        assert_eq!(failure.tag_value(), "err_msg");
    }

    #[test]
    fn test_failures_compare_by_value() {
        assert_eq!(ReconcileFailure::new("boom"), ReconcileFailure::new("boom"));
        assert_ne!(
            ReconcileFailure::new("boom"),
            ReconcileFailure::with_reason("Conflict", "boom")
        );
    }

    #[test]
    fn test_last_reconcile_default_is_never_set() {
        assert_eq!(LastReconcile::default(), LastReconcile::NeverSet);
        assert_ne!(LastReconcile::NeverSet, LastReconcile::Outcome(None));
    }
}
