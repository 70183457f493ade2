// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for monitored resources.
//!
//! This module provides utility functions for creating and managing the
//! `ActiveDatadogMetrics` condition following the standard Kubernetes conventions,
//! and for persisting it into the status of agent resources.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (`ActiveDatadogMetrics`)
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (`CamelCase`)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last changed
//!
//! # Example
//!
//! ```rust,no_run
//! use datadog_operator::status::transition_condition;
//!
//! let first = transition_condition(None, "ActiveDatadogMetrics", "False", "InvalidCredentials", "bad keys");
//! let second = transition_condition(Some(&first), "ActiveDatadogMetrics", "False", "DatadogApiUnreachable", "timeout");
//! assert_eq!(first.last_transition_time, second.last_transition_time);
//! ```

use crate::constants::FIELD_MANAGER;
use crate::crd::Condition;
use crate::datadog::object::MonitoredObject;
use chrono::Utc;
use kube::api::{DynamicObject, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - The type of condition (e.g., `ActiveDatadogMetrics`)
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
///
/// # Returns
///
/// A new `Condition` with the current timestamp.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Compute the next value of a condition from its previous value.
///
/// The `lastTransitionTime` of `previous` is kept when the status is unchanged,
/// otherwise it is set to the current time. Reason and message always follow the
/// new observation.
///
/// # Arguments
///
/// * `previous` - The current condition, if any
/// * `condition_type` - The type of condition
/// * `status` - The new status
/// * `reason` - The new reason
/// * `message` - The new message
#[must_use]
pub fn transition_condition(
    previous: Option<&Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    let mut next = create_condition(condition_type, status, reason, message);
    if let Some(prev) = previous {
        if prev.status == status && prev.last_transition_time.is_some() {
            next.last_transition_time.clone_from(&prev.last_transition_time);
        }
    }
    next
}

/// Check if a condition has changed compared to the existing one.
///
/// A condition is considered changed if the type, status, reason or message differ.
/// The `lastTransitionTime` is not compared.
#[must_use]
pub fn condition_changed(existing: Option<&Condition>, new_condition: &Condition) -> bool {
    existing.is_none_or(|current| {
        current.r#type != new_condition.r#type
            || current.status != new_condition.status
            || current.reason != new_condition.reason
            || current.message != new_condition.message
    })
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Replace or append `condition` in an in-memory conditions list.
///
/// Conditions of other types are left untouched.
///
/// # Returns
///
/// `true` when the list was modified.
pub fn upsert_condition(conditions: &mut Vec<Condition>, condition: &Condition) -> bool {
    match conditions
        .iter_mut()
        .find(|c| c.r#type == condition.r#type)
    {
        Some(existing) if !condition_changed(Some(existing), condition) => false,
        Some(existing) => {
            *existing = condition.clone();
            true
        }
        None => {
            conditions.push(condition.clone());
            true
        }
    }
}

/// Persist a forwarder condition into the status of an agent resource.
///
/// Reads the current status conditions, upserts `condition` and merge-patches the
/// `status` subresource when something changed.
///
/// # Arguments
///
/// * `client` - Kubernetes client
/// * `object` - The agent resource to update
/// * `condition` - The condition to publish
///
/// # Returns
///
/// `true` when a patch was sent.
///
/// # Errors
///
/// Returns an error if the resource cannot be read or patched.
pub async fn publish_condition(
    client: Client,
    object: &MonitoredObject,
    condition: &Condition,
) -> Result<bool, kube::Error> {
    let api: Api<DynamicObject> =
        Api::namespaced_with(client, &object.namespace, &object.kind.api_resource());
    let current = api.get_status(&object.name).await?;

    let mut conditions: Vec<Condition> = current
        .data
        .get("status")
        .and_then(|status| status.get("conditions"))
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();

    if !upsert_condition(&mut conditions, condition) {
        return Ok(false);
    }

    let patch = json!({ "status": { "conditions": conditions } });
    api.patch_status(
        &object.name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    debug!(
        object = %object.id(),
        status = %condition.status,
        reason = ?condition.reason,
        "Published forwarder status condition"
    );

    Ok(true)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
