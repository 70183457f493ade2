// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Metric names, tags and gauge values computed from object status.
//!
//! Everything here is pure: the forwarder gathers the object's state, these
//! functions decide what to send.
//!
//! # Metric Names
//!
//! - `<prefix>.<component>.deployment.success` for `agent`, `clusteragent`, `clustercheckrunner`
//! - `<prefix>.reconcile.success`
//! - `<prefix>.monitor.<condition type, lower-cased>`
//!
//! # Tags
//!
//! Every point carries the global tags (`cr_namespace`, `cr_name`), then the cycle
//! tags (`cluster_name`, then object labels sorted by key), then metric specific tags.

use super::object::MonitoredObject;
use super::reconcile::LastReconcile;
use crate::constants::{
    COMPONENT_AGENT, COMPONENT_CLUSTER_AGENT, COMPONENT_CLUSTER_CHECKS_RUNNER,
    DEPLOYMENT_METRIC_SUFFIX, FAILURE_VALUE, MONITOR_METRIC_INFIX, RECONCILE_ERR_NULL,
    RECONCILE_METRIC_SUFFIX, SUCCESS_VALUE, TAG_CLUSTER_NAME, TAG_CR_NAME, TAG_CR_NAMESPACE,
    TAG_MONITOR_ID, TAG_MONITOR_STATE, TAG_MONITOR_SYNC_STATUS, TAG_RECONCILE_ERR, TAG_STATE,
};
use crate::crd::{DatadogAgentSpec, DatadogAgentStatus, DatadogMonitorStatus};
use crate::errors::ForwarderError;
use std::collections::BTreeMap;

/// A single gauge point to submit.
#[derive(Clone, Debug, PartialEq)]
pub struct GaugePoint {
    pub metric: String,
    pub value: f64,
    pub tags: Vec<String>,
}

fn tag(key: &str, value: impl std::fmt::Display) -> String {
    format!("{key}:{value}")
}

fn success_value(success: bool) -> f64 {
    if success {
        SUCCESS_VALUE
    } else {
        FAILURE_VALUE
    }
}

/// Tags identifying the object, set once per forwarder.
#[must_use]
pub fn global_tags(object: &MonitoredObject) -> Vec<String> {
    vec![
        tag(TAG_CR_NAMESPACE, &object.namespace),
        tag(TAG_CR_NAME, &object.name),
    ]
}

/// Tags refreshed every cycle: cluster name, then labels sorted by key.
#[must_use]
pub fn cycle_tags(cluster_name: Option<&str>, labels: &BTreeMap<String, String>) -> Vec<String> {
    cluster_name
        .filter(|name| !name.is_empty())
        .map(|name| tag(TAG_CLUSTER_NAME, name))
        .into_iter()
        .chain(labels.iter().map(|(key, value)| tag(key, value)))
        .collect()
}

/// `global + tags + extra`.
#[must_use]
pub fn tags_with_extra(global: &[String], tags: &[String], extra: &[String]) -> Vec<String> {
    global
        .iter()
        .chain(tags)
        .chain(extra)
        .cloned()
        .collect()
}

/// Base URL of the Datadog API for an agent: `ddUrl`, then `https://api.<site>`, then `default`.
#[must_use]
pub fn base_url(spec: &DatadogAgentSpec, default: &str) -> String {
    if let Some(dd_url) = spec
        .agent
        .as_ref()
        .and_then(|agent| agent.config.dd_url.as_deref())
        .filter(|url| !url.is_empty())
    {
        return dd_url.to_string();
    }
    match spec.site.as_deref().filter(|site| !site.is_empty()) {
        Some(site) => format!("https://api.{site}"),
        None => default.to_string(),
    }
}

/// `<prefix>.<component>.deployment.success`
#[must_use]
pub fn deployment_metric_name(prefix: &str, component: &str) -> String {
    format!("{prefix}.{component}.{DEPLOYMENT_METRIC_SUFFIX}")
}

/// `<prefix>.reconcile.success`
#[must_use]
pub fn reconcile_metric_name(prefix: &str) -> String {
    format!("{prefix}.{RECONCILE_METRIC_SUFFIX}")
}

/// `<prefix>.monitor.<condition>`
#[must_use]
pub fn monitor_metric_name(prefix: &str, condition_type: &str) -> String {
    format!(
        "{prefix}.{MONITOR_METRIC_INFIX}.{}",
        condition_type.to_lowercase()
    )
}

/// Deployment gauges for every present component, in order agent, cluster agent,
/// cluster checks runner.
///
/// The node agent is healthy when `available == desired`; deployments when
/// `availableReplicas == replicas`. Each point is tagged with the component state.
#[must_use]
pub fn deployment_gauges(
    prefix: &str,
    status: &DatadogAgentStatus,
    global: &[String],
    tags: &[String],
) -> Vec<GaugePoint> {
    let agent = status.agent.as_ref().map(|agent| {
        (
            COMPONENT_AGENT,
            agent.available == agent.desired,
            agent.state.as_str(),
        )
    });
    let deployments = [
        (COMPONENT_CLUSTER_AGENT, status.cluster_agent.as_ref()),
        (
            COMPONENT_CLUSTER_CHECKS_RUNNER,
            status.cluster_checks_runner.as_ref(),
        ),
    ]
    .into_iter()
    .filter_map(|(component, deployment)| {
        deployment.map(|d| {
            (
                component,
                d.available_replicas == d.replicas,
                d.state.as_str(),
            )
        })
    });

    agent
        .into_iter()
        .chain(deployments)
        .map(|(component, healthy, state)| GaugePoint {
            metric: deployment_metric_name(prefix, component),
            value: success_value(healthy),
            tags: tags_with_extra(global, tags, &[tag(TAG_STATE, state)]),
        })
        .collect()
}

/// Tags describing a monitor: id when assigned, state and sync status when known.
#[must_use]
pub fn monitor_tags(status: &DatadogMonitorStatus) -> Vec<String> {
    let mut extra = Vec::new();
    if status.id != 0 {
        extra.push(tag(TAG_MONITOR_ID, status.id));
    }
    if !status.monitor_state.is_empty() {
        extra.push(tag(TAG_MONITOR_STATE, &status.monitor_state));
    }
    if !status.sync_status.is_empty() {
        extra.push(tag(TAG_MONITOR_SYNC_STATUS, &status.sync_status));
    }
    extra
}

/// One gauge per monitor condition, `1.0` when the condition status is `True`.
#[must_use]
pub fn monitor_gauges(
    prefix: &str,
    status: &DatadogMonitorStatus,
    global: &[String],
    tags: &[String],
) -> Vec<GaugePoint> {
    let all_tags = tags_with_extra(global, tags, &monitor_tags(status));
    status
        .conditions
        .iter()
        .map(|condition| GaugePoint {
            metric: monitor_metric_name(prefix, &condition.r#type),
            value: success_value(condition.status == "True"),
            tags: all_tags.clone(),
        })
        .collect()
}

/// Value and tags of the reconcile gauge.
///
/// # Errors
///
/// Returns [`ForwarderError::ReconcileNeverSet`] when no outcome was reported yet.
pub fn reconcile_gauge(
    last: &LastReconcile,
    global: &[String],
    tags: &[String],
) -> Result<(f64, Vec<String>), ForwarderError> {
    match last {
        LastReconcile::NeverSet => Err(ForwarderError::ReconcileNeverSet),
        LastReconcile::Outcome(None) => Ok((
            SUCCESS_VALUE,
            tags_with_extra(global, tags, &[tag(TAG_RECONCILE_ERR, RECONCILE_ERR_NULL)]),
        )),
        LastReconcile::Outcome(Some(failure)) => Ok((
            FAILURE_VALUE,
            tags_with_extra(
                global,
                tags,
                &[tag(TAG_RECONCILE_ERR, failure.tag_value())],
            ),
        )),
    }
}

#[cfg(test)]
#[path = "gauges_tests.rs"]
mod gauges_tests;
