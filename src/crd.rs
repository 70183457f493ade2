// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) consumed by the metrics forwarders.
//!
//! Only the fields the forwarders read are modelled here. The full schemas are
//! owned by the reconcilers of these resources.
//!
//! # Resource Types
//!
//! - [`DatadogAgent`] - Deployment of the node agent, cluster agent and cluster checks runner
//! - `DatadogAgentInternal` - Same spec and status shape as [`DatadogAgent`], read dynamically
//! - [`DatadogMonitor`] - A Datadog monitor synchronized from the cluster
//!
//! # Example: Credentials From a Secret
//!
//! ```rust,no_run
//! use datadog_operator::crd::{AgentCredentials, DatadogAgentSpec, SecretKeyRef};
//!
//! let spec = DatadogAgentSpec {
//!     credentials: AgentCredentials {
//!         api_secret: Some(SecretKeyRef {
//!             secret_name: "datadog-keys".to_string(),
//!             key_name: Some("api_key".to_string()),
//!         }),
//!         ..Default::default()
//!     },
//!     site: Some("datadoghq.eu".to_string()),
//!     ..Default::default()
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a key inside a Secret in the namespace of the referencing object.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    /// Name of the Secret.
    pub secret_name: String,

    /// Key inside the Secret data. Defaults to `api_key` or `app_key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
}

/// Datadog credentials of an agent deployment.
///
/// Literal keys take precedence over Secret references. Either may hold an
/// `ENC[...]` handle resolved through the secret backend.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCredentials {
    /// Datadog API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Datadog application key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,

    /// Secret holding the API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<SecretKeyRef>,

    /// Secret holding the application key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<SecretKeyRef>,
}

/// Node agent configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeAgentConfig {
    /// Datadog intake URL overriding the site.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dd_url: Option<String>,
}

/// Node agent section of the spec.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeAgentSpec {
    #[serde(default)]
    pub config: NodeAgentConfig,
}

/// `DatadogAgent` deploys the Datadog node agent, cluster agent and cluster checks runner.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "datadoghq.com",
    version = "v1alpha1",
    kind = "DatadogAgent",
    namespaced,
    shortname = "dd",
    doc = "DatadogAgent deploys the Datadog Agent components in the cluster."
)]
#[kube(status = "DatadogAgentStatus")]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentSpec {
    /// Datadog credentials.
    #[serde(default)]
    pub credentials: AgentCredentials,

    /// Datadog site, e.g. `datadoghq.eu`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    /// Name of the cluster, reported as the `cluster_name` tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Node agent settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<NodeAgentSpec>,
}

/// Rollout status of the node agent `DaemonSet`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSetStatus {
    #[serde(default)]
    pub desired: i32,
    #[serde(default)]
    pub current: i32,
    #[serde(default)]
    pub ready: i32,
    #[serde(default)]
    pub available: i32,
    #[serde(default)]
    pub up_to_date: i32,
    /// Summary state, e.g. `Running`, `Updating`, `Failed`.
    #[serde(default)]
    pub state: String,
}

/// Rollout status of a `Deployment` (cluster agent, cluster checks runner).
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub updated_replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub available_replicas: i32,
    /// Summary state, e.g. `Running`, `Updating`, `Failed`.
    #[serde(default)]
    pub state: String,
}

/// `DatadogAgent` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatadogAgentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<DaemonSetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_agent: Option<DeploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_checks_runner: Option<DeploymentStatus>,
}

/// `DatadogMonitor` mirrors a Datadog monitor definition.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[kube(
    group = "datadoghq.com",
    version = "v1alpha1",
    kind = "DatadogMonitor",
    namespaced,
    doc = "DatadogMonitor creates and keeps in sync a monitor in the Datadog account."
)]
#[kube(status = "DatadogMonitorStatus")]
#[serde(rename_all = "camelCase")]
pub struct DatadogMonitorSpec {
    /// Monitor name.
    #[serde(default)]
    pub name: String,

    /// Monitor type, e.g. `metric alert`.
    #[serde(default)]
    pub r#type: String,

    /// Monitor query.
    #[serde(default)]
    pub query: String,

    /// Notification message.
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Condition of a `DatadogMonitor` (`Active`, `Created`, `Updated`, `Error`).
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatadogMonitorCondition {
    pub r#type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `DatadogMonitor` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatadogMonitorStatus {
    #[serde(default)]
    pub conditions: Vec<DatadogMonitorCondition>,

    /// Datadog monitor ID, zero until the monitor is created.
    #[serde(default)]
    pub id: i64,

    /// Monitor state reported by Datadog, e.g. `OK`, `Alert`.
    #[serde(default)]
    pub monitor_state: String,

    /// Result of the last sync with Datadog.
    #[serde(default)]
    pub sync_status: String,
}

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `ActiveDatadogMetrics`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief `CamelCase` reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}
