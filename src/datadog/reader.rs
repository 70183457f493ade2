// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster reads performed by forwarders.
//!
//! `DatadogAgent` and `DatadogMonitor` are read through typed APIs.
//! `DatadogAgentInternal` shares the agent spec and status shape and is read as a
//! dynamic object, then decoded into the same types.

use super::object::ObjectKind;
use crate::crd::{
    DatadogAgent, DatadogAgentSpec, DatadogAgentStatus, DatadogMonitor, DatadogMonitorStatus,
};
use crate::errors::ReaderError;
use crate::retry::{is_retryable_kube_error, kube_backoff, retry_with_backoff};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::DynamicObject;
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields of an agent resource used by forwarders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentView {
    pub labels: BTreeMap<String, String>,
    pub spec: DatadogAgentSpec,
    pub status: Option<DatadogAgentStatus>,
}

/// Fields of a monitor resource used by forwarders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorView {
    pub labels: BTreeMap<String, String>,
    pub status: Option<DatadogMonitorStatus>,
}

/// Read access to the cluster objects a forwarder depends on.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Read an agent resource of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotFound`] when it does not exist.
    async fn agent(&self, kind: ObjectKind, namespace: &str, name: &str) -> Result<AgentView, ReaderError>;

    /// Read a monitor resource.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotFound`] when it does not exist.
    async fn monitor(&self, namespace: &str, name: &str) -> Result<MonitorView, ReaderError>;

    /// Read a Secret.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::NotFound`] when it does not exist.
    async fn secret(&self, namespace: &str, name: &str) -> Result<Secret, ReaderError>;
}

/// [`ClusterReader`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeReader {
    client: Client,
}

impl KubeReader {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// GET with retries on transient errors, mapping failures to [`ReaderError`].
async fn get_with_retry<K>(api: &Api<K>, kind: &str, namespace: &str, name: &str) -> Result<K, ReaderError>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    let operation = format!("get {kind} {namespace}/{name}");
    retry_with_backoff(
        kube_backoff(),
        || api.get(name),
        is_retryable_kube_error,
        &operation,
    )
    .await
    .map_err(|e| match e {
        kube::Error::Api(ref response) if response.code == 404 => ReaderError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => ReaderError::Api {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            reason: other.to_string(),
        },
    })
}

/// Decode an optional field of a dynamic object.
fn decode_field<T: DeserializeOwned>(
    data: &Value,
    field: &str,
    kind: &str,
    namespace: &str,
    name: &str,
) -> Result<Option<T>, ReaderError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ReaderError::Decode {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: format!("{field}: {e}"),
            }),
    }
}

/// Build an [`AgentView`] from the `data` of a dynamic agent object.
///
/// # Errors
///
/// Returns [`ReaderError::Decode`] when `spec` or `status` does not have the agent shape.
pub fn agent_view_from_dynamic(
    kind: ObjectKind,
    object: &DynamicObject,
    namespace: &str,
    name: &str,
) -> Result<AgentView, ReaderError> {
    let kind = kind.as_str();
    Ok(AgentView {
        labels: object.metadata.labels.clone().unwrap_or_default(),
        spec: decode_field(&object.data, "spec", kind, namespace, name)?.unwrap_or_default(),
        status: decode_field(&object.data, "status", kind, namespace, name)?,
    })
}

#[async_trait]
impl ClusterReader for KubeReader {
    async fn agent(&self, kind: ObjectKind, namespace: &str, name: &str) -> Result<AgentView, ReaderError> {
        match kind {
            ObjectKind::DatadogAgent => {
                let api: Api<DatadogAgent> = Api::namespaced(self.client.clone(), namespace);
                let agent = get_with_retry(&api, kind.as_str(), namespace, name).await?;
                Ok(AgentView {
                    labels: agent.metadata.labels.unwrap_or_default(),
                    spec: agent.spec,
                    status: agent.status,
                })
            }
            _ => {
                let ar = kind.api_resource();
                let api: Api<DynamicObject> =
                    Api::namespaced_with(self.client.clone(), namespace, &ar);
                let object = get_with_retry(&api, kind.as_str(), namespace, name).await?;
                agent_view_from_dynamic(kind, &object, namespace, name)
            }
        }
    }

    async fn monitor(&self, namespace: &str, name: &str) -> Result<MonitorView, ReaderError> {
        let api: Api<DatadogMonitor> = Api::namespaced(self.client.clone(), namespace);
        let monitor = get_with_retry(&api, ObjectKind::DatadogMonitor.as_str(), namespace, name).await?;
        Ok(MonitorView {
            labels: monitor.metadata.labels.unwrap_or_default(),
            status: monitor.status,
        })
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Secret, ReaderError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        get_with_retry(&api, "Secret", namespace, name).await
    }
}
