// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Identity of the custom resources watched by forwarders.

use crate::constants::{
    API_GROUP, API_VERSION, KIND_DATADOG_AGENT, KIND_DATADOG_AGENT_INTERNAL, KIND_DATADOG_MONITOR,
};
use crate::errors::ObjectError;
use kube::core::{ApiResource, GroupVersionKind};
use kube::Resource;
use std::fmt;
use std::str::FromStr;

/// Kinds of custom resources a forwarder can monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    DatadogAgent,
    DatadogAgentInternal,
    DatadogMonitor,
}

impl ObjectKind {
    /// All monitored kinds.
    pub const ALL: [ObjectKind; 3] = [
        ObjectKind::DatadogAgent,
        ObjectKind::DatadogAgentInternal,
        ObjectKind::DatadogMonitor,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DatadogAgent => KIND_DATADOG_AGENT,
            Self::DatadogAgentInternal => KIND_DATADOG_AGENT_INTERNAL,
            Self::DatadogMonitor => KIND_DATADOG_MONITOR,
        }
    }

    /// Whether the kind carries an agent spec and deployment status.
    #[must_use]
    pub fn is_agent(self) -> bool {
        matches!(self, Self::DatadogAgent | Self::DatadogAgentInternal)
    }

    /// API resource used to address this kind through a dynamic client.
    #[must_use]
    pub fn api_resource(self) -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(API_GROUP, API_VERSION, self.as_str()))
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ObjectError::UnsupportedKind {
                kind: s.to_string(),
            })
    }
}

/// A custom resource monitored by a forwarder.
///
/// The identity key is `<kind>/<namespace>/<name>`, so objects of different kinds
/// sharing a namespace and name get separate forwarders.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MonitoredObject {
    pub kind: ObjectKind,
    pub namespace: String,
    pub name: String,
}

impl MonitoredObject {
    #[must_use]
    pub fn new(kind: ObjectKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the identity of a Kubernetes resource.
    ///
    /// # Arguments
    ///
    /// * `resource` - The resource, typed or dynamic
    /// * `dt` - Its dynamic type (`&()` for typed resources, the `ApiResource` otherwise)
    ///
    /// # Errors
    ///
    /// Returns an error if the kind is not monitored or if the name or namespace is missing.
    pub fn from_resource<K: Resource>(resource: &K, dt: &K::DynamicType) -> Result<Self, ObjectError> {
        let kind: ObjectKind = K::kind(dt).parse()?;
        let meta = resource.meta();
        let name = meta.name.clone().ok_or(ObjectError::MissingName)?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or_else(|| ObjectError::MissingNamespace { name: name.clone() })?;
        Ok(Self {
            kind,
            namespace,
            name,
        })
    }

    /// Identity key `<kind>/<namespace>/<name>`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl fmt::Display for MonitoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod object_tests;
