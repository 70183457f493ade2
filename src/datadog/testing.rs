// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory fakes of the forwarder seams, shared by the datadog unit tests.

use super::api::{ApiConnector, DatadogApi};
use super::event::{Event, EventType};
use super::object::ObjectKind;
use super::reader::{AgentView, ClusterReader, MonitorView};
use crate::errors::{DatadogApiError, DecryptError, ReaderError};
use crate::secrets::Decryptor;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn not_found(kind: &str, namespace: &str, name: &str) -> ReaderError {
    ReaderError::NotFound {
        kind: kind.to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Cluster contents keyed by `(kind, namespace, name)`.
#[derive(Default)]
pub struct FakeReader {
    agents: Mutex<HashMap<(ObjectKind, String, String), AgentView>>,
    monitors: Mutex<HashMap<(String, String), MonitorView>>,
    secrets: Mutex<HashMap<(String, String), Secret>>,
}

impl FakeReader {
    pub fn set_agent(&self, kind: ObjectKind, namespace: &str, name: &str, view: AgentView) {
        self.agents
            .lock()
            .unwrap()
            .insert((kind, namespace.to_string(), name.to_string()), view);
    }

    pub fn remove_agent(&self, kind: ObjectKind, namespace: &str, name: &str) {
        self.agents
            .lock()
            .unwrap()
            .remove(&(kind, namespace.to_string(), name.to_string()));
    }

    pub fn set_monitor(&self, namespace: &str, name: &str, view: MonitorView) {
        self.monitors
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), view);
    }

    pub fn set_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let secret = Secret {
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        };
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), secret);
    }
}

#[async_trait]
impl ClusterReader for FakeReader {
    async fn agent(&self, kind: ObjectKind, namespace: &str, name: &str) -> Result<AgentView, ReaderError> {
        self.agents
            .lock()
            .unwrap()
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(kind.as_str(), namespace, name))
    }

    async fn monitor(&self, namespace: &str, name: &str) -> Result<MonitorView, ReaderError> {
        self.monitors
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("DatadogMonitor", namespace, name))
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Secret, ReaderError> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("Secret", namespace, name))
    }
}

/// Decryptor answering from a fixed table and recording every batch it receives.
#[derive(Default)]
pub struct FakeDecryptor {
    values: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Vec<String>>>,
    fail: Mutex<bool>,
}

impl FakeDecryptor {
    pub fn with_values(values: &[(&str, &str)]) -> Self {
        let decryptor = Self::default();
        decryptor.set_values(values);
        decryptor
    }

    pub fn set_values(&self, values: &[(&str, &str)]) {
        *self.values.lock().unwrap() = values
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Decryptor for FakeDecryptor {
    async fn decrypt(&self, encrypted: &[String]) -> Result<HashMap<String, String>, DecryptError> {
        self.calls.lock().unwrap().push(encrypted.to_vec());
        if *self.fail.lock().unwrap() {
            return Err(DecryptError::CommandFailed {
                command: "fake".to_string(),
                code: Some(1),
                stderr: "backend down".to_string(),
            });
        }
        let values = self.values.lock().unwrap();
        Ok(encrypted
            .iter()
            .filter_map(|value| values.get(value).map(|plain| (value.clone(), plain.clone())))
            .collect())
    }
}

/// A call received by [`FakeApi`].
#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall {
    Gauge {
        metric: String,
        value: f64,
        tags: Vec<String>,
    },
    Event {
        title: String,
        event_type: EventType,
        tags: Vec<String>,
    },
}

/// Client recording submissions; gauges whose metric is in `failing` are rejected.
pub struct FakeApi {
    calls: Arc<Mutex<Vec<ApiCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    event_delay: Arc<Mutex<Duration>>,
}

#[async_trait]
impl DatadogApi for FakeApi {
    async fn validate(&self) -> Result<bool, DatadogApiError> {
        Ok(true)
    }

    async fn post_gauge(&self, metric: &str, value: f64, tags: &[String]) -> Result<(), DatadogApiError> {
        if self.failing.lock().unwrap().contains(metric) {
            return Err(DatadogApiError::Status {
                url: "http://fake/api/v1/series".to_string(),
                status: 400,
                body: "rejected".to_string(),
            });
        }
        self.calls.lock().unwrap().push(ApiCall::Gauge {
            metric: metric.to_string(),
            value,
            tags: tags.to_vec(),
        });
        Ok(())
    }

    async fn post_event(&self, event: &Event, tags: &[String]) -> Result<(), DatadogApiError> {
        let delay = *self.event_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(ApiCall::Event {
            title: event.title.clone(),
            event_type: event.event_type,
            tags: tags.to_vec(),
        });
        Ok(())
    }
}

/// Connector accepting one key pair and recording every connection attempt.
pub struct FakeConnector {
    accepted: Mutex<(String, String)>,
    unreachable: Mutex<bool>,
    connects: Mutex<Vec<(String, String, String)>>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    event_delay: Arc<Mutex<Duration>>,
}

impl FakeConnector {
    pub fn accepting(api_key: &str, app_key: &str) -> Self {
        Self {
            accepted: Mutex::new((api_key.to_string(), app_key.to_string())),
            unreachable: Mutex::new(false),
            connects: Mutex::new(Vec::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
            event_delay: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn accept(&self, api_key: &str, app_key: &str) {
        *self.accepted.lock().unwrap() = (api_key.to_string(), app_key.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    /// Make every event submission take `delay` before it is recorded.
    pub fn set_event_delay(&self, delay: Duration) {
        *self.event_delay.lock().unwrap() = delay;
    }

    pub fn fail_metric(&self, metric: &str) {
        self.failing.lock().unwrap().insert(metric.to_string());
    }

    /// `(base_url, api_key, app_key)` of every connection attempt.
    pub fn connects(&self) -> Vec<(String, String, String)> {
        self.connects.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gauges(&self) -> Vec<(String, f64, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Gauge { metric, value, tags } => Some((metric, value, tags)),
                ApiCall::Event { .. } => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<(String, EventType)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Event {
                    title, event_type, ..
                } => Some((title, event_type)),
                ApiCall::Gauge { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ApiConnector for FakeConnector {
    async fn connect(
        &self,
        base_url: &str,
        api_key: &str,
        app_key: &str,
    ) -> Result<Arc<dyn DatadogApi>, DatadogApiError> {
        self.connects.lock().unwrap().push((
            base_url.to_string(),
            api_key.to_string(),
            app_key.to_string(),
        ));
        if *self.unreachable.lock().unwrap() {
            return Err(DatadogApiError::Transport {
                url: base_url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let accepted = self.accepted.lock().unwrap().clone();
        if (api_key, app_key) != (accepted.0.as_str(), accepted.1.as_str()) {
            return Err(DatadogApiError::InvalidCredentials {
                base_url: base_url.to_string(),
            });
        }
        Ok(Arc::new(FakeApi {
            calls: Arc::clone(&self.calls),
            failing: Arc::clone(&self.failing),
            event_delay: Arc::clone(&self.event_delay),
        }))
    }
}
