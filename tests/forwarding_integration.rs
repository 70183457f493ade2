// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end forwarding tests against a mock Datadog API.
//!
//! A forwarder is driven through the public manager API with an in-memory cluster
//! reader and the real HTTP connector pointed at a `wiremock` server.
//!
//! Run with: cargo test --test forwarding_integration

use async_trait::async_trait;
use datadog_operator::crd::{AgentCredentials, DatadogAgentSpec, NodeAgentConfig, NodeAgentSpec};
use datadog_operator::datadog::api::HttpConnector;
use datadog_operator::datadog::reader::{AgentView, ClusterReader, MonitorView};
use datadog_operator::datadog::reconcile::ReconcileFailure;
use datadog_operator::datadog::{
    ForwarderConfig, ForwarderDeps, ForwardersManager, MonitoredObject, ObjectKind,
};
use datadog_operator::errors::ReaderError;
use datadog_operator::secrets::{CommandDecryptor, SecretBackendConfig};
use k8s_openapi::api::core::v1::Secret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

/// Serves a single agent whose `ddUrl` points at the mock server.
struct SingleAgent {
    spec: DatadogAgentSpec,
}

#[async_trait]
impl ClusterReader for SingleAgent {
    async fn agent(&self, _kind: ObjectKind, _namespace: &str, _name: &str) -> Result<AgentView, ReaderError> {
        Ok(AgentView {
            spec: self.spec.clone(),
            ..AgentView::default()
        })
    }

    async fn monitor(&self, namespace: &str, name: &str) -> Result<MonitorView, ReaderError> {
        Err(ReaderError::NotFound {
            kind: "DatadogMonitor".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Secret, ReaderError> {
        Err(ReaderError::NotFound {
            kind: "Secret".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

async fn mock_datadog() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"valid":true}"#))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/series"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/events"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    server
}

fn manager_for(server: &MockServer) -> ForwardersManager {
    let spec = DatadogAgentSpec {
        credentials: AgentCredentials {
            api_key: Some("api".to_string()),
            app_key: Some("app".to_string()),
            ..AgentCredentials::default()
        },
        cluster_name: Some("test-cluster".to_string()),
        agent: Some(NodeAgentSpec {
            config: NodeAgentConfig {
                dd_url: Some(server.uri()),
            },
        }),
        ..DatadogAgentSpec::default()
    };
    let deps = ForwarderDeps {
        reader: Arc::new(SingleAgent { spec }),
        connector: Arc::new(HttpConnector::new(Duration::from_secs(5)).unwrap()),
        decryptor: Arc::new(CommandDecryptor::new(SecretBackendConfig::default())),
    };
    let config = ForwarderConfig {
        send_interval: Duration::from_millis(100),
        retry_interval: Duration::from_millis(100),
        ..ForwarderConfig::default()
    };
    ForwardersManager::new(config, deps)
}

/// Bodies of every request received on `request_path`.
async fn bodies(server: &MockServer, request_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .filter_map(|request| serde_json::from_slice(&request.body).ok())
        .collect()
}

fn series_metrics(bodies: &[Value]) -> Vec<(String, f64)> {
    bodies
        .iter()
        .flat_map(|body| body["series"].as_array().cloned().unwrap_or_default())
        .map(|series| {
            (
                series["metric"].as_str().unwrap_or_default().to_string(),
                series["points"][0][1].as_f64().unwrap_or(-1.0),
            )
        })
        .collect()
}

/// Poll `server` until `request_path` received a body matching `predicate`.
async fn wait_for<F>(server: &MockServer, request_path: &str, predicate: F) -> bool
where
    F: Fn(&[Value]) -> bool,
{
    for _ in 0..100 {
        if predicate(&bodies(server, request_path).await) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn has_title(bodies: &[Value], title: &str) -> bool {
    bodies.iter().any(|body| body["title"] == title)
}

// ============================================================================
// Tests
// ============================================================================

/// A registered agent is announced, reports its reconcile outcome and is
/// announced as deleted when the manager shuts down
#[tokio::test]
async fn test_agent_forwarding_lifecycle() {
    let server = mock_datadog().await;
    let manager = manager_for(&server);
    let object = MonitoredObject::new(ObjectKind::DatadogAgent, "datadog", "agent");

    manager.register(&object);
    manager.process_error(&object, None);

    assert!(
        wait_for(&server, "/api/v1/events", |bodies| has_title(
            bodies,
            "DatadogAgent/datadog/agent detected"
        ))
        .await,
        "Detect event was not posted"
    );
    assert!(
        wait_for(&server, "/api/v1/series", |bodies| series_metrics(bodies)
            .contains(&("datadog.operator.reconcile.success".to_string(), 1.0)))
        .await,
        "Reconcile gauge was not posted"
    );

    assert!(
        wait_for(&server, "/api/v1/series", |bodies| bodies.iter().any(|body| {
            body["series"][0]["tags"]
                .as_array()
                .is_some_and(|tags| tags.iter().any(|tag| tag == "cluster_name:test-cluster"))
        }))
        .await,
        "Cycle tags were not applied"
    );

    manager.shutdown().await;

    let events = bodies(&server, "/api/v1/events").await;
    assert!(has_title(&events, "DatadogAgent/datadog/agent deleted"));
}

/// A reconcile failure flips the reconcile gauge to 0 while the forwarder stays active
#[tokio::test]
async fn test_reconcile_failure_is_reported() {
    let server = mock_datadog().await;
    let manager = manager_for(&server);
    let object = MonitoredObject::new(ObjectKind::DatadogAgent, "datadog", "agent");

    manager.register(&object);
    manager.process_error(&object, Some(ReconcileFailure::new("boom")));

    assert!(
        wait_for(&server, "/api/v1/series", |bodies| series_metrics(bodies)
            .contains(&("datadog.operator.reconcile.success".to_string(), 0.0)))
        .await,
        "Failed reconcile gauge was not posted"
    );

    let mut active = false;
    for _ in 0..100 {
        if manager
            .status_for(&object)
            .is_some_and(|condition| condition.status == "True")
        {
            active = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(active, "Forwarder never reported an active condition");

    manager.shutdown().await;
}
