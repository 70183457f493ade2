// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `gauges.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{
        DaemonSetStatus, DatadogMonitorCondition, DeploymentStatus, NodeAgentConfig,
        NodeAgentSpec,
    };
    use crate::datadog::object::ObjectKind;
    use crate::datadog::reconcile::ReconcileFailure;

    const PREFIX: &str = "datadog.operator";

    fn global() -> Vec<String> {
        global_tags(&MonitoredObject::new(ObjectKind::DatadogAgent, "foo", "bar"))
    }

    fn agent_status(available: i32, desired: i32, state: &str) -> DatadogAgentStatus {
        DatadogAgentStatus {
            agent: Some(DaemonSetStatus {
                desired,
                available,
                state: state.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_global_tags() {
        assert_eq!(global(), vec!["cr_namespace:foo", "cr_name:bar"]);
    }

    /// Test that labels are emitted sorted after the cluster name
    #[test]
    fn test_cycle_tags_sorted() {
        let labels = BTreeMap::from([
            ("zone".to_string(), "b".to_string()),
            ("app".to_string(), "agent".to_string()),
        ]);

        assert_eq!(
            cycle_tags(Some("prod"), &labels),
            vec!["cluster_name:prod", "app:agent", "zone:b"]
        );
        assert_eq!(cycle_tags(Some(""), &BTreeMap::new()), Vec::<String>::new());
        assert_eq!(cycle_tags(None, &labels), vec!["app:agent", "zone:b"]);
    }

    #[test]
    fn test_tags_with_extra() {
        let tags = tags_with_extra(&global(), &["cluster_name:prod".to_string()], &["state:Running".to_string()]);
        assert_eq!(
            tags,
            vec!["cr_namespace:foo", "cr_name:bar", "cluster_name:prod", "state:Running"]
        );
    }

    /// Test the base URL precedence: ddUrl, then site, then default
    #[test]
    fn test_base_url_precedence() {
        let default = "https://api.datadoghq.com";
        let mut spec = DatadogAgentSpec::default();
        assert_eq!(base_url(&spec, default), default);

        spec.site = Some("datadoghq.eu".to_string());
        assert_eq!(base_url(&spec, default), "https://api.datadoghq.eu");

        spec.agent = Some(NodeAgentSpec {
            config: NodeAgentConfig {
                dd_url: Some("https://test.url.com".to_string()),
            },
        });
        assert_eq!(base_url(&spec, default), "https://test.url.com");
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            deployment_metric_name(PREFIX, "clusteragent"),
            "datadog.operator.clusteragent.deployment.success"
        );
        assert_eq!(reconcile_metric_name(PREFIX), "datadog.operator.reconcile.success");
        assert_eq!(monitor_metric_name(PREFIX, "Active"), "datadog.operator.monitor.active");
    }

    /// Test a healthy node agent
    #[test]
    fn test_agent_deployment_success() {
        let points = deployment_gauges(PREFIX, &agent_status(1337, 1337, "Running"), &global(), &[]);

        assert_eq!(
            points,
            vec![GaugePoint {
                metric: "datadog.operator.agent.deployment.success".to_string(),
                value: 1.0,
                tags: vec![
                    "cr_namespace:foo".to_string(),
                    "cr_name:bar".to_string(),
                    "state:Running".to_string()
                ],
            }]
        );
    }

    /// Test an unhealthy node agent
    #[test]
    fn test_agent_deployment_failure() {
        let points = deployment_gauges(PREFIX, &agent_status(1336, 1337, "Failed"), &global(), &[]);

        assert_eq!(points.len(), 1);
        assert!((points[0].value - 0.0).abs() < f64::EPSILON);
        assert_eq!(points[0].tags.last().map(String::as_str), Some("state:Failed"));
    }

    /// Test that components are emitted in a fixed order and absent ones are skipped
    #[test]
    fn test_deployment_component_order() {
        let status = DatadogAgentStatus {
            agent: Some(DaemonSetStatus::default()),
            cluster_agent: None,
            cluster_checks_runner: Some(DeploymentStatus {
                replicas: 2,
                available_replicas: 1,
                state: "Updating".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let points = deployment_gauges(PREFIX, &status, &global(), &[]);
        let names: Vec<&str> = points.iter().map(|p| p.metric.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "datadog.operator.agent.deployment.success",
                "datadog.operator.clustercheckrunner.deployment.success"
            ]
        );
        assert!((points[1].value - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_status_has_no_deployment_gauges() {
        assert!(deployment_gauges(PREFIX, &DatadogAgentStatus::default(), &global(), &[]).is_empty());
    }

    /// Test monitor gauges and their tags
    #[test]
    fn test_monitor_gauges() {
        let status = DatadogMonitorStatus {
            id: 12345,
            monitor_state: "Alert".to_string(),
            sync_status: "OK".to_string(),
            conditions: vec![
                DatadogMonitorCondition {
                    r#type: "Active".to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                },
                DatadogMonitorCondition {
                    r#type: "Error".to_string(),
                    status: "False".to_string(),
                    ..Default::default()
                },
            ],
        };

        let points = monitor_gauges(PREFIX, &status, &global(), &["cluster_name:prod".to_string()]);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].metric, "datadog.operator.monitor.active");
        assert!((points[0].value - 1.0).abs() < f64::EPSILON);
        assert_eq!(points[1].metric, "datadog.operator.monitor.error");
        assert!((points[1].value - 0.0).abs() < f64::EPSILON);
        assert_eq!(
            points[0].tags,
            vec![
                "cr_namespace:foo",
                "cr_name:bar",
                "cluster_name:prod",
                "monitor_id:12345",
                "monitor_state:Alert",
                "monitor_sync_status:OK"
            ]
        );
    }

    /// Test that unknown monitor fields are not tagged
    #[test]
    fn test_monitor_tags_skip_unset_fields() {
        assert!(monitor_tags(&DatadogMonitorStatus::default()).is_empty());
    }

    #[test]
    fn test_reconcile_gauge_never_set() {
        assert_eq!(
            reconcile_gauge(&LastReconcile::NeverSet, &global(), &[]),
            Err(ForwarderError::ReconcileNeverSet)
        );
    }

    #[test]
    fn test_reconcile_gauge_success() {
        let (value, tags) = reconcile_gauge(&LastReconcile::Outcome(None), &global(), &[]).unwrap();
        assert!((value - 1.0).abs() < f64::EPSILON);
        assert_eq!(tags, vec!["cr_namespace:foo", "cr_name:bar", "reconcile_err:null"]);
    }

    #[test]
    fn test_reconcile_gauge_plain_error() {
        let last = LastReconcile::Outcome(Some(ReconcileFailure::new("err_msg")));
        let (value, tags) = reconcile_gauge(&last, &global(), &[]).unwrap();
        assert!((value - 0.0).abs() < f64::EPSILON);
        assert_eq!(tags, vec!["cr_namespace:foo", "cr_name:bar", "reconcile_err:err_msg"]);
    }

    #[test]
    fn test_reconcile_gauge_unauthorized() {
        let last = LastReconcile::Outcome(Some(ReconcileFailure::with_reason(
            "Unauthorized",
            "Unauthorized",
        )));
        let (_, tags) = reconcile_gauge(&last, &global(), &[]).unwrap();
        assert_eq!(tags.last().map(String::as_str), Some("reconcile_err:Unauthorized"));
    }
}
