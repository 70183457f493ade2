// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::Condition;
    use crate::status::{
        condition_changed, create_condition, find_condition, transition_condition,
        upsert_condition,
    };

    const CONDITION_TYPE: &str = "ActiveDatadogMetrics";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";

    fn with_time(mut condition: Condition, time: &str) -> Condition {
        condition.last_transition_time = Some(time.to_string());
        condition
    }

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE, STATUS_TRUE, "MetricsForwardingOk", "ok");

        assert_eq!(condition.r#type, CONDITION_TYPE);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason.as_deref(), Some("MetricsForwardingOk"));
        assert_eq!(condition.message.as_deref(), Some("ok"));
        assert!(condition.last_transition_time.is_some());
    }

    /// Test that the transition time is kept while the status does not change
    #[test]
    fn test_transition_time_preserved_for_same_status() {
        let previous = with_time(
            create_condition(CONDITION_TYPE, STATUS_FALSE, "InvalidCredentials", "bad keys"),
            "2020-01-01T00:00:00+00:00",
        );

        let next = transition_condition(
            Some(&previous),
            CONDITION_TYPE,
            STATUS_FALSE,
            "DatadogApiUnreachable",
            "timeout",
        );

        assert_eq!(
            next.last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00"),
            "Same status must keep the previous transition time"
        );
        assert_eq!(next.reason.as_deref(), Some("DatadogApiUnreachable"));
        assert_eq!(next.message.as_deref(), Some("timeout"));
    }

    /// Test that the transition time moves when the status flips
    #[test]
    fn test_transition_time_updated_on_status_change() {
        let previous = with_time(
            create_condition(CONDITION_TYPE, STATUS_FALSE, "InvalidCredentials", "bad keys"),
            "2020-01-01T00:00:00+00:00",
        );

        let next = transition_condition(
            Some(&previous),
            CONDITION_TYPE,
            STATUS_TRUE,
            "MetricsForwardingOk",
            "ok",
        );

        assert_ne!(
            next.last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00"),
            "A status change must set a new transition time"
        );
    }

    #[test]
    fn test_transition_without_previous() {
        let next = transition_condition(None, CONDITION_TYPE, STATUS_TRUE, "MetricsForwardingOk", "ok");
        assert!(next.last_transition_time.is_some());
    }

    #[test]
    fn test_condition_changed() {
        let a = create_condition(CONDITION_TYPE, STATUS_TRUE, "MetricsForwardingOk", "ok");
        let same = with_time(a.clone(), "2020-01-01T00:00:00+00:00");
        let other_message = create_condition(CONDITION_TYPE, STATUS_TRUE, "MetricsForwardingOk", "ok!");

        assert!(condition_changed(None, &a), "Missing condition counts as changed");
        assert!(!condition_changed(Some(&a), &same), "Transition time is ignored");
        assert!(condition_changed(Some(&a), &other_message));
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![
            create_condition("Ready", STATUS_TRUE, "Ready", "ready"),
            create_condition(CONDITION_TYPE, STATUS_FALSE, "ObjectNotFound", "gone"),
        ];

        let found = find_condition(&conditions, CONDITION_TYPE).unwrap();
        assert_eq!(found.status, STATUS_FALSE);
        assert!(find_condition(&conditions, "Missing").is_none());
    }

    /// Test that upserting keeps unrelated conditions and reports changes
    #[test]
    fn test_upsert_condition() {
        let ready = create_condition("Ready", STATUS_TRUE, "Ready", "ready");
        let mut conditions = vec![ready.clone()];

        let active = create_condition(CONDITION_TYPE, STATUS_TRUE, "MetricsForwardingOk", "ok");
        assert!(upsert_condition(&mut conditions, &active), "New condition is appended");
        assert_eq!(conditions.len(), 2);

        assert!(
            !upsert_condition(&mut conditions, &active),
            "Identical condition is a no-op"
        );

        let failing = create_condition(CONDITION_TYPE, STATUS_FALSE, "ObjectNotFound", "gone");
        assert!(upsert_condition(&mut conditions, &failing));
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0], ready, "Other conditions must be untouched");
        assert_eq!(conditions[1].status, STATUS_FALSE);
    }
}
