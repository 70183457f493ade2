// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Events forwarded to Datadog on behalf of monitored objects.

use super::object::MonitoredObject;
use std::fmt;

/// Lifecycle step an event reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Create,
    Detect,
    Update,
    Delete,
}

impl EventType {
    /// Value sent as the Datadog `event_type`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Detect => "Detect",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Detect => "detected",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable event value delivered to a forwarder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub title: String,
    pub event_type: EventType,
}

impl Event {
    #[must_use]
    pub fn new(title: impl Into<String>, event_type: EventType) -> Self {
        Self {
            title: title.into(),
            event_type,
        }
    }

    /// Event sent once a forwarder is connected for `object`.
    #[must_use]
    pub fn detected(object: &MonitoredObject) -> Self {
        Self::new(
            format!("{} {}", object.id(), EventType::Detect.past_tense()),
            EventType::Detect,
        )
    }

    /// Event sent when the forwarder of `object` stops.
    #[must_use]
    pub fn deleted(object: &MonitoredObject) -> Self {
        Self::new(
            format!("{} {}", object.id(), EventType::Delete.past_tense()),
            EventType::Delete,
        )
    }

    /// Event describing a change applied by a reconciler to a child resource.
    ///
    /// # Example
    ///
    /// ```rust
    /// use datadog_operator::datadog::event::{Event, EventType};
    ///
    /// let event = Event::resource("Deployment", "datadog", "cluster-agent", EventType::Create);
    /// assert_eq!(event.title, "Deployment datadog/cluster-agent created");
    /// ```
    #[must_use]
    pub fn resource(kind: &str, namespace: &str, name: &str, event_type: EventType) -> Self {
        Self::new(
            format!("{kind} {namespace}/{name} {}", event_type.past_tense()),
            event_type,
        )
    }
}
