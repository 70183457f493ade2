// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watchers registering monitored objects with the forwarders manager.
//!
//! One watcher per monitored kind registers a forwarder when an object appears
//! and unregisters it when the object is deleted. After a re-list, forwarders of
//! objects that disappeared while the watch was down are unregistered too.
//!
//! The status publisher periodically copies each agent forwarder's
//! `ActiveDatadogMetrics` condition into the agent's status.

use crate::constants::STATUS_PUBLISH_INTERVAL_SECS;
use crate::crd::{DatadogAgent, DatadogMonitor};
use crate::datadog::manager::ForwardersManager;
use crate::datadog::object::{MonitoredObject, ObjectKind};
use crate::status::publish_condition;
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Applies watch events of one kind to the manager.
pub struct WatchHandler {
    kind: ObjectKind,
    manager: Arc<ForwardersManager>,
    relisted: Option<HashSet<MonitoredObject>>,
}

impl WatchHandler {
    #[must_use]
    pub fn new(kind: ObjectKind, manager: Arc<ForwardersManager>) -> Self {
        Self {
            kind,
            manager,
            relisted: None,
        }
    }

    /// Apply one watch event.
    pub fn handle<K: Resource>(&mut self, event: watcher::Event<K>, dt: &K::DynamicType) {
        match event {
            watcher::Event::Apply(resource) => {
                self.apply(&resource, dt);
            }
            watcher::Event::InitApply(resource) => {
                if let Some(object) = self.apply(&resource, dt) {
                    if let Some(seen) = self.relisted.as_mut() {
                        seen.insert(object);
                    }
                }
            }
            watcher::Event::Delete(resource) => {
                if let Some(object) = self.identify(&resource, dt) {
                    self.manager.unregister(&object);
                }
            }
            watcher::Event::Init => {
                debug!(kind = %self.kind, "Re-listing monitored objects");
                self.relisted = Some(HashSet::new());
            }
            watcher::Event::InitDone => {
                if let Some(seen) = self.relisted.take() {
                    self.forget_missing(&seen);
                }
            }
        }
    }

    fn identify<K: Resource>(&self, resource: &K, dt: &K::DynamicType) -> Option<MonitoredObject> {
        match MonitoredObject::from_resource(resource, dt) {
            Ok(object) => Some(object),
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Ignoring watched object");
                None
            }
        }
    }

    /// Register a live object, unregister one being deleted.
    fn apply<K: Resource>(&self, resource: &K, dt: &K::DynamicType) -> Option<MonitoredObject> {
        let object = self.identify(resource, dt)?;
        if resource.meta().deletion_timestamp.is_some() {
            self.manager.unregister(&object);
            return None;
        }
        self.manager.register(&object);
        Some(object)
    }

    fn forget_missing(&self, seen: &HashSet<MonitoredObject>) {
        for object in self
            .manager
            .registered()
            .into_iter()
            .filter(|object| object.kind == self.kind && !seen.contains(object))
        {
            info!(forwarder = %object, "Object disappeared while not watching");
            self.manager.unregister(&object);
        }
    }
}

/// Watch every object of one kind until the stream ends.
pub async fn watch_objects<K>(api: Api<K>, dt: K::DynamicType, kind: ObjectKind, manager: Arc<ForwardersManager>)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    info!(kind = %kind, "Starting watcher");
    let mut handler = WatchHandler::new(kind, manager);
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => handler.handle(event, &dt),
            Err(e) => warn!(kind = %kind, error = %e, "Watch error"),
        }
    }
    warn!(kind = %kind, "Watch stream ended");
}

/// Watch all monitored kinds cluster-wide.
pub async fn run_watchers(client: Client, manager: Arc<ForwardersManager>) {
    let internal = ObjectKind::DatadogAgentInternal.api_resource();
    tokio::join!(
        watch_objects(
            Api::<DatadogAgent>::all(client.clone()),
            (),
            ObjectKind::DatadogAgent,
            manager.clone(),
        ),
        watch_objects(
            Api::<DynamicObject>::all_with(client.clone(), &internal),
            internal.clone(),
            ObjectKind::DatadogAgentInternal,
            manager.clone(),
        ),
        watch_objects(
            Api::<DatadogMonitor>::all(client),
            (),
            ObjectKind::DatadogMonitor,
            manager,
        ),
    );
}

/// Publish the status of every agent forwarder.
pub async fn publish_statuses_once(client: &Client, manager: &ForwardersManager) {
    for object in manager
        .registered()
        .into_iter()
        .filter(|object| object.kind.is_agent())
    {
        let Some(condition) = manager.status_for(&object) else {
            continue;
        };
        if let Err(e) = publish_condition(client.clone(), &object, &condition).await {
            warn!(forwarder = %object, error = %e, "Cannot publish forwarder status");
        }
    }
}

/// Publish forwarder statuses every status interval, forever.
pub async fn run_status_publisher(client: Client, manager: Arc<ForwardersManager>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(STATUS_PUBLISH_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        publish_statuses_once(&client, &manager).await;
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
