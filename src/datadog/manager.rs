// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry of running metrics forwarders.
//!
//! The [`ForwardersManager`] is the only entry point reconcilers and watchers use:
//! they register objects when they first see them, report reconcile outcomes and
//! events, read the forwarding status, and unregister objects on deletion.
//!
//! None of these calls block on a forwarder. Reconcile outcomes and events are
//! queued on bounded channels; when a channel is full or its forwarder is gone,
//! the item is dropped, logged and counted in
//! `datadog_operator_forwarder_dropped_telemetry_total`.
//!
//! # Example
//!
//! ```rust,no_run
//! use datadog_operator::datadog::manager::ForwardersManager;
//! use datadog_operator::datadog::object::{MonitoredObject, ObjectKind};
//!
//! # async fn example(manager: ForwardersManager) {
//! let agent = MonitoredObject::new(ObjectKind::DatadogAgent, "datadog", "datadog-agent");
//! manager.register(&agent);
//! manager.process_error(&agent, None);
//! manager.unregister(&agent);
//! manager.shutdown().await;
//! # }
//! ```

use super::event::Event;
use super::forwarder::{mailbox, ForwarderConfig, ForwarderDeps, ForwarderShared, Mailbox, MetricsForwarder};
use super::object::MonitoredObject;
use super::reconcile::ReconcileFailure;
use crate::crd::Condition;
use crate::metrics::record_dropped_telemetry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

const ERROR_CHANNEL: &str = "error";
const EVENT_CHANNEL: &str = "event";

struct ForwarderHandle {
    object: MonitoredObject,
    mailbox: Mailbox,
    shared: Arc<ForwarderShared>,
    /// Resolves once the task has exited.
    done: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Registry {
    forwarders: HashMap<String, ForwarderHandle>,
    /// Unregistered forwarders whose task may still be flushing.
    draining: HashMap<String, oneshot::Receiver<()>>,
    tasks: JoinSet<()>,
    shutting_down: bool,
}

impl Registry {
    /// Collect tasks that already exited.
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "Metrics forwarder task failed");
            }
        }
        self.draining
            .retain(|_, done| matches!(done.try_recv(), Err(TryRecvError::Empty)));
    }
}

/// Creates, looks up and stops one [`MetricsForwarder`] per monitored object.
pub struct ForwardersManager {
    config: Arc<ForwarderConfig>,
    deps: ForwarderDeps,
    registry: Mutex<Registry>,
}

impl ForwardersManager {
    /// Zero intervals in `config` fall back to their defaults.
    #[must_use]
    pub fn new(config: ForwarderConfig, deps: ForwarderDeps) -> Self {
        Self {
            config: Arc::new(config.normalized()),
            deps,
            registry: Mutex::new(Registry::default()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a forwarder for `object` unless one is already registered.
    ///
    /// When a previous forwarder of the same object is still stopping, the new one
    /// starts only after it exited, so a `Delete` event never follows the new
    /// `Detect` event.
    ///
    /// Must be called from within a tokio runtime. Refused once shutdown started.
    pub fn register(&self, object: &MonitoredObject) {
        let id = object.id();
        let mut registry = self.registry();
        registry.reap();

        if registry.shutting_down {
            warn!(forwarder = %id, "Shutdown in progress, not registering metrics forwarder");
            return;
        }
        if registry.forwarders.contains_key(&id) {
            return;
        }

        let forwarder = MetricsForwarder::new(object.clone(), Arc::clone(&self.config), &self.deps);
        let shared = forwarder.shared();
        let (mailbox, inbox) = mailbox();
        let (done_tx, done) = oneshot::channel();
        let previous = registry.draining.remove(&id);
        if previous.is_some() {
            debug!(forwarder = %id, "Previous metrics forwarder still stopping, delaying start");
        }
        registry.tasks.spawn(async move {
            if let Some(previous) = previous {
                // Err means the previous task is gone without signalling, e.g. it panicked.
                let _ = previous.await;
            }
            forwarder.run(inbox).await;
            let _ = done_tx.send(());
        });
        registry.forwarders.insert(
            id.clone(),
            ForwarderHandle {
                object: object.clone(),
                mailbox,
                shared,
                done,
            },
        );
        info!(forwarder = %id, "Registered metrics forwarder");
    }

    /// Stop and forget the forwarder of `object`, if any. Does not wait for the task;
    /// a later [`register`](Self::register) of the same object does.
    pub fn unregister(&self, object: &MonitoredObject) {
        let id = object.id();
        let mut registry = self.registry();

        let Some(handle) = registry.forwarders.remove(&id) else {
            debug!(forwarder = %id, "No metrics forwarder to unregister");
            return;
        };
        // The receiver is gone when the task already exited.
        let _ = handle.mailbox.stop.send(());
        registry.draining.insert(id.clone(), handle.done);
        registry.reap();
        info!(forwarder = %id, "Unregistered metrics forwarder");
    }

    /// Queue the latest reconcile outcome of `object`: `None` for success.
    ///
    /// Fed by the reconcilers embedding this crate after each reconcile. The
    /// bundled binary runs no reconciler and never calls it, so its forwarders
    /// send no reconcile metric.
    pub fn process_error(&self, object: &MonitoredObject, failure: Option<ReconcileFailure>) {
        let id = object.id();
        let registry = self.registry();
        let Some(handle) = registry.forwarders.get(&id) else {
            debug!(forwarder = %id, "No metrics forwarder, dropping reconcile outcome");
            record_dropped_telemetry(object.kind.as_str(), ERROR_CHANNEL, "unregistered");
            return;
        };

        if let Err(e) = handle.mailbox.errors.try_send(failure) {
            warn!(forwarder = %id, reason = drop_reason(&e), "Dropping reconcile outcome");
            record_dropped_telemetry(object.kind.as_str(), ERROR_CHANNEL, drop_reason(&e));
        }
    }

    /// Queue an event for `object`.
    ///
    /// Like [`process_error`](Self::process_error), fed by embedding reconcilers.
    /// The bundled binary only emits the forwarder's own `Detect` and `Delete` events.
    pub fn process_event(&self, object: &MonitoredObject, event: Event) {
        let id = object.id();
        let registry = self.registry();
        let Some(handle) = registry.forwarders.get(&id) else {
            debug!(forwarder = %id, title = %event.title, "No metrics forwarder, dropping event");
            record_dropped_telemetry(object.kind.as_str(), EVENT_CHANNEL, "unregistered");
            return;
        };

        if let Err(e) = handle.mailbox.events.try_send(event) {
            warn!(forwarder = %id, reason = drop_reason(&e), "Dropping event");
            record_dropped_telemetry(object.kind.as_str(), EVENT_CHANNEL, drop_reason(&e));
        }
    }

    /// `ActiveDatadogMetrics` condition of the forwarder of `object`.
    ///
    /// `None` when no forwarder is registered or before its first connection attempt.
    #[must_use]
    pub fn status_for(&self, object: &MonitoredObject) -> Option<Condition> {
        self.registry()
            .forwarders
            .get(&object.id())
            .and_then(|handle| handle.shared.status())
    }

    /// Objects with a registered forwarder.
    #[must_use]
    pub fn registered(&self) -> Vec<MonitoredObject> {
        self.registry()
            .forwarders
            .values()
            .map(|handle| handle.object.clone())
            .collect()
    }

    /// Stop every forwarder and wait for all tasks, including unregistered ones
    /// still flushing.
    pub async fn shutdown(&self) {
        let mut tasks = {
            let mut registry = self.registry();
            registry.shutting_down = true;
            for (id, handle) in registry.forwarders.drain() {
                debug!(forwarder = %id, "Stopping metrics forwarder");
                let _ = handle.mailbox.stop.send(());
            }
            registry.draining.clear();
            std::mem::take(&mut registry.tasks)
        };

        info!(tasks = tasks.len(), "Waiting for metrics forwarders to stop");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Metrics forwarder task failed");
            }
        }
        info!("All metrics forwarders stopped");
    }

    /// Wait for `signal`, then [`shutdown`](Self::shutdown).
    pub async fn run_until<F>(&self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.shutdown().await;
    }
}

fn drop_reason<T>(err: &TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "full",
        TrySendError::Closed(_) => "closed",
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
