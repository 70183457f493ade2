// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-object metrics forwarder.
//!
//! A [`MetricsForwarder`] runs as one tokio task per monitored object. It goes
//! through the following states:
//!
//! 1. **Initializing** - connect to the Datadog API immediately, then every
//!    `retry_interval` until it succeeds, the forwarder is stopped, or
//!    `max_connect_attempts` is exhausted
//! 2. **Connected** - send a `Detect` event for the object
//! 3. **Forwarding** - on every `send_interval` tick, re-read the object and its
//!    credentials and send gauges; reconcile outcomes and events arriving on the
//!    inbox channels are forwarded as they come
//! 4. **Stopping** - final best-effort cycle, `Delete` event, exit
//!
//! Cycle failures are recorded in the `ActiveDatadogMetrics` condition and never
//! end the task.

use super::api::{ApiConnector, DatadogApi};
use super::credentials::{CredentialResolver, Credentials, OperatorCredentials};
use super::event::Event;
use super::gauges::{
    base_url, cycle_tags, deployment_gauges, global_tags, monitor_gauges, reconcile_gauge,
    reconcile_metric_name, tags_with_extra, GaugePoint,
};
use super::object::{MonitoredObject, ObjectKind};
use super::reader::{AgentView, ClusterReader, MonitorView};
use super::reconcile::{LastReconcile, ReconcileFailure};
use crate::constants::{
    CONDITION_ACTIVE_DATADOG_METRICS, DEFAULT_BASE_URL, DEFAULT_METRICS_PREFIX,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SEND_INTERVAL_SECS, ERROR_CHANNEL_CAPACITY,
    EVENT_CHANNEL_CAPACITY, FORWARDING_OK_MESSAGE,
};
use crate::crd::{AgentCredentials, Condition};
use crate::errors::ForwarderError;
use crate::metrics::{
    record_cycle_error, record_cycle_success, record_forwarder_started, record_forwarder_stopped,
};
use crate::secrets::Decryptor;
use crate::status::transition_condition;
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, REASON_METRICS_FORWARDING_OK,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Forwarder behaviour shared by every forwarder of a manager.
#[derive(Clone, Debug)]
pub struct ForwarderConfig {
    /// Delay between two connection attempts.
    pub retry_interval: Duration,
    /// Delay between two forwarding cycles.
    pub send_interval: Duration,
    /// Give up connecting after this many attempts; `None` retries forever.
    pub max_connect_attempts: Option<u32>,
    /// Prefix of every metric name.
    pub metrics_prefix: String,
    /// Base URL used when an object does not set `ddUrl` or `site`.
    pub default_base_url: String,
    /// Operator-level credentials.
    pub credentials: OperatorCredentials,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            send_interval: Duration::from_secs(DEFAULT_SEND_INTERVAL_SECS),
            max_connect_attempts: None,
            metrics_prefix: DEFAULT_METRICS_PREFIX.to_string(),
            default_base_url: DEFAULT_BASE_URL.to_string(),
            credentials: OperatorCredentials::default(),
        }
    }
}

impl ForwarderConfig {
    /// Replace zero intervals with their defaults.
    ///
    /// A zero `send_interval` cannot drive a ticker and a zero `retry_interval`
    /// would reconnect in a busy loop.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.send_interval.is_zero() {
            warn!(
                default_secs = DEFAULT_SEND_INTERVAL_SECS,
                "Zero send interval, using the default"
            );
            self.send_interval = Duration::from_secs(DEFAULT_SEND_INTERVAL_SECS);
        }
        if self.retry_interval.is_zero() {
            warn!(
                default_secs = DEFAULT_RETRY_INTERVAL_SECS,
                "Zero retry interval, using the default"
            );
            self.retry_interval = Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS);
        }
        self
    }
}

/// Collaborators a forwarder talks to.
#[derive(Clone)]
pub struct ForwarderDeps {
    pub reader: Arc<dyn ClusterReader>,
    pub connector: Arc<dyn ApiConnector>,
    pub decryptor: Arc<dyn Decryptor>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State of a forwarder readable from other tasks.
///
/// The forwarder task is the only writer.
#[derive(Debug, Default)]
pub struct ForwarderShared {
    status: Mutex<Option<Condition>>,
    last_reconcile: Mutex<LastReconcile>,
}

impl ForwarderShared {
    /// Current `ActiveDatadogMetrics` condition, `None` before the first attempt.
    #[must_use]
    pub fn status(&self) -> Option<Condition> {
        lock(&self.status).clone()
    }

    #[must_use]
    pub fn last_reconcile(&self) -> LastReconcile {
        lock(&self.last_reconcile).clone()
    }

    /// Store `next` unless it equals the current value. Returns whether it was stored.
    fn replace_last_reconcile(&self, next: LastReconcile) -> bool {
        let mut last = lock(&self.last_reconcile);
        if *last == next {
            return false;
        }
        *last = next;
        true
    }

    fn set_status(&self, result: Result<(), &ForwarderError>) {
        let mut status = lock(&self.status);
        let next = match result {
            Ok(()) => transition_condition(
                status.as_ref(),
                CONDITION_ACTIVE_DATADOG_METRICS,
                CONDITION_STATUS_TRUE,
                REASON_METRICS_FORWARDING_OK,
                FORWARDING_OK_MESSAGE,
            ),
            Err(e) => transition_condition(
                status.as_ref(),
                CONDITION_ACTIVE_DATADOG_METRICS,
                CONDITION_STATUS_FALSE,
                e.reason(),
                &e.to_string(),
            ),
        };
        *status = Some(next);
    }
}

/// Sending half of a forwarder's channels, kept by the manager.
#[derive(Debug)]
pub struct Mailbox {
    pub stop: oneshot::Sender<()>,
    pub errors: mpsc::Sender<Option<ReconcileFailure>>,
    pub events: mpsc::Sender<Event>,
}

/// Receiving half of a forwarder's channels, consumed by [`MetricsForwarder::run`].
#[derive(Debug)]
pub struct Inbox {
    pub stop: oneshot::Receiver<()>,
    pub errors: mpsc::Receiver<Option<ReconcileFailure>>,
    pub events: mpsc::Receiver<Event>,
}

/// Create the bounded channels of a forwarder.
#[must_use]
pub fn mailbox() -> (Mailbox, Inbox) {
    let (stop_tx, stop_rx) = oneshot::channel();
    let (errors_tx, errors_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (
        Mailbox {
            stop: stop_tx,
            errors: errors_tx,
            events: events_tx,
        },
        Inbox {
            stop: stop_rx,
            errors: errors_rx,
            events: events_rx,
        },
    )
}

/// Where a forwarder reads the state it reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusSource {
    /// Deployment status of a `DatadogAgent` or `DatadogAgentInternal`.
    Agent(ObjectKind),
    /// Conditions of a `DatadogMonitor`.
    Monitor,
}

impl From<ObjectKind> for StatusSource {
    fn from(kind: ObjectKind) -> Self {
        if kind.is_agent() {
            Self::Agent(kind)
        } else {
            Self::Monitor
        }
    }
}

/// Object state read at the start of a cycle.
enum ObservedObject {
    Agent(AgentView),
    Monitor(MonitorView),
}

impl ObservedObject {
    fn credentials(&self) -> Option<&AgentCredentials> {
        match self {
            Self::Agent(view) => Some(&view.spec.credentials),
            Self::Monitor(_) => None,
        }
    }

    fn base_url(&self, default: &str) -> String {
        match self {
            Self::Agent(view) => base_url(&view.spec, default),
            Self::Monitor(_) => default.to_string(),
        }
    }

    fn cycle_tags(&self) -> Vec<String> {
        match self {
            Self::Agent(view) => cycle_tags(view.spec.cluster_name.as_deref(), &view.labels),
            Self::Monitor(view) => cycle_tags(None, &view.labels),
        }
    }
}

/// Forwards the metrics and events of one monitored object.
pub struct MetricsForwarder {
    id: String,
    object: MonitoredObject,
    source: StatusSource,
    config: Arc<ForwarderConfig>,
    reader: Arc<dyn ClusterReader>,
    connector: Arc<dyn ApiConnector>,
    resolver: CredentialResolver,
    client: Option<Arc<dyn DatadogApi>>,
    keys_hash: Option<u64>,
    base_url: String,
    global_tags: Vec<String>,
    tags: Vec<String>,
    shared: Arc<ForwarderShared>,
}

impl MetricsForwarder {
    #[must_use]
    pub fn new(object: MonitoredObject, config: Arc<ForwarderConfig>, deps: &ForwarderDeps) -> Self {
        let resolver = CredentialResolver::new(deps.decryptor.clone(), config.credentials.clone());
        Self {
            id: object.id(),
            source: StatusSource::from(object.kind),
            global_tags: global_tags(&object),
            tags: Vec::new(),
            client: None,
            keys_hash: None,
            base_url: String::new(),
            reader: deps.reader.clone(),
            connector: deps.connector.clone(),
            shared: Arc::new(ForwarderShared::default()),
            resolver,
            config,
            object,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn source(&self) -> StatusSource {
        self.source
    }

    /// Handle on the status and last reconcile outcome, readable while the task runs.
    #[must_use]
    pub fn shared(&self) -> Arc<ForwarderShared> {
        Arc::clone(&self.shared)
    }

    /// Run the forwarder until it is stopped or gives up connecting.
    pub async fn run(mut self, inbox: Inbox) {
        let Inbox {
            mut stop,
            mut errors,
            mut events,
        } = inbox;
        let kind = self.object.kind.as_str();

        record_forwarder_started(kind);
        info!(forwarder = %self.id, "Starting metrics forwarder");

        if self.connect_with_retry(&mut stop).await {
            self.forward_event(&Event::detected(&self.object)).await;

            let mut ticker = interval_at(
                Instant::now() + self.config.send_interval,
                self.config.send_interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop => {
                        info!(forwarder = %self.id, "Stopping metrics forwarder");
                        self.run_cycle().await;
                        self.forward_event(&Event::deleted(&self.object)).await;
                        break;
                    }
                    _ = ticker.tick() => self.run_cycle().await,
                    Some(failure) = errors.recv() => {
                        if let Err(e) = self.process_reconcile_error(failure).await {
                            warn!(forwarder = %self.id, error = %e, "Cannot forward reconcile metric");
                        }
                    }
                    Some(event) = events.recv() => self.forward_event(&event).await,
                }
            }
        }

        record_forwarder_stopped(kind);
        info!(forwarder = %self.id, "Metrics forwarder stopped");
    }

    /// Connect immediately, then every `retry_interval`.
    ///
    /// Returns `false` when stopped or out of attempts.
    async fn connect_with_retry(&mut self, stop: &mut oneshot::Receiver<()>) -> bool {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let result = self.connect_to_datadog_api().await;
            self.update_status(result.as_ref().map(|_| ()));

            match result {
                Ok(()) => {
                    info!(forwarder = %self.id, base_url = %self.base_url, "Connected to the Datadog API");
                    return true;
                }
                Err(e) => {
                    warn!(forwarder = %self.id, attempt = attempts, error = %e, "Cannot connect to the Datadog API");
                }
            }

            if let Some(max) = self.config.max_connect_attempts {
                if attempts >= max {
                    let exhausted = ForwarderError::AttemptsExhausted { attempts };
                    error!(forwarder = %self.id, error = %exhausted, "Giving up connecting to the Datadog API");
                    self.update_status(Err(&exhausted));
                    return false;
                }
            }

            tokio::select! {
                _ = &mut *stop => {
                    info!(forwarder = %self.id, "Stopped before connecting to the Datadog API");
                    return false;
                }
                () = tokio::time::sleep(self.config.retry_interval) => {}
            }
        }
    }

    /// Read the object, resolve its credentials and make sure a validated client exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be read, the credentials cannot be
    /// resolved, or the Datadog API rejects them.
    pub async fn connect_to_datadog_api(&mut self) -> Result<(), ForwarderError> {
        let observed = self.observe().await?;
        self.ensure_client(&observed).await?;
        self.tags = observed.cycle_tags();
        Ok(())
    }

    /// Run one forwarding cycle: refresh the connection, send status and reconcile gauges.
    ///
    /// # Errors
    ///
    /// Returns the first error that ends the cycle. Monitor gauge failures are
    /// logged and do not end it.
    pub async fn forward_metrics(&mut self) -> Result<(), ForwarderError> {
        let observed = self.observe().await?;
        self.ensure_client(&observed).await?;
        self.tags = observed.cycle_tags();

        self.send_status_metrics(&observed).await?;
        self.send_reconcile_metric().await
    }

    /// Record the latest reconcile outcome and forward it when it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the reconcile gauge cannot be sent.
    pub async fn process_reconcile_error(
        &mut self,
        failure: Option<ReconcileFailure>,
    ) -> Result<(), ForwarderError> {
        if !self
            .shared
            .replace_last_reconcile(LastReconcile::Outcome(failure))
        {
            return Ok(());
        }
        self.send_reconcile_metric().await
    }

    /// Value and tags of the reconcile gauge for the last known outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ForwarderError::ReconcileNeverSet`] before the first outcome.
    pub fn prepare_reconcile_metric(&self) -> Result<(f64, Vec<String>), ForwarderError> {
        reconcile_gauge(&self.shared.last_reconcile(), &self.global_tags, &self.tags)
    }

    /// Record the result of a connection attempt or cycle in the status condition.
    pub fn update_status(&self, result: Result<(), &ForwarderError>) {
        self.shared.set_status(result);
    }

    async fn run_cycle(&mut self) {
        let start = Instant::now();
        let result = self.forward_metrics().await;
        let duration = start.elapsed();

        match &result {
            Ok(()) => {
                debug!(forwarder = %self.id, "Metrics forwarded");
                record_cycle_success(self.object.kind.as_str(), duration);
            }
            Err(e) => {
                warn!(forwarder = %self.id, error = %e, "Cannot forward metrics");
                record_cycle_error(self.object.kind.as_str(), e.reason(), duration);
            }
        }
        self.update_status(result.as_ref().map(|_| ()));
    }

    async fn observe(&self) -> Result<ObservedObject, ForwarderError> {
        let namespace = &self.object.namespace;
        let name = &self.object.name;
        Ok(match self.source {
            StatusSource::Agent(kind) => {
                ObservedObject::Agent(self.reader.agent(kind, namespace, name).await?)
            }
            StatusSource::Monitor => {
                ObservedObject::Monitor(self.reader.monitor(namespace, name).await?)
            }
        })
    }

    /// Resolve credentials and reconnect when the keys or the base URL changed.
    async fn ensure_client(&mut self, observed: &ObservedObject) -> Result<(), ForwarderError> {
        let base_url = observed.base_url(&self.config.default_base_url);
        let credentials = self
            .resolver
            .resolve(
                self.reader.as_ref(),
                &self.object.namespace,
                observed.credentials(),
            )
            .await?;
        let hash = credentials.hash();

        if self.client.is_some() && self.keys_hash == Some(hash) && self.base_url == base_url {
            return Ok(());
        }
        self.init_client(base_url, &credentials, hash).await
    }

    async fn init_client(
        &mut self,
        base_url: String,
        credentials: &Credentials,
        hash: u64,
    ) -> Result<(), ForwarderError> {
        if self.client.is_some() {
            info!(forwarder = %self.id, base_url = %base_url, "Credentials or endpoint changed, reconnecting");
        }
        let client = self
            .connector
            .connect(&base_url, &credentials.api_key, &credentials.app_key)
            .await
            .map_err(ForwarderError::Connect)?;

        self.client = Some(client);
        self.keys_hash = Some(hash);
        self.base_url = base_url;
        Ok(())
    }

    fn client(&self) -> Result<&Arc<dyn DatadogApi>, ForwarderError> {
        self.client.as_ref().ok_or(ForwarderError::NotConnected)
    }

    async fn send_gauge(&self, point: &GaugePoint) -> Result<(), ForwarderError> {
        self.client()?
            .post_gauge(&point.metric, point.value, &point.tags)
            .await
            .map_err(ForwarderError::Submission)
    }

    async fn send_status_metrics(&self, observed: &ObservedObject) -> Result<(), ForwarderError> {
        let prefix = &self.config.metrics_prefix;
        match observed {
            ObservedObject::Agent(view) => {
                let Some(status) = view.status.as_ref() else {
                    debug!(forwarder = %self.id, "No status yet, skipping deployment metrics");
                    return Ok(());
                };
                for point in deployment_gauges(prefix, status, &self.global_tags, &self.tags) {
                    self.send_gauge(&point).await?;
                }
            }
            ObservedObject::Monitor(view) => {
                let Some(status) = view.status.as_ref() else {
                    debug!(forwarder = %self.id, "No status yet, skipping monitor metrics");
                    return Ok(());
                };
                for point in monitor_gauges(prefix, status, &self.global_tags, &self.tags) {
                    if let Err(e) = self.send_gauge(&point).await {
                        warn!(forwarder = %self.id, metric = %point.metric, error = %e, "Cannot send monitor metric");
                    }
                }
            }
        }
        Ok(())
    }

    async fn send_reconcile_metric(&self) -> Result<(), ForwarderError> {
        let (value, tags) = match self.prepare_reconcile_metric() {
            Ok(metric) => metric,
            Err(ForwarderError::ReconcileNeverSet) => {
                debug!(forwarder = %self.id, "No reconcile outcome yet, skipping reconcile metric");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.send_gauge(&GaugePoint {
            metric: reconcile_metric_name(&self.config.metrics_prefix),
            value,
            tags,
        })
        .await
    }

    async fn forward_event(&self, event: &Event) {
        let tags = tags_with_extra(&self.global_tags, &self.tags, &[]);
        let result = match self.client() {
            Ok(client) => client.post_event(event, &tags).await.map_err(ForwarderError::Submission),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(forwarder = %self.id, title = %event.title, error = %e, "Cannot forward event");
        }
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod forwarder_tests;
