// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Datadog metrics forwarding.
//!
//! One [`forwarder::MetricsForwarder`] task per monitored custom resource keeps an
//! authenticated Datadog API client and periodically sends deployment, monitor and
//! reconcile gauges, plus lifecycle events. The [`manager::ForwardersManager`]
//! owns the forwarders and is the interface used by the rest of the operator.
//!
//! # Modules
//!
//! - [`object`] - Identity of monitored objects
//! - [`event`] - Events forwarded to Datadog
//! - [`reconcile`] - Reconcile outcomes reported by reconcilers
//! - [`api`] - Datadog HTTP API client
//! - [`reader`] - Kubernetes reads performed by forwarders
//! - [`credentials`] - API/APP key resolution and decryption cache
//! - [`gauges`] - Metric names, tags and values
//! - [`forwarder`] - The per-object forwarding task
//! - [`manager`] - Forwarder registry

pub mod api;
pub mod credentials;
pub mod event;
pub mod forwarder;
pub mod gauges;
pub mod manager;
pub mod object;
pub mod reader;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

pub use forwarder::{ForwarderConfig, ForwarderDeps};
pub use manager::ForwardersManager;
pub use object::{MonitoredObject, ObjectKind};
