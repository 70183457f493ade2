// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Datadog Operator - metrics forwarding
//!
//! Forwards health metrics and lifecycle events of Datadog operator custom
//! resources (`DatadogAgent`, `DatadogAgentInternal` and `DatadogMonitor`) to the
//! Datadog API.
//!
//! ## Overview
//!
//! Each monitored object gets its own forwarder task. The forwarder resolves the
//! Datadog credentials of the object, connects to the Datadog API and then sends
//! gauges on a fixed interval until the object is deleted. Reconcile errors and
//! lifecycle events are pushed to the forwarder by the [`datadog::ForwardersManager`].
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definitions for monitored objects
//! - [`datadog`] - Forwarders, their manager and the Datadog API client
//! - [`secrets`] - `ENC[...]` decryption through the secret backend command
//! - [`watch`] - Kubernetes watchers feeding the manager
//! - [`server`] - `/metrics` and `/healthz` endpoints
//!
//! ## Example
//!
//! ```rust
//! use datadog_operator::datadog::{MonitoredObject, ObjectKind};
//!
//! let object = MonitoredObject::new(ObjectKind::DatadogAgent, "datadog", "agent");
//! assert_eq!(object.id(), "DatadogAgent/datadog/agent");
//! ```

pub mod config;
pub mod constants;
pub mod crd;
pub mod datadog;
pub mod errors;
pub mod metrics;
pub mod retry;
pub mod secrets;
pub mod server;
pub mod status;
pub mod status_reasons;
pub mod watch;
