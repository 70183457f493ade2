// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator command line and environment configuration.
//!
//! Every option can be set with a flag or its environment variable. The Datadog
//! keys are usually injected from a Secret through `DD_API_KEY` / `DD_APP_KEY`
//! and may be `ENC[...]` values resolved by the secret backend.
//!
//! # Example
//!
//! ```rust
//! use clap::Parser;
//! use datadog_operator::config::OperatorArgs;
//!
//! let args = OperatorArgs::parse_from(["datadog-operator", "--send-interval-secs", "30"]);
//! assert_eq!(args.forwarder_config().send_interval.as_secs(), 30);
//! ```

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_METRICS_ADDR, DEFAULT_METRICS_PREFIX, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_SECRET_BACKEND_OUTPUT_MAX_BYTES,
    DEFAULT_SECRET_BACKEND_TIMEOUT_SECS, DEFAULT_SEND_INTERVAL_SECS,
};
use crate::datadog::credentials::OperatorCredentials;
use crate::datadog::forwarder::ForwarderConfig;
use crate::secrets::SecretBackendConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Datadog operator metrics forwarding
#[derive(Parser, Clone, Debug)]
#[command(name = "datadog-operator", version, about, long_about = None)]
pub struct OperatorArgs {
    /// Operator-level Datadog API key
    #[arg(long, env = "DD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Operator-level Datadog application key
    #[arg(long, env = "DD_APP_KEY", hide_env_values = true)]
    pub app_key: Option<String>,

    /// Datadog API base URL used when an object sets neither ddUrl nor site
    #[arg(long, env = "DD_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Prefix of every forwarded metric
    #[arg(long, env = "DD_METRICS_PREFIX", default_value = DEFAULT_METRICS_PREFIX)]
    pub metrics_prefix: String,

    /// Seconds between two forwarding cycles (at least 1)
    #[arg(long, env = "DD_SEND_INTERVAL_SECS", value_parser = clap::value_parser!(u64).range(1..), default_value_t = DEFAULT_SEND_INTERVAL_SECS)]
    pub send_interval_secs: u64,

    /// Seconds between two connection attempts (at least 1)
    #[arg(long, env = "DD_RETRY_INTERVAL_SECS", value_parser = clap::value_parser!(u64).range(1..), default_value_t = DEFAULT_RETRY_INTERVAL_SECS)]
    pub retry_interval_secs: u64,

    /// Stop connecting after this many attempts (unbounded when unset)
    #[arg(long, env = "DD_MAX_CONNECT_ATTEMPTS")]
    pub max_connect_attempts: Option<u32>,

    /// Timeout of a single Datadog API request, in seconds (at least 1)
    #[arg(long, env = "DD_REQUEST_TIMEOUT_SECS", value_parser = clap::value_parser!(u64).range(1..), default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Secret backend executable resolving ENC[...] values
    #[arg(long, env = "DD_SECRET_BACKEND_COMMAND")]
    pub secret_backend_command: Option<PathBuf>,

    /// Argument passed to the secret backend executable (repeatable)
    #[arg(long = "secret-backend-arg", env = "DD_SECRET_BACKEND_ARGUMENTS", value_delimiter = ' ')]
    pub secret_backend_args: Vec<String>,

    /// Secret backend timeout, in seconds
    #[arg(long, env = "DD_SECRET_BACKEND_TIMEOUT", default_value_t = DEFAULT_SECRET_BACKEND_TIMEOUT_SECS)]
    pub secret_backend_timeout_secs: u64,

    /// Maximum size of the secret backend output, in bytes
    #[arg(long, env = "DD_SECRET_BACKEND_OUTPUT_MAX_SIZE", default_value_t = DEFAULT_SECRET_BACKEND_OUTPUT_MAX_BYTES)]
    pub secret_backend_output_max_bytes: usize,

    /// Address of the /metrics and /healthz server
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,
}

impl OperatorArgs {
    #[must_use]
    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            send_interval: Duration::from_secs(self.send_interval_secs),
            max_connect_attempts: self.max_connect_attempts,
            metrics_prefix: self.metrics_prefix.clone(),
            default_base_url: self.base_url.clone(),
            credentials: OperatorCredentials {
                api_key: self.api_key.clone().filter(|k| !k.is_empty()),
                app_key: self.app_key.clone().filter(|k| !k.is_empty()),
            },
        }
    }

    #[must_use]
    pub fn secret_backend_config(&self) -> SecretBackendConfig {
        SecretBackendConfig {
            command: self.secret_backend_command.clone(),
            args: self.secret_backend_args.clone(),
            timeout: Duration::from_secs(self.secret_backend_timeout_secs),
            output_max_bytes: self.secret_backend_output_max_bytes,
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
