// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use datadog_operator::{
    config::OperatorArgs,
    constants::TOKIO_WORKER_THREADS,
    datadog::{api::HttpConnector, reader::KubeReader, ForwarderDeps, ForwardersManager},
    secrets::CommandDecryptor,
    server,
    watch::{run_status_publisher, run_watchers},
};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("datadog-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT (text or json)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let args = OperatorArgs::parse();
    info!(
        send_interval_secs = args.send_interval_secs,
        retry_interval_secs = args.retry_interval_secs,
        metrics_addr = %args.metrics_addr,
        "Starting Datadog metrics forwarding"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let deps = ForwarderDeps {
        reader: Arc::new(KubeReader::new(client.clone())),
        connector: Arc::new(
            HttpConnector::new(args.request_timeout())
                .context("Failed to build Datadog HTTP client")?,
        ),
        decryptor: Arc::new(CommandDecryptor::new(args.secret_backend_config())),
    };
    let manager = Arc::new(ForwardersManager::new(args.forwarder_config(), deps));

    // None of these should return; the first one that does ends the process
    let result = tokio::select! {
        () = run_watchers(client.clone(), manager.clone()) => {
            error!("CRITICAL: watchers exited unexpectedly");
            Err(anyhow::anyhow!("watchers exited unexpectedly"))
        }
        () = run_status_publisher(client.clone(), manager.clone()) => {
            error!("CRITICAL: status publisher exited unexpectedly");
            Err(anyhow::anyhow!("status publisher exited unexpectedly"))
        }
        result = server::serve(args.metrics_addr) => {
            error!("CRITICAL: metrics server exited: {:?}", result);
            result.context("Metrics server failed")
        }
        signal = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            signal.context("Failed to listen for shutdown signal")
        }
    };

    manager.shutdown().await;
    result
}
