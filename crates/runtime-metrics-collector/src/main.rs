// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::sync::Arc;

use runtime_metrics::signal::shutdown_signal;
use runtime_metrics::{logging, MetricStore};
use runtime_metrics_collector::{bind_and_serve, DEFAULT_COLLECTOR_ADDR};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
pub async fn main() {
    let log_level = env::var("METRICS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let addr = env::var("METRICS_COLLECTOR_ADDR").unwrap_or(DEFAULT_COLLECTOR_ADDR.to_string());

    if let Err(e) = logging::init(&log_level) {
        eprintln!("could not set up logging at level '{log_level}': {e}");
        return;
    }

    debug!("Logging subsystem enabled");

    let store = Arc::new(MetricStore::new());
    let shutdown_token = CancellationToken::new();
    let server_token = shutdown_token.clone();
    let server = tokio::spawn(bind_and_serve_owned(addr, Arc::clone(&store), server_token));

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received");
            shutdown_token.cancel();
        }
        () = shutdown_token.cancelled() => {}
    }

    match server.await {
        Ok(Ok(())) => info!("Collector stopped, {} metrics recorded", store.len()),
        Ok(Err(e)) => error!("Collector failed: {e}"),
        Err(e) => error!("Collector task failed: {e}"),
    }
}

async fn bind_and_serve_owned(
    addr: String,
    store: Arc<MetricStore>,
    shutdown_token: CancellationToken,
) -> Result<(), runtime_metrics_collector::CollectorError> {
    let result = bind_and_serve(&addr, store, shutdown_token.clone()).await;
    // a failed bind must also end the process
    shutdown_token.cancel();
    result
}
