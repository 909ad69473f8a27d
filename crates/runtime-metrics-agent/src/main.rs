// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::alloc::System;
use std::env;
use std::sync::Arc;

use tracing::{debug, error, info};

use runtime_metrics::signal::shutdown_signal;
use runtime_metrics::{
    logging, Agent, AgentConfig, CountingAllocator, ProcessStatsReader, Transmitter,
};

#[global_allocator]
static GLOBAL: CountingAllocator<System> = CountingAllocator::new(System);

#[tokio::main]
pub async fn main() {
    let log_level = env::var("METRICS_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    if let Err(e) = logging::init(&log_level) {
        eprintln!("could not set up logging at level '{log_level}': {e}");
        return;
    }

    debug!("Logging subsystem enabled");

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {e}. Shutting down metrics agent.");
            return;
        }
    };

    let transmitter = match Transmitter::new(&config) {
        Ok(transmitter) => transmitter,
        Err(e) => {
            error!("Error creating transmitter: {e}. Shutting down metrics agent.");
            return;
        }
    };

    let agent = Agent::new(
        config,
        Arc::new(ProcessStatsReader::new()),
        Arc::new(transmitter),
    );

    match agent.run_until(shutdown_signal()).await {
        Ok(()) => info!("Metrics agent stopped"),
        Err(e) => error!("Metrics agent stopped with error: {e}"),
    }
}
