// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Runtime Metrics
//!
//! An in-process agent that samples runtime statistics of the current process
//! and reports them to a metrics collector over HTTP.
//!
//! ## Architecture
//!
//! - [`stats`]: reading runtime statistics (allocator counters and procfs)
//! - [`sampler`]: projecting statistics into the store on every sampling tick
//! - [`store`]: the shared gauge and counter table
//! - [`metric`]: metric kinds, values and the `/update/{kind}/{name}/{value}` path codec
//! - [`request`]: turning a snapshot into update requests
//! - [`transmitter`]: sending update requests to the collector
//! - [`agent`]: the sampling and reporting loops and their shutdown
//! - [`logging`] and [`signal`]: process setup shared by the binaries
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use runtime_metrics::{Agent, AgentConfig, ProcessStatsReader, Transmitter};
//!
//! # async fn run() -> Result<(), runtime_metrics::AgentError> {
//! let config = AgentConfig::from_env()?;
//! let transmitter = Transmitter::new(&config)?;
//! let agent = Agent::new(config, Arc::new(ProcessStatsReader::new()), Arc::new(transmitter));
//!
//! let handle = agent.start()?;
//! // ... later
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod agent;
pub mod config;
pub mod error;
pub mod http_utils;
pub mod logging;
pub mod metric;
pub mod request;
pub mod sampler;
pub mod signal;
pub mod stats;
pub mod store;
pub mod transmitter;

pub use agent::{Agent, AgentHandle, AgentStatus};
pub use config::AgentConfig;
pub use error::AgentError;
pub use metric::{MetricKind, MetricUpdate, MetricValue, ParseError};
pub use stats::{CountingAllocator, ProcessStatsReader, RuntimeStats, RuntimeStatsReader};
pub use store::{MetricStore, Snapshot};
pub use transmitter::{ReportSummary, Reporter, Transmitter};
