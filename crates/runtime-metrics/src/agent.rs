// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent lifecycle: the sampling and reporting loops and their shutdown.
//!
//! Both loops are spawned tokio tasks driven by their own interval. They share
//! the metric store and one cancellation token, and nothing else. Once the
//! token is cancelled neither loop starts another tick.
//!
//! A third task supervises the loops. It is the only writer of the agent
//! status: it moves to `ShuttingDown` as soon as the token is cancelled, from
//! whichever side, and to `Stopped` once both loops have exited or been
//! aborted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::sampler::Sampler;
use crate::stats::RuntimeStatsReader;
use crate::store::MetricStore;
use crate::transmitter::Reporter;

/// Status of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Both loops are ticking.
    Running,
    /// Cancellation was requested; waiting for the loops to exit.
    ShuttingDown,
    /// Both loops have exited.
    Stopped,
}

/// How the loops ended, published once by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Clean,
    TimedOut,
}

pub struct Agent {
    config: AgentConfig,
    store: Arc<MetricStore>,
    reader: Arc<dyn RuntimeStatsReader + Send + Sync>,
    reporter: Arc<dyn Reporter + Send + Sync>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        reader: Arc<dyn RuntimeStatsReader + Send + Sync>,
        reporter: Arc<dyn Reporter + Send + Sync>,
    ) -> Self {
        Self {
            config,
            store: Arc::new(MetricStore::new()),
            reader,
            reporter,
        }
    }

    pub fn store(&self) -> Arc<MetricStore> {
        Arc::clone(&self.store)
    }

    /// Starts both loops and returns a handle in the `Running` state.
    ///
    /// Reads the runtime statistics once first: if that fails no loop is
    /// started, since every gauge would otherwise be reported as a stale zero.
    /// The first sampling tick happens one poll interval after start and the
    /// first reporting tick one report interval after start.
    pub fn start(self) -> Result<AgentHandle, AgentError> {
        self.config.validate()?;

        let sampler = Sampler::new(Arc::clone(&self.store), Arc::clone(&self.reader));
        sampler.probe()?;

        let shutdown_token = CancellationToken::new();
        let (status_tx, _) = broadcast::channel(16);
        let status = Arc::new(RwLock::new(AgentStatus::Running));
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let sample_task = tokio::spawn(run_sampling(
            sampler,
            self.config.poll_interval,
            shutdown_token.clone(),
        ));
        let report_task = tokio::spawn(run_reporting(
            Arc::clone(&self.store),
            self.reporter,
            self.config.report_interval,
            self.config.flush_on_shutdown,
            shutdown_token.clone(),
        ));

        tokio::spawn(supervise(
            vec![("sampling", sample_task), ("reporting", report_task)],
            shutdown_token.clone(),
            self.config.shutdown_timeout,
            Arc::clone(&status),
            status_tx.clone(),
            outcome_tx,
        ));

        info!(
            "Agent started: sampling every {:?}, reporting every {:?} to {}",
            self.config.poll_interval, self.config.report_interval, self.config.collector_url
        );
        let _ = status_tx.send(AgentStatus::Running);

        Ok(AgentHandle {
            store: self.store,
            status,
            status_tx,
            shutdown_token,
            outcome_rx,
        })
    }

    /// Runs the agent until `signal` resolves, then shuts it down.
    pub async fn run_until<F>(self, signal: F) -> Result<(), AgentError>
    where
        F: Future<Output = ()>,
    {
        let handle = self.start()?;
        let shutdown_token = handle.cancellation_token();
        tokio::select! {
            () = signal => {
                info!("Shutdown signal received");
            }
            () = shutdown_token.cancelled() => {}
        }
        handle.shutdown().await
    }
}

async fn run_sampling(sampler: Sampler, period: Duration, shutdown_token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                debug!("Sampling loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                sampler.sample_or_warn();
            }
        }
    }
}

async fn run_reporting(
    store: Arc<MetricStore>,
    reporter: Arc<dyn Reporter + Send + Sync>,
    period: Duration,
    flush_on_shutdown: bool,
    shutdown_token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                if flush_on_shutdown {
                    debug!("Reporting loop shutting down, performing final report");
                    reporter.report(&store.snapshot()).await;
                } else {
                    debug!("Reporting loop shutting down");
                }
                break;
            }
            _ = ticker.tick() => {
                let snapshot = store.snapshot();
                reporter.report(&snapshot).await;
            }
        }
    }
}

async fn supervise(
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
    status: Arc<RwLock<AgentStatus>>,
    status_tx: broadcast::Sender<AgentStatus>,
    outcome_tx: watch::Sender<Option<Outcome>>,
) {
    shutdown_token.cancelled().await;

    info!("Initiating graceful shutdown");
    *status.write().await = AgentStatus::ShuttingDown;
    let _ = status_tx.send(AgentStatus::ShuttingDown);

    let deadline = Instant::now() + shutdown_timeout;
    let mut outcome = Outcome::Clean;
    for (name, mut task) in tasks {
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(())) => debug!("{name} loop stopped"),
            Ok(Err(e)) => warn!("{name} loop failed: {e}"),
            Err(_) => {
                warn!("{name} loop did not stop in time, aborting");
                task.abort();
                outcome = Outcome::TimedOut;
            }
        }
    }

    *status.write().await = AgentStatus::Stopped;
    let _ = status_tx.send(AgentStatus::Stopped);
    info!("Agent shutdown complete");
    outcome_tx.send_replace(Some(outcome));
}

/// Handle to a running agent.
///
/// Cheap to clone; every clone controls the same agent.
#[derive(Clone)]
pub struct AgentHandle {
    store: Arc<MetricStore>,
    status: Arc<RwLock<AgentStatus>>,
    status_tx: broadcast::Sender<AgentStatus>,
    shutdown_token: CancellationToken,
    outcome_rx: watch::Receiver<Option<Outcome>>,
}

impl AgentHandle {
    pub fn store(&self) -> Arc<MetricStore> {
        Arc::clone(&self.store)
    }

    pub async fn status(&self) -> AgentStatus {
        *self.status.read().await
    }

    /// Check if the agent is currently running.
    pub async fn is_running(&self) -> bool {
        matches!(*self.status.read().await, AgentStatus::Running)
    }

    /// Get a receiver for status updates.
    pub fn status_receiver(&self) -> broadcast::Receiver<AgentStatus> {
        self.status_tx.subscribe()
    }

    /// Token observed by both loops. Cancelling it starts the shutdown without
    /// waiting for it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Stops both loops and waits for them to exit.
    ///
    /// Loops still running after the shutdown timeout are aborted and
    /// [`AgentError::ShutdownTimeout`] is returned. Concurrent callers all wait
    /// for the same outcome. Calling it again after the agent stopped is a
    /// no-op.
    pub async fn shutdown(&self) -> Result<(), AgentError> {
        if *self.status.read().await == AgentStatus::Stopped {
            return Ok(());
        }
        self.shutdown_token.cancel();
        self.wait().await
    }

    /// Waits until both loops have exited, for example after the token was
    /// cancelled from elsewhere. Does not cancel anything itself.
    pub async fn wait(&self) -> Result<(), AgentError> {
        let mut outcome_rx = self.outcome_rx.clone();
        let outcome = match outcome_rx.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            // the supervisor only goes away without an outcome if the
            // runtime is shutting down
            Err(_) => None,
        };
        match outcome {
            Some(Outcome::TimedOut) => Err(AgentError::ShutdownTimeout),
            Some(Outcome::Clean) | None => Ok(()),
        }
    }
}
