// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::stats::{RuntimeStatsReader, StatsError};
use crate::store::MetricStore;

/// Counter incremented once per completed sampling tick.
pub const POLL_COUNT: &str = "PollCount";
/// Gauge set to a fresh random integer on every sampling tick.
pub const RANDOM_VALUE: &str = "RandomValue";
/// Exclusive upper bound of [`RANDOM_VALUE`].
pub const RANDOM_VALUE_UPPER_BOUND: u64 = 1_000_000_000_000_000;

/// Projects runtime statistics into the metric store.
pub struct Sampler {
    store: Arc<MetricStore>,
    reader: Arc<dyn RuntimeStatsReader + Send + Sync>,
}

impl Sampler {
    pub fn new(
        store: Arc<MetricStore>,
        reader: Arc<dyn RuntimeStatsReader + Send + Sync>,
    ) -> Self {
        Self { store, reader }
    }

    /// Reads the statistics once without touching the store.
    ///
    /// Used at startup to fail fast when no statistics are available.
    pub fn probe(&self) -> Result<(), StatsError> {
        self.reader.read().map(|_| ())
    }

    /// Runs one sampling tick.
    ///
    /// Every gauge, the poll counter and the random value are written under a
    /// single store lock. If the statistics cannot be read nothing is written.
    pub fn sample(&self) -> Result<(), StatsError> {
        let stats = self.reader.read()?;
        let random_value = rand::rng().random_range(0..RANDOM_VALUE_UPPER_BOUND);

        self.store.update(|batch| {
            for (name, value) in stats.gauges() {
                batch.set_gauge(name, value);
            }
            batch.increment_counter(POLL_COUNT, 1);
            batch.set_gauge(RANDOM_VALUE, random_value as f64);
        });

        debug!("Sampled runtime statistics");
        Ok(())
    }

    /// Runs one sampling tick, logging instead of returning a failure.
    pub fn sample_or_warn(&self) {
        if let Err(e) = self.sample() {
            warn!("Skipping sampling tick, runtime statistics unavailable: {e}");
        }
    }
}
