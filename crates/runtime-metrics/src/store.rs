// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory metric store shared by the sampling and reporting loops.
//!
//! The store is written by the sampler on every sampling tick and read by the
//! reporter on every reporting tick. Reads never happen while a write is in
//! progress: writes take the write lock, and readers copy everything out under
//! the read lock into a [`Snapshot`] that is then iterated without any lock.

use std::collections::{btree_map, BTreeMap, HashMap};
use std::sync::RwLock;

use crate::metric::{MetricKind, MetricValue};

#[derive(Debug, Default)]
pub struct MetricStore {
    entries: RwLock<HashMap<String, MetricValue>>,
}

/// Write access to the store while its write lock is held.
///
/// Obtained through [`MetricStore::update`]; every write made through one
/// batch becomes visible to readers at once.
pub struct MetricBatch<'a> {
    entries: &'a mut HashMap<String, MetricValue>,
}

impl MetricBatch<'_> {
    pub fn set_gauge(&mut self, name: &str, value: f64) {
        set_gauge(self.entries, name, value);
    }

    pub fn increment_counter(&mut self, name: &str, delta: i64) {
        increment_counter(self.entries, name, delta);
    }
}

fn set_gauge(entries: &mut HashMap<String, MetricValue>, name: &str, value: f64) {
    match entries.get_mut(name) {
        Some(slot) => *slot = MetricValue::Gauge(value),
        None => {
            entries.insert(name.to_string(), MetricValue::Gauge(value));
        }
    }
}

// A gauge stored under the same name is replaced by a fresh counter.
fn increment_counter(entries: &mut HashMap<String, MetricValue>, name: &str, delta: i64) {
    match entries.get_mut(name) {
        Some(MetricValue::Counter(current)) => *current = current.saturating_add(delta),
        Some(slot) => *slot = MetricValue::Counter(delta),
        None => {
            entries.insert(name.to_string(), MetricValue::Counter(delta));
        }
    }
}

#[allow(clippy::expect_used)]
impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites (or creates) the gauge `name`.
    pub fn set_gauge(&self, name: &str, value: f64) {
        let mut entries = self.entries.write().expect("lock poisoned");
        set_gauge(&mut entries, name, value);
    }

    /// Adds `delta` to the counter `name`, starting from 0 when absent.
    pub fn increment_counter(&self, name: &str, delta: i64) {
        let mut entries = self.entries.write().expect("lock poisoned");
        increment_counter(&mut entries, name, delta);
    }

    /// Overwrites (or creates) `name` with `value`, whatever its kind.
    ///
    /// Used where the value already is the current total, such as a counter
    /// received from a reporting agent.
    pub fn set(&self, name: &str, value: MetricValue) {
        let mut entries = self.entries.write().expect("lock poisoned");
        match entries.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                entries.insert(name.to_string(), value);
            }
        }
    }

    /// Applies several writes under a single acquisition of the write lock.
    pub fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut MetricBatch<'_>) -> R,
    {
        let mut entries = self.entries.write().expect("lock poisoned");
        let mut batch = MetricBatch {
            entries: &mut entries,
        };
        f(&mut batch)
    }

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.entries
            .read()
            .expect("lock poisoned")
            .get(name)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies every entry out of the store.
    pub fn snapshot(&self) -> Snapshot {
        let entries = self.entries.read().expect("lock poisoned");
        Snapshot {
            entries: entries
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
        }
    }
}

/// Immutable point-in-time copy of a [`MetricStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<String, MetricValue>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MetricValue> {
        self.entries.iter()
    }

    pub fn gauges(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().filter_map(|(name, value)| match value {
            MetricValue::Gauge(v) => Some((name.as_str(), *v)),
            MetricValue::Counter(_) => None,
        })
    }

    pub fn counters(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().filter_map(|(name, value)| match value {
            MetricValue::Counter(v) => Some((name.as_str(), *v)),
            MetricValue::Gauge(_) => None,
        })
    }

    pub fn count_of(&self, kind: MetricKind) -> usize {
        self.entries.values().filter(|v| v.kind() == kind).count()
    }
}

impl FromIterator<(String, MetricValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a MetricValue);
    type IntoIter = btree_map::Iter<'a, String, MetricValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
