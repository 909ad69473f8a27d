// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runtime statistics snapshot read on every sampling tick.
//!
//! The snapshot carries a fixed set of memory statistics. Heap counters come
//! from [`CountingAllocator`] (when the binary installs it as its global
//! allocator) and process memory figures come from `/proc/self/status` on
//! Linux. Statistics that only make sense for a garbage-collected runtime have
//! no source here and stay at zero.

mod allocator;
#[cfg(target_os = "linux")]
mod linux;

use std::path::PathBuf;

pub use allocator::{AllocationCounters, CountingAllocator};

/// Values projected into the store as gauges on every sampling tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuntimeStats {
    pub alloc: u64,
    pub buck_hash_sys: u64,
    pub frees: u64,
    pub gc_cpu_fraction: f64,
    pub gc_sys: u64,
    pub heap_alloc: u64,
    pub heap_idle: u64,
    pub heap_inuse: u64,
    pub heap_objects: u64,
    pub heap_released: u64,
    pub heap_sys: u64,
    pub last_gc: u64,
    pub lookups: u64,
    pub mcache_inuse: u64,
    pub mcache_sys: u64,
    pub mspan_inuse: u64,
    pub mspan_sys: u64,
    pub mallocs: u64,
    pub next_gc: u64,
    pub num_forced_gc: u32,
    pub num_gc: u32,
    pub other_sys: u64,
    pub pause_total_ns: u64,
    pub stack_inuse: u64,
    pub stack_sys: u64,
    pub sys: u64,
    pub total_alloc: u64,
}

/// Number of gauges produced by [`RuntimeStats::gauges`].
pub const RUNTIME_GAUGE_COUNT: usize = 27;

impl RuntimeStats {
    /// Pairs every field with the gauge name it is reported under.
    pub fn gauges(&self) -> [(&'static str, f64); RUNTIME_GAUGE_COUNT] {
        [
            ("Alloc", self.alloc as f64),
            ("BuckHashSys", self.buck_hash_sys as f64),
            ("Frees", self.frees as f64),
            ("GCCPUFraction", self.gc_cpu_fraction),
            ("GCSys", self.gc_sys as f64),
            ("HeapAlloc", self.heap_alloc as f64),
            ("HeapIdle", self.heap_idle as f64),
            ("HeapInuse", self.heap_inuse as f64),
            ("HeapObjects", self.heap_objects as f64),
            ("HeapReleased", self.heap_released as f64),
            ("HeapSys", self.heap_sys as f64),
            ("LastGC", self.last_gc as f64),
            ("Lookups", self.lookups as f64),
            ("MCacheInuse", self.mcache_inuse as f64),
            ("MCacheSys", self.mcache_sys as f64),
            ("MSpanInuse", self.mspan_inuse as f64),
            ("MSpanSys", self.mspan_sys as f64),
            ("Mallocs", self.mallocs as f64),
            ("NextGC", self.next_gc as f64),
            ("NumForcedGC", f64::from(self.num_forced_gc)),
            ("NumGC", f64::from(self.num_gc)),
            ("OtherSys", self.other_sys as f64),
            ("PauseTotalNs", self.pause_total_ns as f64),
            ("StackInuse", self.stack_inuse as f64),
            ("StackSys", self.stack_sys as f64),
            ("Sys", self.sys as f64),
            ("TotalAlloc", self.total_alloc as f64),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {field} from '{value}'")]
    Parse { field: String, value: String },
}

/// Source of runtime statistics.
pub trait RuntimeStatsReader {
    fn read(&self) -> Result<RuntimeStats, StatsError>;
}

/// Process memory figures read from the operating system, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ProcessMemory {
    pub virtual_size: u64,
    pub data: u64,
    pub resident_anon: u64,
    pub stack: u64,
    pub libraries: u64,
}

/// Reads statistics for the current process.
pub struct ProcessStatsReader {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    status_path: PathBuf,
}

impl Default for ProcessStatsReader {
    fn default() -> Self {
        Self {
            status_path: PathBuf::from("/proc/self/status"),
        }
    }
}

impl ProcessStatsReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads process memory from another `status` file, used by tests.
    pub fn with_status_path(path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: path.into(),
        }
    }

    #[cfg(target_os = "linux")]
    fn process_memory(&self) -> Result<ProcessMemory, StatsError> {
        linux::read_process_memory(&self.status_path)
    }

    #[cfg(not(target_os = "linux"))]
    fn process_memory(&self) -> Result<ProcessMemory, StatsError> {
        Ok(ProcessMemory::default())
    }
}

impl RuntimeStatsReader for ProcessStatsReader {
    fn read(&self) -> Result<RuntimeStats, StatsError> {
        let memory = self.process_memory()?;
        Ok(build_runtime_stats(AllocationCounters::current(), memory))
    }
}

fn build_runtime_stats(heap: AllocationCounters, memory: ProcessMemory) -> RuntimeStats {
    let live = heap.live_bytes();
    RuntimeStats {
        alloc: live,
        heap_alloc: live,
        total_alloc: heap.bytes_allocated,
        mallocs: heap.allocations,
        frees: heap.deallocations,
        heap_objects: heap.live_objects(),
        sys: memory.virtual_size,
        heap_sys: memory.data,
        heap_inuse: memory.resident_anon,
        heap_idle: memory.data.saturating_sub(memory.resident_anon),
        stack_inuse: memory.stack,
        stack_sys: memory.stack,
        other_sys: memory.libraries,
        ..RuntimeStats::default()
    }
}
