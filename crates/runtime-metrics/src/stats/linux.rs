// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process memory from `/proc/<pid>/status`.
//!
//! The relevant lines look like `VmSize:   123456 kB`. Values are reported in
//! kibibytes and converted to bytes here.

use std::fs;
use std::path::Path;

use tracing::trace;

use super::{ProcessMemory, StatsError};

const VM_SIZE: &str = "VmSize";
const VM_DATA: &str = "VmData";
const VM_STK: &str = "VmStk";
const VM_LIB: &str = "VmLib";
const RSS_ANON: &str = "RssAnon";

pub(crate) fn read_process_memory(path: &Path) -> Result<ProcessMemory, StatsError> {
    let contents = fs::read_to_string(path).map_err(|source| StatsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_status(&contents)
}

/// Parses the contents of a `status` file.
///
/// `VmSize` must be present; the other fields are missing for kernel threads
/// and on older kernels and default to zero.
pub(crate) fn parse_status(contents: &str) -> Result<ProcessMemory, StatsError> {
    let mut memory = ProcessMemory::default();
    let mut saw_vm_size = false;

    for line in contents.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key {
            VM_SIZE => {
                saw_vm_size = true;
                &mut memory.virtual_size
            }
            VM_DATA => &mut memory.data,
            VM_STK => &mut memory.stack,
            VM_LIB => &mut memory.libraries,
            RSS_ANON => &mut memory.resident_anon,
            _ => continue,
        };
        *slot = parse_kib(key, rest)?;
    }

    if !saw_vm_size {
        return Err(StatsError::Parse {
            field: VM_SIZE.to_string(),
            value: String::new(),
        });
    }

    trace!("Process memory: {memory:?}");
    Ok(memory)
}

fn parse_kib(field: &str, raw: &str) -> Result<u64, StatsError> {
    let parse_error = || StatsError::Parse {
        field: field.to_string(),
        value: raw.trim().to_string(),
    };
    let mut parts = raw.split_whitespace();
    let number = parts.next().ok_or_else(parse_error)?;
    let kib: u64 = number.parse().map_err(|_| parse_error())?;
    match parts.next() {
        Some("kB") | None => Ok(kib.saturating_mul(1024)),
        Some(_) => Err(parse_error()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\truntime-metric\n\
Umask:\t0022\n\
State:\tS (sleeping)\n\
VmPeak:\t  220000 kB\n\
VmSize:\t  210000 kB\n\
VmRSS:\t    9000 kB\n\
RssAnon:\t    4000 kB\n\
RssFile:\t    5000 kB\n\
VmData:\t   60000 kB\n\
VmStk:\t     132 kB\n\
VmExe:\t    2000 kB\n\
VmLib:\t    3000 kB\n\
Threads:\t5\n";

    #[test]
    fn test_parse_status() {
        let memory = parse_status(STATUS).expect("parse failed");
        assert_eq!(
            memory,
            ProcessMemory {
                virtual_size: 210_000 * 1024,
                data: 60_000 * 1024,
                resident_anon: 4_000 * 1024,
                stack: 132 * 1024,
                libraries: 3_000 * 1024,
            }
        );
    }

    #[test]
    fn test_parse_status_without_vm_size() {
        let result = parse_status("Name:\tkthreadd\nThreads:\t1\n");
        assert!(matches!(result, Err(StatsError::Parse { field, .. }) if field == VM_SIZE));
    }

    #[test]
    fn test_parse_status_bad_number() {
        let result = parse_status("VmSize:\t  lots kB\n");
        assert!(matches!(result, Err(StatsError::Parse { value, .. }) if value == "lots kB"));
    }

    #[test]
    fn test_parse_status_optional_fields_default_to_zero() {
        let memory = parse_status("VmSize:\t 8 kB\n").expect("parse failed");
        assert_eq!(memory.virtual_size, 8192);
        assert_eq!(memory.resident_anon, 0);
        assert_eq!(memory.libraries, 0);
    }

    #[test]
    fn test_read_process_memory_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("status");
        fs::write(&path, STATUS).expect("write status");

        let memory = read_process_memory(&path).expect("read failed");
        assert_eq!(memory.stack, 132 * 1024);
    }
}
