//! CPU pinning for sequencer loop threads
//!
//! A pacing loop that migrates between cores picks up scheduler jitter on
//! every migration. Workers can therefore pin their loop thread to one core
//! from a configured CPU list; worker `i` gets `cores[i % cores.len()]`.
//!
//! Pinning is supported on Linux via `sched_setaffinity`. On other platforms
//! [`pin_current_thread`] returns an error, which the sequencer logs and
//! otherwise ignores.
//!
//! # Example
//!
//! ```
//! use reqpulse::platform::affinity::{core_for_worker, parse_cpu_list};
//!
//! let cores = parse_cpu_list("0,2-4").unwrap();
//! assert_eq!(cores, vec![0, 2, 3, 4]);
//! assert_eq!(core_for_worker(&cores, 5), Some(2));
//! ```

use crate::Result;
use anyhow::Context;

/// Largest core id representable in a `cpu_set_t`
const MAX_CORE_ID: usize = 1023;

/// Pin the calling thread to a single CPU core
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: usize) -> Result<()> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_ZERO};
    use std::mem;

    if core > MAX_CORE_ID {
        anyhow::bail!("CPU core id {} is too large (max {})", core, MAX_CORE_ID);
    }

    // SAFETY: cpu_set_t is plain data; zeroed is its empty state
    unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);
        CPU_SET(core, &mut cpu_set);

        // 0 = calling thread
        let result = sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &cpu_set);
        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).with_context(|| format!("Failed to pin thread to CPU core {}", core));
        }
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_core: usize) -> Result<()> {
    anyhow::bail!("CPU pinning is only supported on Linux")
}

/// Parse a CPU list such as `"0,2-4,7"`
///
/// Ranges are inclusive. The result is sorted and deduplicated.
pub fn parse_cpu_list(spec: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start: usize = start
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid CPU core number: {}", start))?;
                let end: usize = end
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid CPU core number: {}", end))?;
                if start > end {
                    anyhow::bail!("Invalid CPU range: start ({}) > end ({})", start, end);
                }
                cores.extend(start..=end);
            }
            None => {
                let core: usize = part
                    .parse()
                    .with_context(|| format!("Invalid CPU core number: {}", part))?;
                cores.push(core);
            }
        }
    }

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }
    if let Some(&max) = cores.iter().max() {
        if max > MAX_CORE_ID {
            anyhow::bail!("CPU core id {} is too large (max {})", max, MAX_CORE_ID);
        }
    }

    cores.sort_unstable();
    cores.dedup();
    Ok(cores)
}

/// Core assigned to `worker_id`, cycling through `cores`
pub fn core_for_worker(cores: &[usize], worker_id: usize) -> Option<usize> {
    if cores.is_empty() {
        None
    } else {
        Some(cores[worker_id % cores.len()])
    }
}

/// Number of logical CPUs available
pub fn available_cpus() -> usize {
    num_cpus::get()
}

/// Log a warning if more busy loops than CPUs were requested
///
/// Returns true if oversubscribed.
pub fn warn_if_oversubscribed(workers: usize) -> bool {
    let cpus = available_cpus();
    if workers > cpus {
        tracing::warn!(
            workers,
            cpus,
            "more workers than CPUs; pacing precision will suffer from context switches"
        );
        true
    } else {
        false
    }
}
