//! Process resource probes.
//!
//! Only resident memory is available. CPU usage has no portable source here
//! and is reported as zero by the monitor.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Resident set size of the current process in bytes, if the platform
/// exposes it.
#[cfg(target_os = "linux")]
#[must_use]
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb * 1024)
}

/// Resident set size of the current process in bytes, if the platform
/// exposes it.
#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn resident_memory_bytes() -> Option<u64> {
    None
}

/// `VmRSS` in kB from the contents of `/proc/<pid>/status`.
#[must_use]
pub fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Resident memory in megabytes, or `0.0` when unavailable.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn resident_memory_mb() -> f64 {
    resident_memory_bytes().map_or(0.0, |bytes| bytes as f64 / BYTES_PER_MB)
}
