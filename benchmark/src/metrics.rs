use std::time::Duration;

use crate::timing::as_millis_f64;

/// Shortest interval throughput is computed over. A zero reading (coarse
/// clock, tiny file) is raised to this so throughput stays finite.
pub const MIN_MEASURABLE_INTERVAL: Duration = Duration::from_nanos(1);

const BYTES_PER_MIB: f64 = (1u64 << 20) as f64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunMetrics {
    pub read_time_ms: f64,
    pub throughput_mbps: f64,
    /// The elapsed time was below [`MIN_MEASURABLE_INTERVAL`].
    pub clamped: bool,
}

/// Throughput in MiB/s for `file_size` bytes read in `elapsed`.
///
/// `read_time_ms` reports the measured time as is; only the divisor used for
/// throughput is clamped.
pub fn compute(file_size: u64, elapsed: Duration) -> RunMetrics {
    let clamped = elapsed < MIN_MEASURABLE_INTERVAL;
    let divisor_ms = as_millis_f64(elapsed.max(MIN_MEASURABLE_INTERVAL));
    RunMetrics {
        read_time_ms: as_millis_f64(elapsed),
        throughput_mbps: (file_size as f64 / BYTES_PER_MIB) / (divisor_ms / 1000.0),
        clamped,
    }
}
