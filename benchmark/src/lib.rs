//! Sequential read throughput benchmark for a file device.
//!
//! A sweep reads one fixed-size test file front to back, once per repetition,
//! for every chunk size in a [`schedule::ChunkSchedule`]. Each repetition is
//! timed around the read loop only and recorded as one CSV row:
//!
//! ```text
//! chunk_size,run_number,read_time_ms,throughput_mbps
//! 100,1,4.210,237.530
//! ```
//!
//! The device is anything implementing [`device::VfsDevice`]. Any failure,
//! including a single short read, aborts the whole sweep.
//!
//! ```rust
//! use seq_read_bench::{config::SweepConfig, device::MemoryDevice, sweep::Sweep, timing::MonotonicClock};
//!
//! let device = MemoryDevice::new();
//! device.insert("test_file.bin", vec![0; 1 << 20]);
//! let config = SweepConfig::small();
//! let report = Sweep::new(&device, &MonotonicClock::new(), &config).run().unwrap();
//! assert_eq!(report.total_runs, 90);
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod fixture;
pub mod metrics;
pub mod read_loop;
pub mod record;
pub mod schedule;
pub mod sweep;
pub mod timing;

#[cfg(test)]
mod test_util;

pub use error::{BenchError, Result};
