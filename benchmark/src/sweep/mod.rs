//! Drives the experiment matrix: every chunk size in the schedule, a fixed
//! number of repetitions each, one CSV row per repetition.

use std::time::Duration;

use serde_with::serde_as;
use tracing::{debug, info, warn};

use crate::{
    config::SweepConfig,
    device::{DeviceFile, OpenMode, VfsDevice},
    error::{BenchError, Result},
    metrics,
    read_loop::{ChunkedReader, EarlyStop},
    record::{BenchmarkResult, ResultRecorder},
    schedule::ByteSize,
    timing::{timed, Clock},
};

#[cfg(test)]
mod tests;

/// Totals of a completed sweep.
#[serde_as]
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SweepReport {
    pub chunk_sizes: Vec<usize>,
    pub repetitions: u32,
    pub total_runs: u64,
    pub bytes_read: u64,
    /// Runs whose elapsed time was below the minimum measurable interval.
    pub clamped_runs: u64,
    /// Sum of the timed read loops only.
    #[serde_as(as = "serde_with::DurationMicroSeconds<f64>")]
    pub read_time_us: Duration,
    /// Wall time of the whole sweep including opens, closes and output.
    #[serde_as(as = "serde_with::DurationMicroSeconds<f64>")]
    pub elapsed_us: Duration,
}

struct Repetition {
    result: BenchmarkResult,
    elapsed: Duration,
    clamped: bool,
}

/// The device, clock, and configuration one sweep runs against.
///
/// The sweep owns the output file for its whole run. Each repetition opens
/// its own handle to the test file and releases it before the next one starts.
pub struct Sweep<'a, D: VfsDevice + ?Sized, C: Clock + ?Sized> {
    device: &'a D,
    clock: &'a C,
    config: &'a SweepConfig,
}

impl<'a, D: VfsDevice + ?Sized, C: Clock + ?Sized> Sweep<'a, D, C> {
    pub fn new(device: &'a D, clock: &'a C, config: &'a SweepConfig) -> Self {
        Sweep {
            device,
            clock,
            config,
        }
    }

    /// Runs the whole schedule in order. The first failure aborts the sweep;
    /// rows recorded up to that point stay in the output file.
    pub fn run(&self) -> Result<SweepReport> {
        let config = self.config;
        config.validate()?;
        let start = self.clock.now();
        let mut report = SweepReport {
            chunk_sizes: Vec::new(),
            repetitions: config.repetitions.get(),
            total_runs: 0,
            bytes_read: 0,
            clamped_runs: 0,
            read_time_us: Duration::ZERO,
            elapsed_us: Duration::ZERO,
        };

        let mut recorder = ResultRecorder::create(self.device, &config.output_file)?;
        info!(
            test_file = ?config.test_file,
            file_size = %config.file_size,
            schedule = %config.schedule,
            repetitions = config.repetitions.get(),
            "starting sequential read benchmark"
        );

        for chunk_size in config.schedule.chunk_sizes() {
            info!("testing reads of {}", ByteSize(chunk_size.get() as u64));
            // one buffer for all repetitions of this chunk size
            let mut reader = ChunkedReader::new(chunk_size)?;
            for run_number in 1..=config.repetitions.get() {
                let repetition = self.run_once(&mut reader, run_number)?;
                recorder.record(repetition.result)?;
                report.total_runs += 1;
                report.bytes_read += config.file_size.get();
                report.read_time_us += repetition.elapsed;
                report.clamped_runs += u64::from(repetition.clamped);
            }
            report.chunk_sizes.push(chunk_size.get());
        }

        let records = recorder.finish()?;
        debug_assert_eq!(records, report.total_runs);
        report.elapsed_us = self.clock.now().saturating_sub(start);
        info!(
            runs = report.total_runs,
            output = ?config.output_file,
            "benchmark completed"
        );
        Ok(report)
    }

    /// Open, timed pass, close, check, compute. Nothing is recorded here.
    /// Any byte count other than the file size is fatal.
    fn run_once(
        &self,
        reader: &mut ChunkedReader,
        run_number: u32,
    ) -> Result<Repetition> {
        let config = self.config;
        let file_size = config.file_size.get();
        let path = &config.test_file;

        let mut file = DeviceFile::open(self.device, path, OpenMode::ReadOnly).map_err(
            |source| BenchError::Open {
                path: path.clone(),
                source,
            },
        )?;

        let (pass, elapsed) = timed(self.clock, || reader.read_pass(&mut file, file_size));

        let closed = file.close();
        debug!(run_number, bytes_read = pass.bytes_read, "read pass done");

        let stop = match pass.early_stop {
            Some(stop) => Some(stop),
            None if pass.bytes_read != file_size => Some(EarlyStop::Overrun),
            None => None,
        };
        if let Some(stop) = stop {
            return Err(BenchError::ShortRead {
                path: path.clone(),
                chunk_size: reader.chunk_size(),
                run_number,
                expected: file_size,
                actual: pass.bytes_read,
                stop,
            });
        }
        closed.map_err(|source| BenchError::Close {
            path: path.clone(),
            source,
        })?;

        let metrics = metrics::compute(file_size, elapsed);
        if metrics.clamped {
            warn!(
                chunk_size = reader.chunk_size(),
                run_number, "elapsed time below measurable resolution, throughput is a bound"
            );
        }
        let result = BenchmarkResult {
            chunk_size: reader.chunk_size(),
            run_number,
            read_time_ms: metrics.read_time_ms,
            throughput_mbps: metrics.throughput_mbps,
        };
        Ok(Repetition {
            result,
            elapsed,
            clamped: metrics.clamped,
        })
    }
}
