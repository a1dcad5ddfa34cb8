//! CSV output of per-repetition results.

use std::path::Path;

use crate::{
    device::{DeviceFile, OpenMode, VfsDevice},
    error::{BenchError, Result},
};

pub const CSV_HEADER: &str = "chunk_size,run_number,read_time_ms,throughput_mbps\n";

/// Timing of one repetition at one chunk size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkResult {
    pub chunk_size: usize,
    /// 1-based.
    pub run_number: u32,
    pub read_time_ms: f64,
    pub throughput_mbps: f64,
}

impl BenchmarkResult {
    /// One newline-terminated CSV row, floats with three decimals.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{:.3},{:.3}\n",
            self.chunk_size, self.run_number, self.read_time_ms, self.throughput_mbps
        )
    }
}

/// Appends results to the output file through the device.
///
/// The header is written on creation; every [`ResultRecorder::record`] is one
/// write of one complete row, so rows written before a failure stay on disk.
pub struct ResultRecorder<'d, D: VfsDevice + ?Sized> {
    file: DeviceFile<'d, D>,
    records: u64,
}

impl<'d, D: VfsDevice + ?Sized> ResultRecorder<'d, D> {
    pub fn create(device: &'d D, path: &Path) -> Result<Self> {
        let mut file = DeviceFile::open(device, path, OpenMode::OUTPUT).map_err(|source| {
            BenchError::Open {
                path: path.to_owned(),
                source,
            }
        })?;
        file.write_all(CSV_HEADER.as_bytes())
            .map_err(|source| BenchError::Output {
                path: path.to_owned(),
                source,
            })?;
        Ok(ResultRecorder { file, records: 0 })
    }

    pub fn record(&mut self, result: BenchmarkResult) -> Result<()> {
        let line = result.to_csv_line();
        self.file
            .write_all(line.as_bytes())
            .map_err(|source| BenchError::Output {
                path: self.file.path().to_owned(),
                source,
            })?;
        self.records += 1;
        Ok(())
    }

    /// Closes the output file and returns the number of rows written.
    pub fn finish(self) -> Result<u64> {
        let path = self.file.path().to_owned();
        let records = self.records;
        self.file
            .close()
            .map_err(|source| BenchError::Close { path, source })?;
        Ok(records)
    }
}

impl<D: VfsDevice + ?Sized> std::fmt::Debug for ResultRecorder<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultRecorder")
            .field("file", &self.file)
            .field("records", &self.records)
            .finish()
    }
}
