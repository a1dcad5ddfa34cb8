use std::{num::NonZeroU32, path::PathBuf};

use crate::{
    device::IoMode,
    error::{BenchError, Result},
    read_loop::BUFFER_ALIGNMENT,
    schedule::{ByteSize, ChunkSchedule},
};

pub const DEFAULT_TEST_FILE: &str = "test_file.bin";
pub const DEFAULT_OUTPUT_FILE: &str = "benchmark_results.csv";
pub const DEFAULT_REPETITIONS: NonZeroU32 = match NonZeroU32::new(30) {
    Some(n) => n,
    None => panic!("repetitions must be non-zero"),
};

/// Everything one sweep needs to know.
#[derive(Clone, Debug, serde::Serialize)]
pub struct SweepConfig {
    pub test_file: PathBuf,
    pub output_file: PathBuf,
    /// Size of the test file. Taken on trust, never discovered.
    pub file_size: ByteSize,
    pub schedule: ChunkSchedule,
    pub repetitions: NonZeroU32,
}

impl SweepConfig {
    /// 1 MiB file, `100,1k,64k`.
    pub fn small() -> Self {
        Self::with_defaults(ByteSize(1 << 20), ChunkSchedule::small())
    }

    /// 64 MiB file, `100,1k,8k..=256k:8k`.
    pub fn large() -> Self {
        Self::with_defaults(ByteSize(64 << 20), ChunkSchedule::large())
    }

    pub fn with_defaults(file_size: ByteSize, schedule: ChunkSchedule) -> Self {
        SweepConfig {
            test_file: PathBuf::from(DEFAULT_TEST_FILE),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            file_size,
            schedule,
            repetitions: DEFAULT_REPETITIONS,
        }
    }

    /// Rejects an empty file and chunks larger than the file.
    pub fn validate(&self) -> Result<()> {
        let file_size = self.file_size.get();
        if file_size == 0 {
            return Err(BenchError::Config("file size must be positive".to_owned()));
        }
        if usize::try_from(file_size).is_err() {
            return Err(BenchError::Config(format!(
                "file size {} does not fit in memory addressing",
                self.file_size
            )));
        }
        if let Some(chunk) = self
            .schedule
            .chunk_sizes()
            .find(|c| c.get() as u64 > file_size)
        {
            return Err(BenchError::Config(format!(
                "chunk size {chunk} is larger than the file size {}",
                self.file_size
            )));
        }
        Ok(())
    }

    /// [`SweepConfig::validate`], plus the alignment `O_DIRECT` insists on
    /// when `io_mode` is [`IoMode::Direct`].
    pub fn validate_for(&self, io_mode: IoMode) -> Result<()> {
        self.validate()?;
        if io_mode == IoMode::Direct {
            check_direct_io_alignment(self.file_size)?;
            if let Some(chunk) = self
                .schedule
                .chunk_sizes()
                .find(|c| c.get() % BUFFER_ALIGNMENT != 0)
            {
                return Err(BenchError::Config(format!(
                    "direct I/O needs chunk sizes that are multiples of {BUFFER_ALIGNMENT}, got {chunk}"
                )));
            }
        }
        Ok(())
    }

    /// Number of data rows a complete sweep writes.
    pub fn total_runs(&self) -> u64 {
        self.schedule.chunk_sizes().count() as u64 * u64::from(self.repetitions.get())
    }
}

/// `O_DIRECT` transfers must be whole blocks.
pub fn check_direct_io_alignment(file_size: ByteSize) -> Result<()> {
    if file_size.get() % BUFFER_ALIGNMENT as u64 != 0 {
        return Err(BenchError::Config(format!(
            "direct I/O needs the file size to be a multiple of {BUFFER_ALIGNMENT}, got {file_size}"
        )));
    }
    Ok(())
}
