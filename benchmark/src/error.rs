use std::path::PathBuf;

use crate::read_loop::EarlyStop;

/// Every failure is terminal for the whole benchmark invocation.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not allocate chunk buffer of {size} bytes")]
    Allocation { size: usize },
    #[error("could not open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not close {path:?}: {source}")]
    Close {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "could not read entire file {path:?} (chunk size {chunk_size}, run {run_number}): \
         read {actual} of {expected} bytes, {stop}"
    )]
    ShortRead {
        path: PathBuf,
        chunk_size: usize,
        run_number: u32,
        expected: u64,
        actual: u64,
        stop: EarlyStop,
    },
    #[error("could not write results to {path:?}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write fixture {path:?}: {source}")]
    Fixture {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write summary {path:?}: {source}")]
    Summary {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BenchError>;
