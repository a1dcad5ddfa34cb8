//! Creates the test file a sweep reads.

use std::{num::NonZeroUsize, path::Path};

use rand::RngCore;
use tracing::info;

use crate::{
    device::{DeviceFile, OpenMode, VfsDevice},
    error::{BenchError, Result},
    read_loop::ScratchBuffer,
    schedule::ByteSize,
};

const FILL_CHUNK: usize = 1 << 20;

/// Writes `size` bytes of pseudo-random data to `path` through the device,
/// replacing whatever was there.
pub fn prepare<D: VfsDevice + ?Sized>(device: &D, path: &Path, size: ByteSize) -> Result<()> {
    let size = size.get();
    let fixture_err = |source: std::io::Error| BenchError::Fixture {
        path: path.to_owned(),
        source,
    };
    let chunk_len = usize::try_from(size).map_or(FILL_CHUNK, |s| s.min(FILL_CHUNK));
    let Some(chunk_len) = NonZeroUsize::new(chunk_len) else {
        return Err(BenchError::Config("fixture size must be positive".to_owned()));
    };

    info!(?path, size = %ByteSize(size), "writing fixture");
    let mut chunk = ScratchBuffer::new(chunk_len)?;
    let chunk = chunk.as_mut_slice();
    let mut file = DeviceFile::open(device, path, OpenMode::OUTPUT).map_err(fixture_err)?;
    let mut remaining = size;
    while remaining > 0 {
        let n = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        rand::thread_rng().fill_bytes(&mut chunk[..n]);
        file.write_all(&chunk[..n]).map_err(fixture_err)?;
        remaining -= n as u64;
    }
    file.close().map_err(fixture_err)?;
    Ok(())
}
