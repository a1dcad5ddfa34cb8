//! One sequential pass over the test file at a fixed chunk size.

use std::{alloc::Layout, num::NonZeroUsize, ptr::NonNull};

use tracing::trace;

use crate::{
    device::{DeviceFile, VfsDevice},
    error::{BenchError, Result},
};

/// Alignment of every scratch buffer; enough for `O_DIRECT` on common block
/// devices.
pub const BUFFER_ALIGNMENT: usize = 4096;

/// Heap buffer aligned to [`BUFFER_ALIGNMENT`], allocated once per chunk size.
pub struct ScratchBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl ScratchBuffer {
    pub fn new(size: NonZeroUsize) -> Result<Self> {
        let layout = Layout::from_size_align(size.get(), BUFFER_ALIGNMENT)
            .map_err(|_| BenchError::Allocation { size: size.get() })?;
        // SAFETY: `layout` has non-zero size.
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(BenchError::Allocation { size: size.get() })?;
        Ok(ScratchBuffer { ptr, layout })
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: `ptr` points to `layout.size()` initialized bytes owned by us.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("len", &self.layout.size())
            .finish()
    }
}

/// Why a pass ended before reading the whole file.
#[derive(Debug)]
pub enum EarlyStop {
    EndOfFile,
    Device(std::io::Error),
    /// The device reported more bytes than it was asked for.
    Overrun,
}

impl std::fmt::Display for EarlyStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EarlyStop::EndOfFile => write!(f, "device returned zero bytes"),
            EarlyStop::Device(e) => write!(f, "device read failed: {e}"),
            EarlyStop::Overrun => write!(f, "device returned more bytes than requested"),
        }
    }
}

#[derive(Debug)]
pub struct Pass {
    pub bytes_read: u64,
    /// `None` iff the pass read exactly the expected size.
    pub early_stop: Option<EarlyStop>,
}

/// Reads a file front to back in requests of at most `chunk_size` bytes.
///
/// Owns the scratch buffer for all repetitions of one chunk size.
#[derive(Debug)]
pub struct ChunkedReader {
    buf: ScratchBuffer,
}

impl ChunkedReader {
    pub fn new(chunk_size: NonZeroUsize) -> Result<Self> {
        Ok(ChunkedReader {
            buf: ScratchBuffer::new(chunk_size)?,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.buf.len()
    }

    /// Reads until `file_size` bytes have been read, or the device returns
    /// zero bytes, an error, or more bytes than requested. The last request
    /// of a pass is shortened to the bytes remaining.
    pub fn read_pass<D: VfsDevice + ?Sized>(
        &mut self,
        file: &mut DeviceFile<'_, D>,
        file_size: u64,
    ) -> Pass {
        let buf = self.buf.as_mut_slice();
        let chunk_size = buf.len() as u64;
        let mut total: u64 = 0;
        while total < file_size {
            let to_read = chunk_size.min(file_size - total) as usize;
            match file.read(&mut buf[..to_read]) {
                Ok(0) => {
                    return Pass {
                        bytes_read: total,
                        early_stop: Some(EarlyStop::EndOfFile),
                    }
                }
                Ok(n) if n > to_read => {
                    return Pass {
                        bytes_read: total + n as u64,
                        early_stop: Some(EarlyStop::Overrun),
                    }
                }
                Ok(n) => total += n as u64,
                Err(e) => {
                    trace!(total, "read failed: {e}");
                    return Pass {
                        bytes_read: total,
                        early_stop: Some(EarlyStop::Device(e)),
                    };
                }
            }
        }
        Pass {
            bytes_read: total,
            early_stop: None,
        }
    }
}
