//! The device access port the harness measures.
//!
//! A [`VfsDevice`] exposes the four calls the benchmark needs: open, read,
//! write and close over a named file. The harness never talks to a device
//! handle directly; it goes through [`DeviceFile`], which ties the handle's
//! lifetime to a scope and closes it on every exit path.

use std::path::{Path, PathBuf};

use tracing::warn;

pub mod memory;
pub mod std_fs;

pub use memory::MemoryDevice;
pub use std_fs::{IoMode, StdDevice};

/// How a file is opened on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    /// Write-only, created if missing, truncated if present.
    WriteCreateTruncate { permissions: u32 },
}

impl OpenMode {
    /// `0644`, the mode the results file is created with.
    pub const OUTPUT: OpenMode = OpenMode::WriteCreateTruncate { permissions: 0o644 };
}

/// Minimal capability surface over a virtual file system.
///
/// All calls are blocking. Methods take `&self` so that a results handle and a
/// test-file handle from the same device can be live at the same time.
pub trait VfsDevice {
    type Handle;

    fn open(&self, path: &Path, mode: OpenMode) -> std::io::Result<Self::Handle>;

    /// Reads at most `buf.len()` bytes. `Ok(0)` means end of file.
    fn read(&self, handle: &mut Self::Handle, buf: &mut [u8]) -> std::io::Result<usize>;

    fn write(&self, handle: &mut Self::Handle, buf: &[u8]) -> std::io::Result<usize>;

    fn close(&self, handle: Self::Handle) -> std::io::Result<()>;
}

/// An open file on a [`VfsDevice`], closed exactly once.
///
/// Call [`DeviceFile::close`] to observe close errors. If the value is dropped
/// instead (e.g. while an error propagates), the handle is still closed and a
/// close failure is only logged.
pub struct DeviceFile<'d, D: VfsDevice + ?Sized> {
    device: &'d D,
    path: PathBuf,
    handle: Option<D::Handle>,
}

impl<'d, D: VfsDevice + ?Sized> DeviceFile<'d, D> {
    pub fn open(device: &'d D, path: &Path, mode: OpenMode) -> std::io::Result<Self> {
        let handle = device.open(path, mode)?;
        Ok(DeviceFile {
            device,
            path: path.to_owned(),
            handle: Some(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let device = self.device;
        device.read(self.handle_mut(), buf)
    }

    /// Writes the whole buffer, retrying partial writes. A write that makes no
    /// progress is reported as [`std::io::ErrorKind::WriteZero`].
    pub fn write_all(&mut self, mut buf: &[u8]) -> std::io::Result<()> {
        let device = self.device;
        while !buf.is_empty() {
            match device.write(self.handle_mut(), buf)? {
                0 => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "device accepted zero bytes",
                    ))
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }

    pub fn close(mut self) -> std::io::Result<()> {
        match self.handle.take() {
            Some(handle) => self.device.close(handle),
            None => Ok(()),
        }
    }

    fn handle_mut(&mut self) -> &mut D::Handle {
        // only `close` and `drop` take the handle, and both consume `self`
        self.handle
            .as_mut()
            .unwrap_or_else(|| unreachable!("handle taken before close"))
    }
}

impl<D: VfsDevice + ?Sized> Drop for DeviceFile<'_, D> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.device.close(handle) {
                warn!(path = ?self.path, "error closing file on drop: {e}");
            }
        }
    }
}

impl<D: VfsDevice + ?Sized> std::fmt::Debug for DeviceFile<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFile")
            .field("path", &self.path)
            .field("open", &self.handle.is_some())
            .finish()
    }
}
