use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use super::{OpenMode, VfsDevice};

/// Whether reads go through the page cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
pub enum IoMode {
    #[default]
    Cached,
    /// `O_DIRECT`. Buffers, lengths and offsets must be block aligned.
    Direct,
}

/// Device backed by the host file system.
///
/// The I/O mode applies to read-only opens, i.e. the measured reads. Files
/// opened for writing (results, fixtures) always go through the page cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDevice {
    io_mode: IoMode,
}

impl StdDevice {
    pub fn new(io_mode: IoMode) -> Self {
        StdDevice { io_mode }
    }
}

/// An open host file. Writable handles are synced on close.
#[derive(Debug)]
pub struct StdHandle {
    file: File,
    writable: bool,
}

fn enable_io_mode(options: &mut std::fs::OpenOptions, io_mode: IoMode) -> std::io::Result<()> {
    match io_mode {
        IoMode::Cached => Ok(()),
        IoMode::Direct => {
            #[cfg(target_os = "linux")]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.custom_flags(libc::O_DIRECT);
                Ok(())
            }
            #[cfg(not(target_os = "linux"))]
            {
                let _ = options;
                Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "direct I/O is only supported on Linux",
                ))
            }
        }
    }
}

impl VfsDevice for StdDevice {
    type Handle = StdHandle;

    fn open(&self, path: &Path, mode: OpenMode) -> std::io::Result<StdHandle> {
        let mut options = std::fs::OpenOptions::new();
        match mode {
            OpenMode::ReadOnly => {
                options.read(true);
                enable_io_mode(&mut options, self.io_mode)?;
            }
            OpenMode::WriteCreateTruncate { permissions } => {
                options.write(true).create(true).truncate(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    options.mode(permissions);
                }
                #[cfg(not(unix))]
                let _ = permissions;
            }
        }
        let file = options.open(path)?;
        Ok(StdHandle {
            file,
            writable: !matches!(mode, OpenMode::ReadOnly),
        })
    }

    fn read(&self, handle: &mut StdHandle, buf: &mut [u8]) -> std::io::Result<usize> {
        handle.file.read(buf)
    }

    fn write(&self, handle: &mut StdHandle, buf: &[u8]) -> std::io::Result<usize> {
        handle.file.write(buf)
    }

    /// Syncs writable handles so write-back failures surface here. An error
    /// from close(2) itself is not observable through `File`.
    fn close(&self, handle: StdHandle) -> std::io::Result<()> {
        if handle.writable {
            handle.file.sync_all()?;
        }
        drop(handle.file);
        Ok(())
    }
}
