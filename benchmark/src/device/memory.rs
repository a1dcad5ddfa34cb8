//! In-process device. Reads are served from memory, so a sweep against it
//! measures the harness itself rather than any storage.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use super::{OpenMode, VfsDevice};

type SharedContents = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Default)]
pub struct MemoryDevice {
    files: Mutex<HashMap<PathBuf, SharedContents>>,
    open_handles: AtomicUsize,
}

#[derive(Debug)]
pub struct MemoryHandle {
    contents: SharedContents,
    cursor: usize,
    writable: bool,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces `path` with `contents`.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), Arc::new(Mutex::new(contents)));
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        let contents = files.get(path)?;
        let contents = contents.lock().unwrap().clone();
        Some(contents)
    }

    /// Number of handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Relaxed)
    }
}

impl VfsDevice for MemoryDevice {
    type Handle = MemoryHandle;

    fn open(&self, path: &Path, mode: OpenMode) -> std::io::Result<MemoryHandle> {
        let mut files = self.files.lock().unwrap();
        let handle = match mode {
            OpenMode::ReadOnly => {
                let contents = files.get(path).ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, format!("{path:?}"))
                })?;
                MemoryHandle {
                    contents: Arc::clone(contents),
                    cursor: 0,
                    writable: false,
                }
            }
            OpenMode::WriteCreateTruncate { permissions: _ } => {
                let contents = files
                    .entry(path.to_owned())
                    .or_insert_with(|| Arc::new(Mutex::new(Vec::new())));
                contents.lock().unwrap().clear();
                MemoryHandle {
                    contents: Arc::clone(contents),
                    cursor: 0,
                    writable: true,
                }
            }
        };
        self.open_handles.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    fn read(&self, handle: &mut MemoryHandle, buf: &mut [u8]) -> std::io::Result<usize> {
        if handle.writable {
            return Err(not_permitted("read from write-only handle"));
        }
        let contents = handle.contents.lock().unwrap();
        let remaining = contents.len().saturating_sub(handle.cursor);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&contents[handle.cursor..handle.cursor + n]);
        handle.cursor += n;
        Ok(n)
    }

    fn write(&self, handle: &mut MemoryHandle, buf: &[u8]) -> std::io::Result<usize> {
        if !handle.writable {
            return Err(not_permitted("write to read-only handle"));
        }
        let mut contents = handle.contents.lock().unwrap();
        contents.extend_from_slice(buf);
        handle.cursor = contents.len();
        Ok(buf.len())
    }

    fn close(&self, handle: MemoryHandle) -> std::io::Result<()> {
        drop(handle);
        self.open_handles.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

fn not_permitted(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::PermissionDenied, msg.to_owned())
}
