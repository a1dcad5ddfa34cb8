use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::device::{OpenMode, VfsDevice};

#[derive(Clone, Copy)]
enum Fault {
    ZeroRead,
    Error,
    Overrun,
}

/// Wraps a device, records the size of every read request, and optionally
/// sabotages the n-th read call (1-based, counted across all handles).
pub(crate) struct InstrumentedDevice<D> {
    inner: D,
    read_requests: Mutex<Vec<usize>>,
    read_calls: AtomicUsize,
    fault: Option<(usize, Fault)>,
}

impl<D: VfsDevice> InstrumentedDevice<D> {
    pub(crate) fn new(inner: D) -> Self {
        InstrumentedDevice {
            inner,
            read_requests: Mutex::new(Vec::new()),
            read_calls: AtomicUsize::new(0),
            fault: None,
        }
    }

    /// The `call`-th read returns zero bytes.
    pub(crate) fn fail_read_call(mut self, call: usize) -> Self {
        self.fault = Some((call, Fault::ZeroRead));
        self
    }

    /// The `call`-th read returns an I/O error.
    pub(crate) fn error_read_call(mut self, call: usize) -> Self {
        self.fault = Some((call, Fault::Error));
        self
    }

    /// The `call`-th read reports one byte more than the buffer holds.
    pub(crate) fn overrun_read_call(mut self, call: usize) -> Self {
        self.fault = Some((call, Fault::Overrun));
        self
    }

    pub(crate) fn read_requests(&self) -> Vec<usize> {
        self.read_requests.lock().unwrap().clone()
    }

    pub(crate) fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: VfsDevice> VfsDevice for InstrumentedDevice<D> {
    type Handle = D::Handle;

    fn open(&self, path: &Path, mode: OpenMode) -> std::io::Result<D::Handle> {
        self.inner.open(path, mode)
    }

    fn read(&self, handle: &mut D::Handle, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_requests.lock().unwrap().push(buf.len());
        let call = self.read_calls.fetch_add(1, Ordering::Relaxed) + 1;
        match self.fault {
            Some((n, Fault::ZeroRead)) if n == call => Ok(0),
            Some((n, Fault::Error)) if n == call => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected read failure",
            )),
            Some((n, Fault::Overrun)) if n == call => {
                let len = buf.len();
                self.inner.read(handle, buf).map(|_| len + 1)
            }
            _ => self.inner.read(handle, buf),
        }
    }

    fn write(&self, handle: &mut D::Handle, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(handle, buf)
    }

    fn close(&self, handle: D::Handle) -> std::io::Result<()> {
        self.inner.close(handle)
    }
}
