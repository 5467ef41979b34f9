//! Report sink - destination for the human-readable output of a run.
//!
//! The sink is passed explicitly to whoever writes reports, so tests can
//! capture it and the binary can point it at stdout.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared, cloneable writer for run reports.
#[derive(Clone)]
pub struct ReportSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ReportSink {
    /// Wrap any writer.
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Sink discarding everything.
    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// Write one line.
    pub fn line(&self, text: &str) -> io::Result<()> {
        let mut writer = self.lock();
        writer.write_all(text.as_bytes())?;
        writer.write_all(b"\n")
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Write for ReportSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flush()
    }
}

impl std::fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReportSink")
    }
}

/// In-memory buffer that can back a [`ReportSink`] and be read afterwards.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = match self.bytes.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Sink writing into this buffer.
    pub fn sink(&self) -> ReportSink {
        ReportSink::new(self.clone())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.bytes.lock() {
            Ok(mut guard) => guard.extend_from_slice(buf),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
