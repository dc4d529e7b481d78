//! Fan-out Stream Writer
//!
//! Every chunk handed to a [`FragmentWriter`] is encoded into K+M fragments
//! and fragment *i* is appended to sink *i*. The sinks therefore always hold
//! the same number of fragments, and fragment *n* of every sink belongs to
//! the same encode call. Once a sink write fails that alignment is lost, so
//! the writer refuses any further chunks.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::ec::backend::Backend;
use crate::error::{Error, Result};

/// Path of fragment file `index` for `prefix`: `prefix#index`
pub fn fragment_path(prefix: impl AsRef<Path>, index: usize) -> PathBuf {
    let mut path = prefix.as_ref().as_os_str().to_owned();
    path.push(format!("#{}", index));
    PathBuf::from(path)
}

/// Create (or truncate) `count` fragment files for `prefix`.
///
/// On unix the files are created with permission bits `mode`. If one file
/// cannot be created, the ones already open are closed before returning.
pub fn create_fragment_files(prefix: impl AsRef<Path>, count: usize, mode: u32) -> Result<Vec<File>> {
    let prefix = prefix.as_ref();
    let mut files = Vec::with_capacity(count);

    for index in 0..count {
        let path = fragment_path(prefix, index);
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        match options.open(&path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(
                    "Failed to create fragment file {}: {} (releasing {} already open)",
                    path.display(),
                    e,
                    files.len()
                );
                return Err(Error::Io(e));
            }
        }
    }

    debug!("Created {} fragment files for {}", count, prefix.display());
    Ok(files)
}

/// Encodes a byte stream into K+M fragment streams
pub struct FragmentWriter<'a, W: Write> {
    backend: &'a Backend,
    sinks: Vec<W>,
    bytes_written: u64,
    poisoned: bool,
    closed: bool,
}

impl<W: Write> std::fmt::Debug for FragmentWriter<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentWriter")
            .field("backend", &self.backend.name())
            .field("sinks", &self.sinks.len())
            .field("bytes_written", &self.bytes_written)
            .field("poisoned", &self.poisoned)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<'a, W: Write> FragmentWriter<'a, W> {
    /// Wrap exactly one sink per fragment of `backend`
    pub fn new(backend: &'a Backend, sinks: Vec<W>) -> Result<Self> {
        if sinks.len() != backend.total_fragments() {
            return Err(Error::InvalidParams(format!(
                "{} needs {} fragment streams, got {}",
                backend.name(),
                backend.total_fragments(),
                sinks.len()
            )));
        }
        Ok(Self {
            backend,
            sinks,
            bytes_written: 0,
            poisoned: false,
            closed: false,
        })
    }

    /// Input bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Encode `data` and append one fragment to every sink.
    ///
    /// Returns `data.len()` on success. A failing sink aborts the chunk
    /// with [`Error::SinkWrite`] and poisons the writer.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::AlreadyClosed("writer"));
        }
        if self.poisoned {
            return Err(Error::Desynchronized);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let fragments = self.backend.encode(data)?;
        for (index, (sink, fragment)) in self.sinks.iter_mut().zip(&fragments).enumerate() {
            if let Err(source) = sink.write_all(fragment) {
                warn!(
                    "Write to fragment stream {} failed after {} of {} streams: {}",
                    index,
                    index,
                    fragments.len(),
                    source
                );
                self.poisoned = true;
                return Err(Error::SinkWrite { index, source });
            }
        }

        self.bytes_written += data.len() as u64;
        Ok(data.len())
    }

    /// Flush and release every sink.
    ///
    /// All sinks are attempted; the first failure is reported along with
    /// how many failed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed("writer"));
        }
        self.closed = true;

        let total = self.sinks.len();
        let mut failed = 0;
        let mut first: Option<(usize, io::Error)> = None;
        for (index, mut sink) in self.sinks.drain(..).enumerate() {
            if let Err(e) = sink.flush() {
                warn!("Failed to close fragment stream {}: {}", index, e);
                failed += 1;
                first.get_or_insert((index, e));
            }
        }

        match first {
            Some((index, source)) => Err(Error::Close {
                failed,
                total,
                index,
                source,
            }),
            None => {
                debug!(
                    "Closed {} fragment streams after {} bytes",
                    total, self.bytes_written
                );
                Ok(())
            }
        }
    }
}

impl<W: Write> Write for FragmentWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed("writer").into());
        }
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            sink.flush()
                .map_err(|source| io::Error::from(Error::SinkWrite { index, source }))?;
        }
        Ok(())
    }
}

impl<W: Write> Drop for FragmentWriter<'_, W> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("Fragment writer dropped without close: {}", e);
            }
        }
    }
}

impl Backend {
    /// Create `prefix#0 .. prefix#{K+M-1}` and wrap them in a writer
    pub fn file_writer(&self, prefix: impl AsRef<Path>, mode: u32) -> Result<FragmentWriter<'_, File>> {
        let files = create_fragment_files(prefix, self.total_fragments(), mode)?;
        FragmentWriter::new(self, files)
    }
}
