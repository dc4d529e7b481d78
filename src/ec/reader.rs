//! Fan-in Stream Reader
//!
//! Reads fragment *n* from every source, decodes the batch and serves the
//! result through [`std::io::Read`]. Decoded bytes the caller has not asked
//! for yet wait in a `BytesMut` buffer.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::ec::backend::Backend;
use crate::ec::header::{FragmentInfo, HEADER_SIZE};
use crate::ec::writer::fragment_path;
use crate::error::{Error, Result};

/// Fill `buf` as far as the reader allows; returns the byte count.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}

/// Read one header plus payload from `reader`.
///
/// Returns `Ok(None)` at a clean end of data (no header bytes at all).
/// A partial header, an invalid header or a short payload is an error.
pub fn read_fragment<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_SIZE];
    let got = read_full(reader, &mut header)?;
    if got == 0 {
        return Ok(None);
    }
    if got < HEADER_SIZE {
        return Err(Error::TruncatedHeader {
            have: got,
            need: HEADER_SIZE,
        });
    }

    let info = FragmentInfo::parse(&header)?;
    if let Some(fault) = info.fault {
        return Err(Error::BadHeader(fault));
    }

    let mut fragment = Vec::with_capacity(info.fragment_len());
    fragment.extend_from_slice(&header);
    fragment.resize(info.fragment_len(), 0);
    let got = read_full(reader, &mut fragment[HEADER_SIZE..])?;
    if got < info.size {
        return Err(Error::TruncatedFragment {
            have: got,
            need: info.size,
        });
    }
    Ok(Some(fragment))
}

/// Open `prefix#0 .. prefix#{count-1}` for reading
pub fn open_fragment_files(prefix: impl AsRef<Path>, count: usize) -> Result<Vec<File>> {
    let prefix = prefix.as_ref();
    (0..count)
        .map(|index| {
            let path = fragment_path(prefix, index);
            File::open(&path).map_err(|e| {
                warn!("Failed to open fragment file {}: {}", path.display(), e);
                Error::Io(e)
            })
        })
        .collect()
}

/// Decodes K+M fragment streams back into the original byte stream
pub struct FragmentReader<'a, R: Read> {
    backend: &'a Backend,
    sources: Vec<R>,
    buffer: BytesMut,
    batches: u64,
    eof: bool,
    failed: bool,
    closed: bool,
}

impl<R: Read> std::fmt::Debug for FragmentReader<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentReader")
            .field("backend", &self.backend.name())
            .field("sources", &self.sources.len())
            .field("buffered", &self.buffer.len())
            .field("batches", &self.batches)
            .field("eof", &self.eof)
            .field("failed", &self.failed)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<'a, R: Read> FragmentReader<'a, R> {
    pub fn new(backend: &'a Backend, sources: Vec<R>) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::InvalidParams("no fragment streams to read".into()));
        }
        Ok(Self {
            backend,
            sources,
            buffer: BytesMut::new(),
            batches: 0,
            eof: false,
            failed: false,
            closed: false,
        })
    }

    /// Read the next fragment of every source and decode them.
    fn fill(&mut self) -> Result<()> {
        let mut batch = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter_mut().enumerate() {
            match read_fragment(source) {
                Ok(Some(fragment)) => batch.push(fragment),
                Ok(None) => {
                    if !batch.is_empty() {
                        warn!(
                            "Fragment stream {} ended while {} earlier streams still had fragments",
                            index,
                            batch.len()
                        );
                    }
                    debug!("End of fragment streams after {} batches", self.batches);
                    self.eof = true;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read from fragment stream {}: {}", index, e);
                    return Err(e);
                }
            }
        }

        let data = self.backend.decode(&batch)?;
        self.buffer.extend_from_slice(&data);
        self.batches += 1;
        Ok(())
    }

    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.buffer.len());
        let chunk = self.buffer.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        n
    }

    /// Copy decoded bytes into `buf`.
    ///
    /// Returns 0 only once every buffered byte has been handed out and a
    /// source has reached its end. A failed batch has already consumed its
    /// fragments, so every read after it fails with [`Error::Desynchronized`].
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::AlreadyClosed("reader"));
        }
        if self.failed {
            return Err(Error::Desynchronized);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let copied = self.drain_into(buf);
            if copied > 0 || self.eof {
                return Ok(copied);
            }
            if let Err(e) = self.fill() {
                self.failed = true;
                self.buffer.clear();
                return Err(e);
            }
        }
    }

    /// Release every source
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed("reader"));
        }
        self.closed = true;
        debug!(
            "Closed {} fragment streams after {} batches",
            self.sources.len(),
            self.batches
        );
        self.sources.clear();
        self.buffer.clear();
        Ok(())
    }
}

impl<R: Read> Read for FragmentReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf).map_err(io::Error::from)
    }
}

impl Backend {
    /// Open `prefix#0 .. prefix#{K+M-1}` and wrap them in a reader
    pub fn file_reader(&self, prefix: impl AsRef<Path>) -> Result<FragmentReader<'_, File>> {
        let files = open_fragment_files(prefix, self.total_fragments())?;
        FragmentReader::new(self, files)
    }
}
