//! Error types for fragment archives

use std::io;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while coding, framing or streaming fragments
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Algorithm name is not in the catalog
    #[error("unsupported backend {0:?}")]
    UnsupportedBackend(String),

    /// Algorithm is known but has no implementation in this build
    #[error("backend {0:?} is not available")]
    BackendNotAvailable(String),

    /// K/M/W/HD combination rejected by the algorithm
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Handle, writer or reader closed twice (or used after close)
    #[error("{0} already closed")]
    AlreadyClosed(&'static str),

    // =========================================================================
    // Framing Errors
    // =========================================================================
    /// Fewer than a full header's worth of bytes before end-of-data
    #[error("truncated fragment header: got {have} of {need} bytes")]
    TruncatedHeader { have: usize, need: usize },

    /// Header promised more payload than the stream holds
    #[error("truncated fragment payload: got {have} of {need} bytes")]
    TruncatedFragment { have: usize, need: usize },

    /// Header failed validation (magic, version or metadata checksum)
    #[error("bad fragment header: {0}")]
    BadHeader(String),

    // =========================================================================
    // Coding Errors
    // =========================================================================
    /// Not enough usable fragments to decode or reconstruct
    #[error("insufficient fragments: have {available}, need {required}")]
    InsufficientFragments { available: usize, required: usize },

    /// Algorithm-internal failure
    #[error("backend error: {0}")]
    Backend(String),

    // =========================================================================
    // Consistency Errors
    // =========================================================================
    /// Reading the first header of one source failed
    #[error("source {index}: {source}")]
    Source {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Fragment sources disagree on a header field
    #[error("source {index} has {field} {found}, expected {expected}")]
    Inconsistent {
        index: usize,
        field: &'static str,
        expected: String,
        found: String,
    },

    // =========================================================================
    // Stream Errors
    // =========================================================================
    /// Writing a fragment to one of the K+M sinks failed
    #[error("write to fragment stream {index} failed: {source}")]
    SinkWrite {
        index: usize,
        #[source]
        source: io::Error,
    },

    /// An earlier failed write or read left the fragment streams out of step
    #[error("fragment streams are desynchronized by an earlier failure")]
    Desynchronized,

    /// One or more streams failed to close
    #[error("failed to close {failed} of {total} fragment streams; first failure on stream {index}: {source}")]
    Close {
        failed: usize,
        total: usize,
        index: usize,
        #[source]
        source: io::Error,
    },
}

impl Error {
    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::Io(e) => e.kind(),
            Error::SinkWrite { source, .. } | Error::Close { source, .. } => source.kind(),
            Error::TruncatedHeader { .. } | Error::TruncatedFragment { .. } => {
                io::ErrorKind::UnexpectedEof
            }
            Error::BadHeader(_) | Error::Inconsistent { .. } => io::ErrorKind::InvalidData,
            Error::Source { source, .. } => source.io_kind(),
            Error::InvalidParams(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        }
    }
}

/// Crossing the `io::Read` / `io::Write` boundary keeps the typed error
/// reachable through `io::Error::get_ref`.
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

/// Recover a typed error that was wrapped for an `io` trait.
pub fn unwrap_io(err: io::Error) -> Error {
    if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        return Error::Io(err);
    }
    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(typed)) => *typed,
        Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
        None => Error::Io(kind.into()),
    }
}
