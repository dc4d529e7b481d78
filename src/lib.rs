//! ecarchive - Erasure-Coded Fragment Archives
//!
//! Splits a byte stream into K data and M parity fragments, writes each
//! fragment with a self-describing 80-byte header into K+M parallel
//! streams, and reassembles the stream from any K of them. Fragment
//! headers are bit-compatible with liberasurecode archives.
//!
//! # Architecture
//!
//! ```text
//! input ─▶ FragmentWriter ─▶ Backend::encode ─▶ K+M sinks
//! K+M sources ─▶ FragmentReader ─▶ Backend::decode ─▶ output
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Coding algorithm implementations of the domain port
//! - [`domain`] - The `ShardCodec` port
//! - [`ec`] - Header codec, engine, catalog, streams, inference, inspection
//! - [`error`] - Error types

pub mod adapters;
pub mod domain;
pub mod ec;
pub mod error;

// Re-export commonly used types
pub use ec::{infer_params, Backend, FragmentInfo, FragmentReader, FragmentWriter, Params};
pub use error::{Error, Result};
