//! Erasure Coding Module
//!
//! Fragment archives: input split by an erasure-coding engine into K data
//! and M parity fragments, each prefixed by a self-describing header and
//! stored in K+M parallel streams.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Erasure Coding Module                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                          │
//! │  ┌──────────────┐                            ┌──────────────┐            │
//! │  │   Writer     │  bytes ──▶ K+M streams     │   Reader     │            │
//! │  │  (fan-out)   │                            │  (fan-in)    │            │
//! │  └──────┬───────┘                            └──────┬───────┘            │
//! │         │            ┌──────────────────┐           │                    │
//! │         └───────────▶│  Backend engine  │◀──────────┘                    │
//! │                      │  encode/decode   │                                │
//! │                      └───┬──────────┬───┘                                │
//! │                          │          │                                    │
//! │               ┌──────────┴───┐  ┌───┴──────────┐   ┌──────────────┐      │
//! │               │   Catalog    │  │   Header     │◀──│  Inference   │      │
//! │               │  (id ↔ name) │  │   codec      │   │  / Inspect   │      │
//! │               └──────────────┘  └──────────────┘   └──────────────┘      │
//! │                                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **Header** (`header.rs`): the 80-byte fragment header, its validation
//!   rules and the `FragmentInfo` view of it.
//! - **Catalog** (`catalog.rs`): known algorithms and which ones this build
//!   implements.
//! - **Backend** (`backend.rs`): an open engine instance with Encode,
//!   Decode, Reconstruct and IsInvalidFragment.
//! - **Writer / Reader** (`writer.rs`, `reader.rs`): stream an arbitrary
//!   byte stream to and from K+M fragment streams.
//! - **Inference** (`inference.rs`): recover algorithm and fragment count
//!   from headers alone.
//! - **Inspect** (`inspect.rs`): summarize one fragment file.
//!
//! # Usage
//!
//! ```rust
//! use ecarchive::ec::{Backend, Params};
//!
//! let backend = Backend::open(Params::new("liberasurecode_rs_vand", 4, 2))?;
//!
//! let data = b"Hello, World!";
//! let fragments = backend.encode(data)?;
//!
//! // Any 4 of the 6 fragments are enough
//! let recovered = backend.decode(&fragments[2..])?;
//! assert_eq!(recovered, data);
//! # Ok::<(), ecarchive::Error>(())
//! ```

pub mod backend;
pub mod catalog;
pub mod header;
pub mod inference;
pub mod inspect;
pub mod params;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod proptest;

pub use backend::Backend;
pub use catalog::{available_backends, backend_name, is_available};
pub use header::{ChecksumType, FragmentHeader, FragmentInfo, Version, HEADER_SIZE};
pub use inference::infer_params;
pub use inspect::{inspect, inspect_file, ArchiveSummary};
pub use params::Params;
pub use reader::{read_fragment, FragmentReader};
pub use writer::{fragment_path, FragmentWriter};
