//! Domain Layer
//!
//! - **Ports** (`ports.rs`) - The trait a coding algorithm implements
//!
//! # Usage
//!
//! ```ignore
//! use ecarchive::domain::ports::ShardCodec;
//!
//! fn parity_ratio(codec: &dyn ShardCodec) -> f64 {
//!     codec.parity_shards() as f64 / codec.data_shards() as f64
//! }
//! ```

pub mod ports;

pub use ports::{CodecConstructor, ShardCodec};
