//! Codec Adapters
//!
//! Implementations of the [`ShardCodec`](crate::domain::ports::ShardCodec)
//! port, one per algorithm family the catalog can instantiate.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │                    ShardCodec (port trait)                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │          ReedSolomonCodec        │        NullCodec              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod null;
mod reed_solomon;

pub use null::NullCodec;
pub use reed_solomon::ReedSolomonCodec;
