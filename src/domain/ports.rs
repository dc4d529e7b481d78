//! Domain Ports (Port/Adapter Pattern)
//!
//! The fragment engine only needs one capability from a coding algorithm:
//! turn K equally sized data shards into M parity shards and rebuild
//! missing shards from survivors. Everything else (framing, checksums,
//! padding, fragment bookkeeping) is algorithm independent and lives in
//! [`crate::ec::backend`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Backend (fragment engine)                 │
//! │        encode / decode / reconstruct / is_invalid         │
//! └──────────────────────────────┬───────────────────────────┘
//!                                │ ShardCodec (this port)
//!                                ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (per algorithm)                 │
//! │          ReedSolomonCodec  │  NullCodec                   │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::ec::params::Params;
use crate::error::Result;

/// One erasure-coding algorithm, bound to fixed K and M.
///
/// Implementations must be usable from many threads at once through a
/// shared reference: every call works only on the buffers it is handed.
pub trait ShardCodec: Send + Sync + fmt::Debug {
    /// Number of data shards (k)
    fn data_shards(&self) -> usize;

    /// Number of parity shards (m)
    fn parity_shards(&self) -> usize;

    /// Total number of shards (k + m)
    fn total_shards(&self) -> usize {
        self.data_shards() + self.parity_shards()
    }

    /// Compute parity shards in place.
    ///
    /// `shards` holds k data shards followed by m parity shards, all the
    /// same length.
    fn encode(&self, shards: &mut [Vec<u8>]) -> Result<()>;

    /// Rebuild every missing (`None`) shard.
    fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()>;

    /// Rebuild only the missing data shards.
    fn reconstruct_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()>;
}

/// Builds a codec for validated parameters; one per catalog entry.
pub type CodecConstructor = fn(&Params) -> Result<Box<dyn ShardCodec>>;
