//! Reed-Solomon Codec Adapter
//!
//! Implements the `ShardCodec` port with Vandermonde-derived Reed-Solomon
//! coding over GF(2^8), using the `reed-solomon-erasure` crate.

use std::sync::Arc;

use reed_solomon_erasure::galois_8::ReedSolomon;
use tracing::debug;

use crate::domain::ports::ShardCodec;
use crate::ec::params::Params;
use crate::error::{Error, Result};

/// Reed-Solomon based erasure coding adapter.
pub struct ReedSolomonCodec {
    /// Reed-Solomon codec instance
    rs: Arc<ReedSolomon>,
    /// Number of data shards (k)
    data_shards: usize,
    /// Number of parity shards (m)
    parity_shards: usize,
}

impl std::fmt::Debug for ReedSolomonCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReedSolomonCodec")
            .field("data_shards", &self.data_shards)
            .field("parity_shards", &self.parity_shards)
            .finish()
    }
}

impl ReedSolomonCodec {
    /// Create a new codec with the specified k+m configuration
    ///
    /// # Arguments
    /// * `data_shards` - Number of data shards (k)
    /// * `parity_shards` - Number of parity shards (m)
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(Error::InvalidParams(
                "data_shards must be greater than 0".to_string(),
            ));
        }
        if parity_shards == 0 {
            return Err(Error::InvalidParams(
                "parity_shards must be greater than 0".to_string(),
            ));
        }

        let rs = ReedSolomon::new(data_shards, parity_shards).map_err(|e| {
            Error::InvalidParams(format!("Failed to create Reed-Solomon codec: {}", e))
        })?;

        Ok(Self {
            rs: Arc::new(rs),
            data_shards,
            parity_shards,
        })
    }

    /// Catalog constructor: GF(2^8) only supports 8-bit words
    pub fn from_params(params: &Params) -> Result<Box<dyn ShardCodec>> {
        if params.w != 0 && params.w != 8 {
            return Err(Error::InvalidParams(format!(
                "word size {} is not supported by {}, use 8",
                params.w, params.name
            )));
        }
        Ok(Box::new(Self::new(params.k, params.m)?))
    }

    fn check_shard_count(&self, got: usize) -> Result<()> {
        if got != self.total_shards() {
            return Err(Error::InvalidParams(format!(
                "Expected {} shards, got {}",
                self.total_shards(),
                got
            )));
        }
        Ok(())
    }

    fn check_available(&self, shards: &[Option<Vec<u8>>]) -> Result<usize> {
        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < self.data_shards {
            return Err(Error::InsufficientFragments {
                available,
                required: self.data_shards,
            });
        }
        Ok(available)
    }
}

impl ShardCodec for ReedSolomonCodec {
    fn data_shards(&self) -> usize {
        self.data_shards
    }

    fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    fn encode(&self, shards: &mut [Vec<u8>]) -> Result<()> {
        self.check_shard_count(shards.len())?;

        self.rs
            .encode(shards)
            .map_err(|e| Error::Backend(format!("Reed-Solomon encoding failed: {}", e)))
    }

    fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        self.check_shard_count(shards.len())?;
        let available = self.check_available(shards)?;

        // The library allocates and fills in the None entries
        self.rs
            .reconstruct(shards)
            .map_err(|e| Error::Backend(format!("Reed-Solomon reconstruction failed: {}", e)))?;

        debug!(
            "Reconstructed shards from {}/{} available",
            available,
            self.total_shards()
        );
        Ok(())
    }

    fn reconstruct_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        self.check_shard_count(shards.len())?;
        let available = self.check_available(shards)?;

        self.rs.reconstruct_data(shards).map_err(|e| {
            Error::Backend(format!("Reed-Solomon data reconstruction failed: {}", e))
        })?;

        debug!(
            "Reconstructed data shards from {}/{} available",
            available,
            self.total_shards()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn encoded(k: usize, m: usize, shard_len: usize) -> (ReedSolomonCodec, Vec<Vec<u8>>) {
        let codec = ReedSolomonCodec::new(k, m).unwrap();
        let mut shards: Vec<Vec<u8>> = (0..k + m)
            .map(|i| {
                if i < k {
                    (0..shard_len).map(|j| (i * 31 + j) as u8).collect()
                } else {
                    vec![0u8; shard_len]
                }
            })
            .collect();
        codec.encode(&mut shards).unwrap();
        (codec, shards)
    }

    #[test]
    fn test_codec_creation() {
        let codec = ReedSolomonCodec::new(4, 2).unwrap();
        assert_eq!(codec.data_shards(), 4);
        assert_eq!(codec.parity_shards(), 2);
        assert_eq!(codec.total_shards(), 6);
    }

    #[test]
    fn test_invalid_config() {
        assert!(ReedSolomonCodec::new(0, 2).is_err());
        assert!(ReedSolomonCodec::new(4, 0).is_err());
    }

    #[test]
    fn test_word_size_validation() {
        let params = Params::new("isa_l_rs_vand", 4, 2);
        assert!(ReedSolomonCodec::from_params(&params).is_ok());
        assert!(ReedSolomonCodec::from_params(&params.clone().with_word_size(8)).is_ok());
        assert_matches!(
            ReedSolomonCodec::from_params(&params.with_word_size(16)),
            Err(Error::InvalidParams(_))
        );
    }

    #[test]
    fn test_reconstruct_restores_lost_shards() {
        let (codec, shards) = encoded(4, 2, 64);

        let mut degraded: Vec<Option<Vec<u8>>> = shards.iter().cloned().map(Some).collect();
        degraded[1] = None; // Lose data shard 1
        degraded[4] = None; // Lose parity shard 0

        codec.reconstruct(&mut degraded).unwrap();
        let restored: Vec<Vec<u8>> = degraded.into_iter().flatten().collect();
        assert_eq!(restored, shards);
    }

    #[test]
    fn test_reconstruct_data_leaves_parity() {
        let (codec, shards) = encoded(4, 2, 32);

        let mut degraded: Vec<Option<Vec<u8>>> = shards.iter().cloned().map(Some).collect();
        degraded[0] = None;
        degraded[5] = None;

        codec.reconstruct_data(&mut degraded).unwrap();
        assert_eq!(degraded[0].as_ref(), Some(&shards[0]));
        assert!(degraded[5].is_none());
    }

    #[test]
    fn test_reconstruct_insufficient_shards() {
        let codec = ReedSolomonCodec::new(4, 2).unwrap();

        // Only 3 shards available (need 4)
        let mut shards: Vec<Option<Vec<u8>>> = vec![
            Some(vec![0u8; 16]),
            Some(vec![0u8; 16]),
            Some(vec![0u8; 16]),
            None,
            None,
            None,
        ];

        let result = codec.reconstruct(&mut shards);
        assert_matches!(
            result,
            Err(Error::InsufficientFragments {
                available: 3,
                required: 4
            })
        );
    }

    #[test]
    fn test_wrong_shard_count() {
        let codec = ReedSolomonCodec::new(4, 2).unwrap();
        let mut shards = vec![vec![0u8; 16]; 5];
        assert_matches!(codec.encode(&mut shards), Err(Error::InvalidParams(_)));
    }
}
