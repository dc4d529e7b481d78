//! Null Codec Adapter
//!
//! Stripes data across k shards and leaves parity shards zeroed. Useful for
//! exercising the archive format without paying for coding; it cannot
//! rebuild a lost data shard.

use crate::domain::ports::ShardCodec;
use crate::ec::params::Params;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct NullCodec {
    data_shards: usize,
    parity_shards: usize,
}

impl NullCodec {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(Error::InvalidParams(
                "data_shards must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            data_shards,
            parity_shards,
        })
    }

    /// Catalog constructor; the null algorithm accepts m = 0
    pub fn from_params(params: &Params) -> Result<Box<dyn ShardCodec>> {
        Ok(Box::new(Self::new(params.k, params.m)?))
    }

    fn check_data_present(&self, shards: &[Option<Vec<u8>>]) -> Result<usize> {
        if shards.len() != self.total_shards() {
            return Err(Error::InvalidParams(format!(
                "Expected {} shards, got {}",
                self.total_shards(),
                shards.len()
            )));
        }
        if let Some(missing) = shards[..self.data_shards].iter().position(Option::is_none) {
            return Err(Error::Backend(format!(
                "null backend cannot rebuild data fragment {}",
                missing
            )));
        }
        Ok(shards
            .iter()
            .flatten()
            .map(Vec::len)
            .next()
            .unwrap_or_default())
    }
}

impl ShardCodec for NullCodec {
    fn data_shards(&self) -> usize {
        self.data_shards
    }

    fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    fn encode(&self, shards: &mut [Vec<u8>]) -> Result<()> {
        if shards.len() != self.total_shards() {
            return Err(Error::InvalidParams(format!(
                "Expected {} shards, got {}",
                self.total_shards(),
                shards.len()
            )));
        }
        for parity in &mut shards[self.data_shards..] {
            parity.fill(0);
        }
        Ok(())
    }

    fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        let shard_len = self.check_data_present(shards)?;
        for parity in &mut shards[self.data_shards..] {
            parity.get_or_insert_with(|| vec![0u8; shard_len]);
        }
        Ok(())
    }

    fn reconstruct_data(&self, shards: &mut [Option<Vec<u8>>]) -> Result<()> {
        self.check_data_present(shards).map(|_| ())
    }
}
