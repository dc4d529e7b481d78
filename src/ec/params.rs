//! Coding Parameters

use serde::Serialize;

use crate::ec::header::ChecksumType;
use crate::error::{Error, Result};

/// Most fragments one encode call may produce
pub const MAX_FRAGMENTS: usize = 32;

/// Coding configuration used to open a [`Backend`](crate::ec::Backend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Params {
    /// Algorithm name, as listed by the catalog
    pub name: String,
    /// Number of data fragments
    pub k: usize,
    /// Number of parity fragments
    pub m: usize,
    /// Word size in bits; 0 selects the algorithm default
    pub w: u32,
    /// Hamming distance, for algorithms that use one
    pub hd: u32,
    /// Data checksum written into produced fragments
    pub checksum: ChecksumType,
}

impl Params {
    pub fn new(name: impl Into<String>, k: usize, m: usize) -> Self {
        Self {
            name: name.into(),
            k,
            m,
            w: 0,
            hd: 0,
            checksum: ChecksumType::Crc32,
        }
    }

    pub fn with_word_size(mut self, w: u32) -> Self {
        self.w = w;
        self
    }

    pub fn with_hamming_distance(mut self, hd: u32) -> Self {
        self.hd = hd;
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumType) -> Self {
        self.checksum = checksum;
        self
    }

    /// Total number of fragments (k + m)
    pub fn total(&self) -> usize {
        self.k + self.m
    }

    /// Split an inferred fragment total into `k` data and the rest parity.
    ///
    /// Parameter inference only learns the total (highest index + 1) and
    /// leaves it in `m`; the caller supplies `k`.
    pub fn split_total(mut self, k: usize) -> Result<Self> {
        let total = self.total();
        if k == 0 || k >= total {
            return Err(Error::InvalidParams(format!(
                "k={} must be between 1 and {} for {} fragments",
                k,
                total.saturating_sub(1),
                total
            )));
        }
        self.k = k;
        self.m = total - k;
        Ok(self)
    }

    /// Checks shared by every algorithm
    pub(crate) fn validate_common(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidParams("k must be at least 1".into()));
        }
        if self.total() > MAX_FRAGMENTS {
            return Err(Error::InvalidParams(format!(
                "k+m={} exceeds the maximum of {} fragments",
                self.total(),
                MAX_FRAGMENTS
            )));
        }
        match self.checksum {
            ChecksumType::None | ChecksumType::Crc32 => Ok(()),
            other => Err(Error::InvalidParams(format!(
                "cannot produce {} data checksums",
                other
            ))),
        }
    }
}
