//! Erasure Coding Engine
//!
//! A [`Backend`] is an open instance of one catalog algorithm bound to fixed
//! [`Params`]. It frames algorithm output into self-describing fragments and
//! back:
//!
//! - `encode` splits input into k zero-padded shards, asks the codec for m
//!   parity shards and prefixes each shard with a sealed header;
//! - `decode` accepts any k usable fragments in any order and returns the
//!   original bytes;
//! - `reconstruct` rebuilds one fragment byte-for-byte;
//! - `is_invalid_fragment` checks a fragment against this instance.
//!
//! Every call allocates its own buffers and returns owned fragments, so a
//! shared `&Backend` can serve many threads at once. `close` needs
//! `&mut self` and therefore cannot overlap with in-flight calls.

use tracing::{debug, instrument, warn};

use crate::domain::ports::ShardCodec;
use crate::ec::catalog::{self, BackendEntry};
use crate::ec::header::{FragmentHeader, FragmentInfo, HEADER_SIZE};
use crate::ec::params::Params;
use crate::error::{Error, Result};

/// Payload sizes are rounded up to a multiple of this many bytes
pub const PAYLOAD_ALIGNMENT: usize = 16;

/// Shard size for `data_len` bytes split across `data_fragments` shards
pub fn payload_size(data_len: usize, data_fragments: usize) -> usize {
    let per_shard = data_len.div_ceil(data_fragments.max(1)).max(1);
    per_shard.div_ceil(PAYLOAD_ALIGNMENT) * PAYLOAD_ALIGNMENT
}

/// Usable payloads gathered from a set of fragments
struct Batch {
    slots: Vec<Option<Vec<u8>>>,
    available: usize,
    size: usize,
    orig_data_size: u64,
}

/// Open erasure-coding engine instance
#[derive(Debug)]
pub struct Backend {
    params: Params,
    entry: &'static BackendEntry,
    codec: Option<Box<dyn ShardCodec>>,
}

impl Backend {
    /// Open an instance of the algorithm named in `params`.
    ///
    /// # Errors
    /// * `UnsupportedBackend` - the name is not in the catalog
    /// * `BackendNotAvailable` - known, but not implemented in this build
    /// * `InvalidParams` - K/M/W/HD rejected
    #[instrument(skip_all, fields(backend = %params.name, k = params.k, m = params.m))]
    pub fn open(params: Params) -> Result<Self> {
        let entry = catalog::lookup(&params.name)
            .ok_or_else(|| Error::UnsupportedBackend(params.name.clone()))?;
        if !entry.is_available() {
            return Err(Error::BackendNotAvailable(params.name.clone()));
        }
        params.validate_common()?;
        let codec = entry.instantiate(&params)?;

        debug!(
            "Opened backend {} (id {}, version {}) with k={} m={}",
            entry.name, entry.id, entry.version, params.k, params.m
        );

        Ok(Self {
            params,
            entry,
            codec: Some(codec),
        })
    }

    /// Release the instance; a second call is an error
    pub fn close(&mut self) -> Result<()> {
        match self.codec.take() {
            Some(_) => {
                debug!("Closed backend {}", self.entry.name);
                Ok(())
            }
            None => Err(Error::AlreadyClosed("backend")),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.codec.is_none()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn name(&self) -> &'static str {
        self.entry.name
    }

    /// Identifier written into produced headers
    pub fn backend_id(&self) -> u8 {
        self.entry.id
    }

    /// Number of data fragments (k)
    pub fn data_fragments(&self) -> usize {
        self.params.k
    }

    /// Number of parity fragments (m)
    pub fn parity_fragments(&self) -> usize {
        self.params.m
    }

    /// Fragments produced per encode call (k + m)
    pub fn total_fragments(&self) -> usize {
        self.params.total()
    }

    fn codec(&self) -> Result<&dyn ShardCodec> {
        self.codec.as_deref().ok_or(Error::AlreadyClosed("backend"))
    }

    fn frame(&self, index: usize, payload: &[u8], orig_data_size: u64) -> Vec<u8> {
        let header = FragmentHeader::new(
            index as u32,
            payload.len() as u32,
            orig_data_size,
            self.entry.id,
            self.entry.version,
        )
        .with_data_checksum(self.params.checksum, payload);

        let mut fragment = Vec::with_capacity(HEADER_SIZE + payload.len());
        fragment.extend_from_slice(&header.encode());
        fragment.extend_from_slice(payload);
        fragment
    }

    /// Why this instance will not use a fragment, if it won't
    fn rejection(&self, info: &FragmentInfo) -> Option<String> {
        if let Some(fault) = &info.fault {
            return Some(fault.clone());
        }
        if info.backend_id != self.entry.id {
            return Some(format!(
                "produced by {}, not {}",
                info.backend_name, self.entry.name
            ));
        }
        if info.backend_version > self.entry.version {
            return Some(format!(
                "backend version {} is newer than {}",
                info.backend_version, self.entry.version
            ));
        }
        None
    }

    fn gather<F: AsRef<[u8]>>(&self, codec: &dyn ShardCodec, fragments: &[F]) -> Result<Batch> {
        let total = codec.total_shards();
        let mut slots: Vec<Option<Vec<u8>>> = vec![None; total];
        let mut reference: Option<(usize, u64)> = None;
        let mut available = 0;

        for (pos, fragment) in fragments.iter().enumerate() {
            let fragment = fragment.as_ref();
            let info = match FragmentInfo::parse(fragment) {
                Ok(info) => info,
                Err(e) => {
                    warn!("Skipping fragment {}: {}", pos, e);
                    continue;
                }
            };
            if let Some(reason) = self.rejection(&info) {
                warn!("Skipping fragment {} (index {}): {}", pos, info.index, reason);
                continue;
            }
            if info.index >= total {
                warn!(
                    "Skipping fragment {}: index {} out of range for {} fragments",
                    pos, info.index, total
                );
                continue;
            }
            let Some(payload) = info.payload(fragment) else {
                warn!(
                    "Skipping fragment {}: payload truncated to {} of {} bytes",
                    pos,
                    fragment.len() - HEADER_SIZE,
                    info.size
                );
                continue;
            };

            match reference {
                None => reference = Some((info.size, info.orig_data_size)),
                Some((size, orig)) if size != info.size || orig != info.orig_data_size => {
                    return Err(Error::BadHeader(format!(
                        "fragment {} (index {}) has size {} and original size {}, expected {} and {}",
                        pos, info.index, info.size, info.orig_data_size, size, orig
                    )));
                }
                Some(_) => {}
            }

            if slots[info.index].is_some() {
                debug!("Ignoring duplicate of fragment index {}", info.index);
                continue;
            }
            slots[info.index] = Some(payload.to_vec());
            available += 1;
        }

        let required = codec.data_shards();
        let Some((size, orig_data_size)) = reference else {
            return Err(Error::InsufficientFragments {
                available: 0,
                required,
            });
        };
        if available < required {
            return Err(Error::InsufficientFragments {
                available,
                required,
            });
        }

        Ok(Batch {
            slots,
            available,
            size,
            orig_data_size,
        })
    }

    /// Encode `data` into k+m fragments.
    ///
    /// Data fragments occupy indices `0..k`, parity fragments `k..k+m`.
    /// Every fragment is an independent, owned buffer.
    #[instrument(skip(self, data), fields(backend = %self.entry.name, data_len = data.len()))]
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        let codec = self.codec()?;
        let k = codec.data_shards();
        let shard_size = payload_size(data.len(), k);
        if u32::try_from(shard_size).is_err() {
            return Err(Error::InvalidParams(format!(
                "{} bytes do not fit in {} fragments",
                data.len(),
                k
            )));
        }

        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(codec.total_shards());
        for i in 0..k {
            let start = (i * shard_size).min(data.len());
            let end = (start + shard_size).min(data.len());
            let mut shard = Vec::with_capacity(shard_size);
            shard.extend_from_slice(&data[start..end]);
            // Pad shard to shard_size
            shard.resize(shard_size, 0);
            shards.push(shard);
        }
        for _ in 0..codec.parity_shards() {
            shards.push(vec![0u8; shard_size]);
        }

        codec.encode(&mut shards)?;

        debug!(
            "Encoded {} bytes into {} fragments of {} bytes each",
            data.len(),
            shards.len(),
            shard_size
        );

        Ok(shards
            .iter()
            .enumerate()
            .map(|(index, payload)| self.frame(index, payload, data.len() as u64))
            .collect())
    }

    /// Decode the original data from any k usable fragments.
    ///
    /// Order does not matter. Invalid, foreign, duplicate, out-of-range and
    /// truncated fragments are skipped; fragments disagreeing on payload or
    /// original size are an error.
    #[instrument(skip_all, fields(backend = %self.entry.name, fragments = fragments.len()))]
    pub fn decode<F: AsRef<[u8]>>(&self, fragments: &[F]) -> Result<Vec<u8>> {
        let codec = self.codec()?;
        let k = codec.data_shards();
        let mut batch = self.gather(codec, fragments)?;

        let orig_data_size = usize::try_from(batch.orig_data_size)
            .ok()
            .filter(|&orig| orig <= k * batch.size)
            .ok_or_else(|| {
                Error::BadHeader(format!(
                    "original size {} exceeds {} fragments of {} bytes",
                    batch.orig_data_size, k, batch.size
                ))
            })?;

        if batch.slots[..k].iter().any(Option::is_none) {
            codec.reconstruct_data(&mut batch.slots)?;
        }

        let mut data = Vec::with_capacity(k * batch.size);
        for shard in batch.slots.iter().take(k).flatten() {
            data.extend_from_slice(shard);
        }
        if data.len() < orig_data_size {
            return Err(Error::Backend(format!(
                "decoded {} bytes, expected {}",
                data.len(),
                orig_data_size
            )));
        }
        data.truncate(orig_data_size);

        debug!(
            "Decoded {} bytes from {}/{} fragments",
            data.len(),
            batch.available,
            codec.total_shards()
        );
        Ok(data)
    }

    /// Rebuild the fragment at `index` from any sufficient subset.
    #[instrument(skip(self, fragments), fields(backend = %self.entry.name, fragments = fragments.len()))]
    pub fn reconstruct<F: AsRef<[u8]>>(&self, fragments: &[F], index: usize) -> Result<Vec<u8>> {
        let codec = self.codec()?;
        if index >= codec.total_shards() {
            return Err(Error::InvalidParams(format!(
                "fragment index {} out of range for {} fragments",
                index,
                codec.total_shards()
            )));
        }

        let mut batch = self.gather(codec, fragments)?;
        if batch.slots[index].is_none() {
            codec.reconstruct(&mut batch.slots)?;
        }
        let payload = batch.slots[index]
            .take()
            .ok_or_else(|| Error::Backend(format!("fragment {} was not rebuilt", index)))?;

        debug!(
            "Reconstructed fragment {} from {} fragments",
            index, batch.available
        );
        Ok(self.frame(index, &payload, batch.orig_data_size))
    }

    /// Whether this instance would refuse `fragment`.
    ///
    /// Checks the header (magic, engine version, metadata checksum), that
    /// the fragment comes from this algorithm at a version no newer than
    /// ours, that the payload is complete, and the data checksum.
    pub fn is_invalid_fragment(&self, fragment: &[u8]) -> bool {
        if self.is_closed() {
            warn!("is_invalid_fragment called on a closed backend");
            return true;
        }
        match FragmentInfo::parse(fragment) {
            Ok(info) => self.rejection(&info).is_some() || info.payload(fragment).is_none(),
            Err(_) => true,
        }
    }
}
