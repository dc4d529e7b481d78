//! Fragment Header Codec
//!
//! Every fragment starts with a fixed 80-byte little-endian header that
//! makes it self-describing: which algorithm produced it, where it sits
//! among the K+M fragments of one encode call, how long its payload and the
//! original input were, and two checksums (one over the header metadata,
//! one over the payload).
//!
//! The layout is bit-compatible with the packed `fragment_header_t` used by
//! liberasurecode, so archives written by either side can be inspected by
//! the other:
//!
//! ```text
//!  0        4        8        12               20 21                      53 54 55      59      63      67      71         80
//!  ┌────────┬────────┬────────┬────────────────┬──┬────────────────────────┬──┬──┬───────┬───────┬───────┬───────┬──────────┐
//!  │ index  │  size  │be meta │ orig_data_size │ct│ checksum words (8×u32) │mm│id│be ver │ magic │libec v│meta ck│ padding  │
//!  └────────┴────────┴────────┴────────────────┴──┴────────────────────────┴──┴──┴───────┴───────┴───────┴───────┴──────────┘
//!  └──────────────────────── metadata, covered by the metadata checksum ──────────────────────┘
//! ```
//!
//! Parsing never fails on malformed contents; it records the verdict in
//! [`FragmentInfo::is_valid`]. Only a buffer shorter than the header is an
//! error, because that is a framing problem rather than a corrupt fragment.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::ec::catalog;
use crate::error::{Error, Result};

/// Size of the fixed fragment header in bytes
pub const HEADER_SIZE: usize = 80;

/// Magic number stored in every header
pub const FRAGMENT_MAGIC: u32 = 0x0b0c_5ecc;

/// Number of 32-bit checksum words reserved in the header
pub const CHECKSUM_WORDS: usize = 8;

/// Engine version written into (and accepted from) fragment headers
pub const ENGINE_VERSION: Version = Version::new(1, 6, 3);

/// First engine version that sealed headers with a metadata checksum
pub const METADATA_CHECKSUM_SINCE: Version = Version::new(1, 2, 0);

/// Byte ranges of the header fields.
pub mod layout {
    use std::ops::Range;

    pub const INDEX: Range<usize> = 0..4;
    pub const SIZE: Range<usize> = 4..8;
    pub const BACKEND_METADATA_SIZE: Range<usize> = 8..12;
    pub const ORIG_DATA_SIZE: Range<usize> = 12..20;
    pub const CHECKSUM_TYPE: usize = 20;
    pub const CHECKSUM: Range<usize> = 21..53;
    pub const CHECKSUM_MISMATCH: usize = 53;
    pub const BACKEND_ID: usize = 54;
    pub const BACKEND_VERSION: Range<usize> = 55..59;
    /// Everything the metadata checksum covers
    pub const METADATA: Range<usize> = 0..59;
    pub const MAGIC: Range<usize> = 59..63;
    pub const LIBEC_VERSION: Range<usize> = 63..67;
    pub const METADATA_CHECKSUM: Range<usize> = 67..71;
    pub const PADDING: Range<usize> = 71..80;
}

// =============================================================================
// Version
// =============================================================================

/// Packed `major.minor.rev` version, `major << 16 | minor << 8 | rev`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    pub const fn new(major: u32, minor: u32, rev: u32) -> Self {
        Self(((major & 0xffff) << 16) | ((minor & 0xff) << 8) | (rev & 0xff))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u32 {
        self.0 >> 16
    }

    pub const fn minor(self) -> u32 {
        (self.0 >> 8) & 0xff
    }

    pub const fn rev(self) -> u32 {
        self.0 & 0xff
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.rev())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Checksum Type
// =============================================================================

/// Data checksum algorithm recorded in a header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChecksumType {
    /// No data checksum
    None,
    /// CRC32 (zlib polynomial) over the payload, stored in word 0
    #[default]
    Crc32,
    /// MD5; recognized but never verified
    Md5,
    /// Any other value; disables data verification
    Unknown(u8),
}

impl ChecksumType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ChecksumType::None,
            2 => ChecksumType::Crc32,
            3 => ChecksumType::Md5,
            other => ChecksumType::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            ChecksumType::None => 1,
            ChecksumType::Crc32 => 2,
            ChecksumType::Md5 => 3,
            ChecksumType::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumType::None => write!(f, "none"),
            ChecksumType::Crc32 => write!(f, "crc32"),
            ChecksumType::Md5 => write!(f, "md5"),
            ChecksumType::Unknown(raw) => write!(f, "unknown({})", raw),
        }
    }
}

impl FromStr for ChecksumType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ChecksumType::None),
            "crc32" => Ok(ChecksumType::Crc32),
            "md5" => Ok(ChecksumType::Md5),
            _ => Err(Error::InvalidParams(format!("unknown checksum type {:?}", s))),
        }
    }
}

impl Serialize for ChecksumType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Raw Header
// =============================================================================

fn le_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(word)
}

/// Field-by-field view of a fragment header.
///
/// Decoding copies fields verbatim without judging them; [`encode`] always
/// seals the result with a fresh metadata checksum.
///
/// [`encode`]: FragmentHeader::encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentHeader {
    pub index: u32,
    pub size: u32,
    pub backend_metadata_size: u32,
    pub orig_data_size: u64,
    pub checksum_type: ChecksumType,
    pub checksum: [u32; CHECKSUM_WORDS],
    pub checksum_mismatch: u8,
    pub backend_id: u8,
    pub backend_version: Version,
    pub magic: u32,
    pub libec_version: Version,
    pub metadata_checksum: u32,
}

impl FragmentHeader {
    /// Header for a fragment produced by this engine, without a data checksum
    pub fn new(
        index: u32,
        size: u32,
        orig_data_size: u64,
        backend_id: u8,
        backend_version: Version,
    ) -> Self {
        Self {
            index,
            size,
            backend_metadata_size: 0,
            orig_data_size,
            checksum_type: ChecksumType::None,
            checksum: [0; CHECKSUM_WORDS],
            checksum_mismatch: 0,
            backend_id,
            backend_version,
            magic: FRAGMENT_MAGIC,
            libec_version: ENGINE_VERSION,
            metadata_checksum: 0,
        }
    }

    /// Record a data checksum of `payload`.
    ///
    /// Only CRC32 can be computed here; other types are recorded with
    /// zeroed checksum words.
    pub fn with_data_checksum(mut self, checksum_type: ChecksumType, payload: &[u8]) -> Self {
        self.checksum_type = checksum_type;
        self.checksum = [0; CHECKSUM_WORDS];
        if checksum_type == ChecksumType::Crc32 {
            self.checksum[0] = crc32fast::hash(payload);
        }
        self
    }

    /// Decode the raw fields of a header.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::TruncatedHeader {
                have: bytes.len(),
                need: HEADER_SIZE,
            });
        }

        let mut checksum = [0u32; CHECKSUM_WORDS];
        for (i, word) in checksum.iter_mut().enumerate() {
            let at = layout::CHECKSUM.start + i * 4;
            *word = le_u32(&bytes[at..at + 4]);
        }

        Ok(Self {
            index: le_u32(&bytes[layout::INDEX]),
            size: le_u32(&bytes[layout::SIZE]),
            backend_metadata_size: le_u32(&bytes[layout::BACKEND_METADATA_SIZE]),
            orig_data_size: le_u64(&bytes[layout::ORIG_DATA_SIZE]),
            checksum_type: ChecksumType::from_raw(bytes[layout::CHECKSUM_TYPE]),
            checksum,
            checksum_mismatch: bytes[layout::CHECKSUM_MISMATCH],
            backend_id: bytes[layout::BACKEND_ID],
            backend_version: Version::from_raw(le_u32(&bytes[layout::BACKEND_VERSION])),
            magic: le_u32(&bytes[layout::MAGIC]),
            libec_version: Version::from_raw(le_u32(&bytes[layout::LIBEC_VERSION])),
            metadata_checksum: le_u32(&bytes[layout::METADATA_CHECKSUM]),
        })
    }

    /// Encode and seal the header.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[layout::INDEX].copy_from_slice(&self.index.to_le_bytes());
        out[layout::SIZE].copy_from_slice(&self.size.to_le_bytes());
        out[layout::BACKEND_METADATA_SIZE]
            .copy_from_slice(&self.backend_metadata_size.to_le_bytes());
        out[layout::ORIG_DATA_SIZE].copy_from_slice(&self.orig_data_size.to_le_bytes());
        out[layout::CHECKSUM_TYPE] = self.checksum_type.raw();
        for (i, word) in self.checksum.iter().enumerate() {
            let at = layout::CHECKSUM.start + i * 4;
            out[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        out[layout::CHECKSUM_MISMATCH] = self.checksum_mismatch;
        out[layout::BACKEND_ID] = self.backend_id;
        out[layout::BACKEND_VERSION].copy_from_slice(&self.backend_version.raw().to_le_bytes());
        out[layout::MAGIC].copy_from_slice(&self.magic.to_le_bytes());
        out[layout::LIBEC_VERSION].copy_from_slice(&self.libec_version.raw().to_le_bytes());
        let sealed = crc32fast::hash(&out[layout::METADATA]);
        out[layout::METADATA_CHECKSUM].copy_from_slice(&sealed.to_le_bytes());
        out
    }
}

/// Judge the header bytes; `Err` carries the reason.
fn check_header(header: &FragmentHeader, bytes: &[u8]) -> std::result::Result<(), String> {
    if header.magic != FRAGMENT_MAGIC {
        return Err(format!("bad magic 0x{:08x}", header.magic));
    }
    if header.libec_version.raw() == 0 {
        return Err("engine version is zero".to_string());
    }
    if header.libec_version > ENGINE_VERSION {
        return Err(format!(
            "engine version {} is newer than {}",
            header.libec_version, ENGINE_VERSION
        ));
    }
    if header.libec_version < METADATA_CHECKSUM_SINCE {
        // pre-checksum fragment; nothing more to verify
        return Ok(());
    }
    let computed = crc32fast::hash(&bytes[layout::METADATA]);
    if computed != header.metadata_checksum {
        return Err("metadata checksum failed".to_string());
    }
    Ok(())
}

fn payload_range(size: usize) -> Range<usize> {
    HEADER_SIZE..HEADER_SIZE + size
}

// =============================================================================
// Fragment Info
// =============================================================================

/// Metadata of one fragment, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentInfo {
    pub index: usize,
    pub size: usize,
    pub backend_metadata_size: usize,
    pub orig_data_size: u64,
    pub checksum_type: ChecksumType,
    pub checksum: u32,
    pub checksum_mismatch: bool,
    pub backend_id: u8,
    pub backend_name: String,
    pub backend_version: Version,
    pub libec_version: Version,
    pub is_valid: bool,
    /// Why the fragment is invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl FragmentInfo {
    /// Parse a fragment (or just its header).
    ///
    /// The data checksum is evaluated only when the full payload is present
    /// and the checksum type is CRC32.
    pub fn parse(fragment: &[u8]) -> Result<Self> {
        let header = FragmentHeader::decode(fragment)?;
        let size = header.size as usize;

        let mut fault = check_header(&header, fragment).err();

        let checksum_mismatch = header.checksum_type == ChecksumType::Crc32
            && fragment.len() >= HEADER_SIZE + size
            && crc32fast::hash(&fragment[payload_range(size)]) != header.checksum[0];
        if checksum_mismatch && fault.is_none() {
            fault = Some("data checksum mismatch".to_string());
        }

        Ok(Self {
            index: header.index as usize,
            size,
            backend_metadata_size: header.backend_metadata_size as usize,
            orig_data_size: header.orig_data_size,
            checksum_type: header.checksum_type,
            checksum: header.checksum[0],
            checksum_mismatch,
            backend_id: header.backend_id,
            backend_name: catalog::backend_name(header.backend_id),
            backend_version: header.backend_version,
            libec_version: header.libec_version,
            is_valid: fault.is_none(),
            fault,
        })
    }

    /// Header plus payload length
    pub fn fragment_len(&self) -> usize {
        HEADER_SIZE + self.size
    }

    /// The payload slice of `fragment`, if it is all there
    pub fn payload<'a>(&self, fragment: &'a [u8]) -> Option<&'a [u8]> {
        fragment.get(payload_range(self.size))
    }
}
