//! Backend Catalog
//!
//! The fixed, closed list of erasure-coding algorithms known to the archive
//! format. Identifiers match the ones liberasurecode writes into fragment
//! headers, so foreign archives resolve to the right name even when the
//! algorithm has no implementation here.
//!
//! An entry is *available* when this build carries a constructor for it.

use once_cell::sync::Lazy;

use crate::adapters::{NullCodec, ReedSolomonCodec};
use crate::domain::ports::{CodecConstructor, ShardCodec};
use crate::ec::header::Version;
use crate::ec::params::Params;
use crate::error::{Error, Result};

/// One known algorithm
#[derive(Debug)]
pub struct BackendEntry {
    /// Identifier stored in fragment headers
    pub id: u8,
    /// Name used on the command line and in `Params`
    pub name: &'static str,
    /// Version stamped into produced fragments
    pub version: Version,
    constructor: Option<CodecConstructor>,
}

impl BackendEntry {
    pub fn is_available(&self) -> bool {
        self.constructor.is_some()
    }

    pub(crate) fn instantiate(&self, params: &Params) -> Result<Box<dyn ShardCodec>> {
        match self.constructor {
            Some(construct) => construct(params),
            None => Err(Error::BackendNotAvailable(self.name.to_string())),
        }
    }
}

static CATALOG: [BackendEntry; 9] = [
    BackendEntry {
        id: 0,
        name: "null",
        version: Version::new(1, 0, 0),
        constructor: Some(NullCodec::from_params as CodecConstructor),
    },
    BackendEntry {
        id: 1,
        name: "jerasure_rs_vand",
        version: Version::new(2, 0, 0),
        constructor: Some(ReedSolomonCodec::from_params as CodecConstructor),
    },
    BackendEntry {
        id: 2,
        name: "jerasure_rs_cauchy",
        version: Version::new(2, 0, 0),
        constructor: None,
    },
    BackendEntry {
        id: 3,
        name: "flat_xor_hd",
        version: Version::new(1, 0, 0),
        constructor: None,
    },
    BackendEntry {
        id: 4,
        name: "isa_l_rs_vand",
        version: Version::new(2, 0, 0),
        constructor: Some(ReedSolomonCodec::from_params as CodecConstructor),
    },
    BackendEntry {
        id: 5,
        name: "shss",
        version: Version::new(1, 0, 0),
        constructor: None,
    },
    BackendEntry {
        id: 6,
        name: "liberasurecode_rs_vand",
        version: Version::new(1, 0, 0),
        constructor: Some(ReedSolomonCodec::from_params as CodecConstructor),
    },
    BackendEntry {
        id: 7,
        name: "isa_l_rs_cauchy",
        version: Version::new(2, 0, 0),
        constructor: None,
    },
    BackendEntry {
        id: 8,
        name: "libphazr",
        version: Version::new(1, 0, 0),
        constructor: None,
    },
];

static AVAILABLE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    CATALOG
        .iter()
        .filter(|entry| entry.is_available())
        .map(|entry| entry.name)
        .collect()
});

/// Every known algorithm, in identifier order
pub fn entries() -> &'static [BackendEntry] {
    &CATALOG
}

/// Look an algorithm up by name
pub fn lookup(name: &str) -> Option<&'static BackendEntry> {
    CATALOG.iter().find(|entry| entry.name == name)
}

/// Look an algorithm up by header identifier
pub fn lookup_id(id: u8) -> Option<&'static BackendEntry> {
    CATALOG.iter().find(|entry| entry.id == id)
}

/// Name for a header identifier, with a readable placeholder for unknown ids
pub fn backend_name(id: u8) -> String {
    match lookup_id(id) {
        Some(entry) => entry.name.to_string(),
        None => format!("<unknown backend id {}>", id),
    }
}

/// Whether `name` is known and implemented in this build
pub fn is_available(name: &str) -> bool {
    lookup(name).is_some_and(BackendEntry::is_available)
}

/// Names of all usable algorithms
pub fn available_backends() -> &'static [&'static str] {
    AVAILABLE.as_slice()
}
