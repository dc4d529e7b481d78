//! Archive Inspector
//!
//! Walks one fragment file from start to end and summarizes it: the first
//! fragment's metadata, how many fragments and bytes follow, the original
//! input size they add up to, and fragments that do not look like their
//! neighbours.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::ec::header::FragmentInfo;
use crate::ec::reader::read_fragment;
use crate::error::Result;

/// What is odd about a fragment compared with the first one in its file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    UnexpectedBackend { backend: String },
    UnexpectedIndex { index: usize },
    UnexpectedSize { size: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    /// 1-based position of the fragment within the file
    pub fragment: usize,
    /// Byte offset of the fragment within the file
    pub offset: u64,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fragment {} (offset 0x{:08x}) has unexpected ", self.fragment, self.offset)?;
        match &self.kind {
            AnomalyKind::UnexpectedBackend { backend } => write!(f, "backend {}", backend),
            AnomalyKind::UnexpectedIndex { index } => write!(f, "index {}", index),
            AnomalyKind::UnexpectedSize { size } => write!(f, "size {}", size),
        }
    }
}

/// Summary of one fragment file
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveSummary {
    /// Metadata of the first fragment
    pub first: Option<FragmentInfo>,
    /// Fragments read successfully
    pub fragments: usize,
    /// Bytes those fragments occupy
    pub bytes: u64,
    /// Sum of their original-data sizes
    pub orig_data_size: u64,
    pub anomalies: Vec<Anomaly>,
    /// Why the walk stopped before the end of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArchiveSummary {
    /// Whether the whole file was read
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Summarize every fragment readable from `reader`.
///
/// A payload-size change on the last fragment is normal (the final chunk
/// of a stream is usually short) and is only reported once another
/// fragment follows it.
pub fn inspect<R: Read>(reader: &mut R) -> ArchiveSummary {
    let mut summary = ArchiveSummary::default();
    let mut pending_size: Option<Anomaly> = None;

    loop {
        let fragment = match read_fragment(reader) {
            Ok(Some(fragment)) => fragment,
            Ok(None) => break,
            Err(e) => {
                summary.anomalies.extend(pending_size.take());
                summary.error = Some(format!(
                    "error reading fragment {} (offset 0x{:08x}): {}",
                    summary.fragments + 1,
                    summary.bytes,
                    e
                ));
                break;
            }
        };
        summary.anomalies.extend(pending_size.take());

        let ordinal = summary.fragments + 1;
        let offset = summary.bytes;
        let info = match FragmentInfo::parse(&fragment) {
            Ok(info) => info,
            Err(e) => {
                summary.error = Some(e.to_string());
                break;
            }
        };
        if let Some(fault) = &info.fault {
            summary.error = Some(format!(
                "invalid fragment {} (offset 0x{:08x}): {}",
                ordinal, offset, fault
            ));
            break;
        }
        let first = summary.first.get_or_insert_with(|| info.clone());

        if info.backend_name != first.backend_name {
            summary.anomalies.push(Anomaly {
                fragment: ordinal,
                offset,
                kind: AnomalyKind::UnexpectedBackend {
                    backend: info.backend_name.clone(),
                },
            });
        }
        if info.index != first.index {
            summary.anomalies.push(Anomaly {
                fragment: ordinal,
                offset,
                kind: AnomalyKind::UnexpectedIndex { index: info.index },
            });
        }
        if info.size != first.size {
            pending_size = Some(Anomaly {
                fragment: ordinal,
                offset,
                kind: AnomalyKind::UnexpectedSize { size: info.size },
            });
        }

        summary.fragments += 1;
        summary.bytes += fragment.len() as u64;
        summary.orig_data_size += info.orig_data_size;
    }

    debug!(
        "Inspected {} fragments ({} bytes, {} anomalies)",
        summary.fragments,
        summary.bytes,
        summary.anomalies.len()
    );
    summary
}

/// Open and summarize one fragment file
pub fn inspect_file(path: impl AsRef<Path>) -> Result<ArchiveSummary> {
    let mut file = File::open(path)?;
    Ok(inspect(&mut file))
}
