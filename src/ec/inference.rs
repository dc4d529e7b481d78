//! Parameter Inference
//!
//! Recovers the algorithm and the fragment count of an archive from the
//! first header of each fragment stream. Only header bytes are consumed;
//! seekable sources should be rewound before they are handed to a reader.

use std::io::Read;

use tracing::debug;

use crate::ec::catalog;
use crate::ec::header::{FragmentInfo, HEADER_SIZE};
use crate::ec::params::Params;
use crate::ec::reader::read_full;
use crate::error::{Error, Result};

fn read_first_header<R: Read>(index: usize, source: &mut R) -> Result<FragmentInfo> {
    let in_source = |e: Error| Error::Source {
        index,
        source: Box::new(e),
    };
    let mut header = [0u8; HEADER_SIZE];
    let got = read_full(source, &mut header).map_err(in_source)?;
    if got < HEADER_SIZE {
        return Err(in_source(Error::TruncatedHeader {
            have: got,
            need: HEADER_SIZE,
        }));
    }
    let info = FragmentInfo::parse(&header)?;
    match &info.fault {
        Some(fault) => Err(Error::BadHeader(format!("source {}: {}", index, fault))),
        None => Ok(info),
    }
}

fn check_agrees<T: ToString + PartialEq>(
    index: usize,
    field: &'static str,
    expected: T,
    found: T,
) -> Result<()> {
    if expected == found {
        return Ok(());
    }
    Err(Error::Inconsistent {
        index,
        field,
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

/// Infer coding parameters from the first fragment of every source.
///
/// The result names the algorithm and carries the fragment total
/// (highest index + 1) in `m`, with `k` left at 0; see
/// [`Params::split_total`].
pub fn infer_params<R: Read>(sources: &mut [R]) -> Result<Params> {
    let mut reference: Option<(FragmentInfo, &'static str)> = None;
    let mut total = 0;

    for (index, source) in sources.iter_mut().enumerate() {
        let info = read_first_header(index, source)?;
        total = total.max(info.index + 1);

        if let Some((first, _)) = &reference {
            check_agrees(index, "backend", &first.backend_name, &info.backend_name)?;
            check_agrees(index, "payload size", first.size, info.size)?;
            check_agrees(index, "original size", first.orig_data_size, info.orig_data_size)?;
            continue;
        }

        let entry = catalog::lookup_id(info.backend_id)
            .ok_or_else(|| Error::UnsupportedBackend(info.backend_name.clone()))?;
        reference = Some((info, entry.name));
    }

    let (_, name) = reference
        .ok_or_else(|| Error::InvalidParams("no fragment streams to inspect".into()))?;

    debug!("Inferred backend {} with {} fragments", name, total);
    Ok(Params::new(name, 0, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::backend::Backend;
    use crate::ec::header::{layout, FragmentHeader};
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn fragments(name: &str, k: usize, m: usize, data: &[u8]) -> Vec<Vec<u8>> {
        Backend::open(Params::new(name, k, m)).unwrap().encode(data).unwrap()
    }

    fn cursors(frags: Vec<Vec<u8>>) -> Vec<Cursor<Vec<u8>>> {
        frags.into_iter().map(Cursor::new).collect()
    }

    #[test]
    fn test_infers_name_and_total() {
        let mut sources = cursors(fragments("isa_l_rs_vand", 4, 2, b"inference"));
        let params = infer_params(&mut sources).unwrap();
        assert_eq!(params.name, "isa_l_rs_vand");
        assert_eq!((params.k, params.m), (0, 6));

        // only the header was consumed
        for source in &sources {
            assert_eq!(source.position(), HEADER_SIZE as u64);
        }
    }

    #[test]
    fn test_total_is_order_independent() {
        let mut frags = fragments("liberasurecode_rs_vand", 4, 2, b"order");
        frags.reverse();
        frags.remove(1);
        let params = infer_params(&mut cursors(frags)).unwrap();
        assert_eq!(params.m, 6);
    }

    #[test]
    fn test_names_inconsistent_source() {
        let mut frags = fragments("liberasurecode_rs_vand", 2, 1, &[7u8; 10]);
        frags[2] = fragments("liberasurecode_rs_vand", 2, 1, &[7u8; 100]).remove(2);
        let err = infer_params(&mut cursors(frags)).unwrap_err();
        assert_matches!(
            err,
            Error::Inconsistent {
                index: 2,
                field: "payload size",
                ..
            }
        );
        assert_eq!(err.to_string(), "source 2 has payload size 64, expected 16");
    }

    #[test]
    fn test_mixed_backends() {
        let mut frags = fragments("liberasurecode_rs_vand", 2, 1, b"abc");
        frags[1] = fragments("jerasure_rs_vand", 2, 1, b"abc").remove(1);
        assert_matches!(
            infer_params(&mut cursors(frags)),
            Err(Error::Inconsistent {
                index: 1,
                field: "backend",
                ..
            })
        );
    }

    #[test]
    fn test_bad_header_names_source() {
        let mut frags = fragments("liberasurecode_rs_vand", 2, 1, b"abc");
        frags[1][layout::INDEX.start] ^= 0x01;
        assert_matches!(
            infer_params(&mut cursors(frags)),
            Err(Error::BadHeader(msg)) if msg.starts_with("source 1")
        );
    }

    #[test]
    fn test_unknown_backend_id() {
        let frag = fragments("liberasurecode_rs_vand", 2, 1, b"abc").remove(0);
        let mut header = FragmentHeader::decode(&frag).unwrap();
        header.backend_id = 77;
        let mut sources = vec![Cursor::new(header.encode().to_vec())];
        assert_matches!(infer_params(&mut sources), Err(Error::UnsupportedBackend(_)));
    }

    #[test]
    fn test_empty_and_short_sources() {
        let mut none: Vec<Cursor<Vec<u8>>> = Vec::new();
        assert_matches!(infer_params(&mut none), Err(Error::InvalidParams(_)));

        let mut short = vec![Cursor::new(vec![0u8; 10])];
        assert_matches!(
            infer_params(&mut short),
            Err(Error::Source { index: 0, source }) if matches!(*source, Error::TruncatedHeader { have: 10, .. })
        );

        let mut sources = cursors(fragments("liberasurecode_rs_vand", 2, 1, b"abc"));
        sources[2] = Cursor::new(Vec::new());
        let err = infer_params(&mut sources).unwrap_err();
        assert_eq!(err.to_string(), "source 2: truncated fragment header: got 0 of 80 bytes");
    }

    /// Reader that fails on first use
    struct Unreadable;

    impl Read for Unreadable {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[test]
    fn test_io_error_names_source() {
        let mut sources = vec![Unreadable];
        let err = infer_params(&mut sources).unwrap_err();
        assert_matches!(
            &err,
            Error::Source { index: 0, source } if matches!(**source, Error::Io(ref e) if e.kind() == std::io::ErrorKind::PermissionDenied)
        );
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_names_original_size_mismatch() {
        // 20 and 30 bytes both pad to 16-byte payloads with k=2
        let mut frags = fragments("liberasurecode_rs_vand", 2, 1, &[3u8; 20]);
        frags[1] = fragments("liberasurecode_rs_vand", 2, 1, &[3u8; 30]).remove(1);
        let err = infer_params(&mut cursors(frags)).unwrap_err();
        assert_matches!(
            err,
            Error::Inconsistent {
                index: 1,
                field: "original size",
                ..
            }
        );
        assert_eq!(err.to_string(), "source 1 has original size 30, expected 20");
    }
}
