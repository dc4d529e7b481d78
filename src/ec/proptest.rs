//! Property-Based Tests for the Fragment Engine
//!
//! Uses proptest to check the archive format across a wide range of inputs
//! and configurations.
//!
//! # Test Properties
//!
//! 1. **Roundtrip Correctness**: decode(encode(data)) = data
//! 2. **Fault Tolerance**: any k of the k+m fragments decode
//! 3. **Reconstruction**: a rebuilt fragment is byte-identical
//! 4. **Corruption Detection**: any single-byte change to a CRC32 fragment
//!    outside the padding is caught
//! 5. **Streaming**: writer then reader returns the input for any chunking

#![cfg(test)]

use std::io::{Cursor, Read};

use proptest::prelude::*;

use super::backend::{payload_size, Backend, PAYLOAD_ALIGNMENT};
use super::header::{layout, FragmentInfo, HEADER_SIZE};
use super::params::Params;
use super::reader::FragmentReader;
use super::writer::FragmentWriter;

// =============================================================================
// Property Strategies
// =============================================================================

/// k: 2-8 data fragments, m: 1-4 parity fragments
fn ec_config_strategy() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=8, 1usize..=4)
}

fn small_ec_config_strategy() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=4, 1usize..=2)
}

fn small_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..1000)
}

fn backend_name_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("liberasurecode_rs_vand"),
        Just("isa_l_rs_vand"),
        Just("jerasure_rs_vand"),
    ]
}

fn open(name: &str, k: usize, m: usize) -> Backend {
    Backend::open(Params::new(name, k, m)).unwrap()
}

// =============================================================================
// Roundtrip Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: Encoding then decoding all fragments returns the input.
    #[test]
    fn prop_roundtrip_no_loss(
        name in backend_name_strategy(),
        (k, m) in small_ec_config_strategy(),
        data in small_data_strategy(),
    ) {
        let backend = open(name, k, m);
        let fragments = backend.encode(&data)?;
        prop_assert_eq!(fragments.len(), k + m);

        let data_len = data.len();
        let recovered = backend.decode(&fragments)?;
        prop_assert_eq!(recovered, data, "Roundtrip failed for k={}, m={}, data_len={}", k, m, data_len);
    }

    /// Property: Any pattern of up to m lost fragments is recoverable.
    #[test]
    fn prop_any_erasure_pattern(
        (k, m) in (2usize..=4, 1usize..=2),
        data in prop::collection::vec(any::<u8>(), 100..500),
        erasure_indices in prop::collection::vec(0usize..6, 0..=2),
    ) {
        let backend = open("liberasurecode_rs_vand", k, m);
        let total = k + m;

        let mut erasures: Vec<usize> = erasure_indices
            .into_iter()
            .filter(|&i| i < total)
            .collect();
        erasures.sort();
        erasures.dedup();

        // Skip test if too many erasures
        if erasures.len() > m {
            return Ok(());
        }

        let survivors: Vec<Vec<u8>> = backend
            .encode(&data)?
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !erasures.contains(i))
            .map(|(_, f)| f)
            .collect();

        let recovered = backend.decode(&survivors)?;
        prop_assert_eq!(recovered, data,
            "Recovery failed for k={}, m={}, erasures={:?}", k, m, erasures);
    }

    /// Property: Every fragment can be rebuilt byte-for-byte from the others.
    #[test]
    fn prop_reconstruct_is_identical(
        (k, m) in small_ec_config_strategy(),
        data in small_data_strategy(),
        missing in 0usize..6,
    ) {
        let backend = open("isa_l_rs_vand", k, m);
        let fragments = backend.encode(&data)?;
        let missing = missing % fragments.len();

        let others: Vec<&Vec<u8>> = fragments
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != missing)
            .map(|(_, f)| f)
            .collect();
        let rebuilt = backend.reconstruct(&others, missing)?;
        prop_assert_eq!(&rebuilt, &fragments[missing]);
    }
}

// =============================================================================
// Layout Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: Payload sizes are aligned and large enough for the input.
    #[test]
    fn prop_payload_size_calculation(
        k in 1usize..=16,
        data_len in 0usize..100_000,
    ) {
        let size = payload_size(data_len, k);
        prop_assert_eq!(size % PAYLOAD_ALIGNMENT, 0);
        prop_assert!(size >= PAYLOAD_ALIGNMENT);
        prop_assert!(size * k >= data_len);
        prop_assert!(size < data_len.div_ceil(k) + PAYLOAD_ALIGNMENT);
    }

    /// Property: Data fragments carry the input verbatim, in order.
    #[test]
    fn prop_data_fragments_contain_all_data(
        (k, m) in ec_config_strategy(),
        data in prop::collection::vec(any::<u8>(), 100..1000),
    ) {
        let backend = open("liberasurecode_rs_vand", k, m);
        let fragments = backend.encode(&data)?;

        let mut concatenated: Vec<u8> = Vec::new();
        for (i, fragment) in fragments.iter().enumerate() {
            let info = FragmentInfo::parse(fragment)?;
            prop_assert!(info.is_valid);
            prop_assert_eq!(info.index, i);
            prop_assert_eq!(info.orig_data_size, data.len() as u64);
            if i < k {
                concatenated.extend_from_slice(&fragment[HEADER_SIZE..]);
            }
        }

        prop_assert!(concatenated.len() >= data.len());
        prop_assert_eq!(&concatenated[..data.len()], data.as_slice());
        prop_assert!(concatenated[data.len()..].iter().all(|&b| b == 0));
    }
}

// =============================================================================
// Corruption Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: A single changed byte outside the padding and the engine
    /// version invalidates a CRC32 fragment.
    #[test]
    fn prop_single_byte_corruption_detected(
        data in prop::collection::vec(any::<u8>(), 1..300),
        offset in 0usize..400,
        flip in 1u8..=255,
    ) {
        let backend = open("liberasurecode_rs_vand", 2, 1);
        let mut fragment = backend.encode(&data)?.remove(0);
        let offset = offset % fragment.len();
        prop_assume!(!layout::PADDING.contains(&offset));
        prop_assume!(!layout::LIBEC_VERSION.contains(&offset));

        fragment[offset] ^= flip;
        prop_assert!(backend.is_invalid_fragment(&fragment),
            "offset {} flip 0x{:02x} went unnoticed", offset, flip);
    }

    /// Property: Padding bytes never affect validity.
    #[test]
    fn prop_padding_is_ignored(
        offset in layout::PADDING,
        value in any::<u8>(),
    ) {
        let backend = open("liberasurecode_rs_vand", 2, 1);
        let mut fragment = backend.encode(b"padding")?.remove(0);
        fragment[offset] = value;
        prop_assert!(!backend.is_invalid_fragment(&fragment));
    }
}

// =============================================================================
// Streaming Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: Writing in arbitrary chunks and reading back is lossless.
    #[test]
    fn prop_stream_roundtrip(
        (k, m) in small_ec_config_strategy(),
        data in prop::collection::vec(any::<u8>(), 0..5000),
        chunk in 1usize..2000,
        read_buf in 1usize..3000,
    ) {
        let backend = open("liberasurecode_rs_vand", k, m);
        let mut sinks: Vec<Vec<u8>> = vec![Vec::new(); k + m];
        {
            let mut writer = FragmentWriter::new(&backend, sinks.iter_mut().collect())?;
            for piece in data.chunks(chunk) {
                writer.write_chunk(piece)?;
            }
            writer.close()?;
        }

        let sources: Vec<Cursor<Vec<u8>>> = sinks.into_iter().map(Cursor::new).collect();
        let mut reader = FragmentReader::new(&backend, sources)?;
        let mut out = Vec::new();
        let mut buf = vec![0u8; read_buf];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        prop_assert_eq!(out, data);
    }
}

// =============================================================================
// Determinism Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Property: Separate instances with the same parameters agree.
    #[test]
    fn prop_encoder_consistency(
        (k, m) in small_ec_config_strategy(),
        data in small_data_strategy(),
    ) {
        let fragments1 = open("liberasurecode_rs_vand", k, m).encode(&data)?;
        let fragments2 = open("liberasurecode_rs_vand", k, m).encode(&data)?;
        prop_assert_eq!(fragments1, fragments2, "Different instances should produce same output");
    }

    /// Property: Fewer than k fragments always fails.
    #[test]
    fn prop_too_many_erasures_fails(
        (k, m) in (2usize..=4, 1usize..=2),
        data in prop::collection::vec(any::<u8>(), 100..500),
    ) {
        let backend = open("liberasurecode_rs_vand", k, m);
        let fragments = backend.encode(&data)?;

        let result = backend.decode(&fragments[m + 1..]);
        prop_assert!(result.is_err(), "Should fail with {} erasures (m={})", m + 1, m);
    }
}
