//! Shared helpers for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

/// Backends and shapes exercised by the suites
pub const VALID_ARGS: &[(&str, usize, usize)] = &[
    ("liberasurecode_rs_vand", 2, 1),
    ("liberasurecode_rs_vand", 10, 4),
    ("isa_l_rs_vand", 10, 4),
    ("jerasure_rs_vand", 10, 4),
];

/// Inputs of every interesting size and a few byte patterns
pub fn test_patterns() -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        vec![0x00; 1],
        vec![0xff; 1],
        vec![0x00; 1 << 10],
        vec![0xff; 1 << 10],
        vec![0x00; 1 << 20],
        vec![0xff; 1 << 20],
        [0xf0u8, 0x0f].repeat(512),
        [0xdeu8, 0xad, 0xbe, 0xef].repeat(256),
        [0xdeu8, 0xad, 0xbe, 0xef].repeat(1 << 18),
        vec![0xaa; 1024],
        vec![0x55; 1024],
    ]
}

/// Shuffled copy of `fragments`
pub fn shuffled<T: Clone>(fragments: &[T]) -> Vec<T> {
    let mut out = fragments.to_vec();
    out.shuffle(&mut rand::thread_rng());
    out
}

/// Scratch directory removed on drop
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!("ecarchive-{}-{}", label, uuid::Uuid::new_v4()));
        fs::create_dir_all(&path).expect("Failed to create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
