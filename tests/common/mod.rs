//! Shared test utilities for integration tests.
//!
//! Archives are built with `tar::Builder` (and `flate2` for gzip) into a
//! temporary directory that lives as long as the returned [`Fixture`].
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// An archive file on disk plus the directory keeping it alive.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    /// Writes `bytes` to a fresh temporary file named `name`.
    pub fn write(name: &str, bytes: &[u8]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).expect("write archive");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Builds a plain tar stream from (path, data) pairs.
pub fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_600_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        builder
            .append_data(&mut header, name, *data)
            .expect("append entry");
    }
    builder.into_inner().expect("finish tar")
}

/// Compresses `data` with gzip.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Writes a `.tar.gz` fixture.
pub fn tar_gz(entries: &[(&str, &[u8])]) -> Fixture {
    Fixture::write("fixture.tar.gz", &gzip(&tar_bytes(entries)))
}

/// Writes a plain `.tar` fixture.
pub fn plain_tar(entries: &[(&str, &[u8])]) -> Fixture {
    Fixture::write("fixture.tar", &tar_bytes(entries))
}

/// Deterministic payload of `len` bytes; `seed` varies the content per entry.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Incompressible payload from a small LCG.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}

/// The entries of the {0, 10, 4096} bytes scenario.
pub fn three_entries() -> Vec<(String, Vec<u8>)> {
    vec![
        ("empty.txt".to_string(), Vec::new()),
        ("small.txt".to_string(), payload(10, 1)),
        ("large.bin".to_string(), payload(4096, 2)),
    ]
}

/// Borrows owned entries in the shape the builders take.
pub fn as_refs(entries: &[(String, Vec<u8>)]) -> Vec<(&str, &[u8])> {
    entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.as_slice()))
        .collect()
}
