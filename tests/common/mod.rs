//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

pub use approx_store::{
    Database, RegionHandle, RegionKind, RegionState, ScalarType, SharedDatabase, StoreConfig,
    StoreError, StoreReader, StreamSide, Tensor, VarInfo,
};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once so `RUST_LOG` shows store logs.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Config that fsyncs every commit.
pub fn always_config() -> StoreConfig {
    StoreConfig::always()
}

/// Config that replaces an existing file.
pub fn truncate_config() -> StoreConfig {
    StoreConfig {
        on_existing: "truncate".to_string(),
        ..StoreConfig::always()
    }
}

/// A store file in its own temporary directory.
pub struct TestStore {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TestStore {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("trace.apx");
        TestStore { dir, path }
    }

    /// Open a writer with fsync on every commit.
    pub fn open(&self) -> Database {
        Database::open_with_config(&self.path, always_config()).expect("open store")
    }

    pub fn open_with(&self, config: StoreConfig) -> Database {
        Database::open_with_config(&self.path, config).expect("open store")
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader::open(&self.path).expect("open reader")
    }

    pub fn file_size(&self) -> u64 {
        file_size(&self.path)
    }
}

/// Record `pairs` input/output pairs: input `[i, i+1]`, output `[2i]`.
pub fn record_pairs(db: &mut Database, handle: RegionHandle, pairs: usize) {
    for i in 0..pairs {
        let x = Tensor::vector(&[i as f64, i as f64 + 1.0]);
        let y = Tensor::vector(&[2.0 * i as f64]);
        db.write_tensor(handle, &x).expect("input");
        db.write_tensor(handle, &y).expect("output");
    }
}

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Truncate a file to simulate a crash mid-write.
pub fn truncate_file(path: &Path, new_len: u64) {
    let file = OpenOptions::new().write(true).open(path).expect("open for truncate");
    file.set_len(new_len).expect("truncate");
}

/// Overwrite bytes at `offset`.
pub fn corrupt_file_at_offset(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).expect("open for corrupt");
    file.seek(SeekFrom::Start(offset)).expect("seek");
    file.write_all(bytes).expect("write");
}

/// Append raw bytes to a file.
pub fn append_garbage(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).expect("open for append");
    file.write_all(bytes).expect("append");
}
