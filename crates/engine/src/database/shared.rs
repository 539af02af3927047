//! Thread-safe handle over a [`Database`].
//!
//! Every call takes the lock for its whole duration, so calls from
//! different threads are serialized and each region still sees a strict
//! input/output order.

use super::{Database, RegionInfo, StoreConfig};
use crate::tabular::VarInfo;
use approx_store_core::{RegionHandle, StoreResult, TensorView};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Cloneable, `Send + Sync` handle to one Database.
#[derive(Debug, Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    /// Wrap an open Database.
    pub fn new(db: Database) -> Self {
        SharedDatabase {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Database::open(path).map(Self::new)
    }

    /// Open or create the store at `path` with `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        Database::open_with_config(path, config).map(Self::new)
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut Database) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// See [`Database::instantiate_region`].
    pub fn instantiate_region(
        &self,
        address: u64,
        name: &str,
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle> {
        self.inner.lock().instantiate_region(address, name, chunk_rows_hint)
    }

    /// See [`Database::instantiate_tabular_region`].
    pub fn instantiate_tabular_region(
        &self,
        address: u64,
        name: &str,
        inputs: &[VarInfo],
        outputs: &[VarInfo],
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle> {
        self.inner
            .lock()
            .instantiate_tabular_region(address, name, inputs, outputs, chunk_rows_hint)
    }

    /// See [`Database::write_tensor`].
    pub fn write_tensor<'a>(
        &self,
        handle: RegionHandle,
        tensor: impl Into<TensorView<'a>>,
    ) -> StoreResult<u64> {
        self.inner.lock().write_tensor(handle, tensor)
    }

    /// See [`Database::write`].
    pub fn write(
        &self,
        handle: RegionHandle,
        buffer: &[f64],
        num_rows: u64,
        num_cols: u64,
    ) -> StoreResult<u64> {
        self.inner.lock().write(handle, buffer, num_rows, num_cols)
    }

    /// See [`Database::register_memory`].
    pub fn register_memory(
        &self,
        group_name: &str,
        name: &str,
        address: u64,
        size_bytes: u64,
        type_id: i64,
    ) -> StoreResult<()> {
        self.inner
            .lock()
            .register_memory(group_name, name, address, size_bytes, type_id)
    }

    /// See [`Database::region_info`].
    pub fn region_info(&self, handle: RegionHandle) -> StoreResult<RegionInfo> {
        self.inner.lock().region_info(handle)
    }

    /// See [`Database::region_count`].
    pub fn region_count(&self) -> usize {
        self.inner.lock().region_count()
    }

    /// See [`Database::flush`].
    pub fn flush(&self) -> StoreResult<()> {
        self.inner.lock().flush()
    }

    /// Close the Database if this is the last handle, otherwise flush.
    pub fn close(self) -> StoreResult<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().close(),
            Err(shared) => shared.lock().flush(),
        }
    }
}
