//! Storage interface consumed by the directive layer.
//!
//! The directive layer only ever creates regions, writes rows and registers
//! memory. [`Database`] is the implementation over a store file;
//! [`SharedDatabase`] is the same behind a lock.

use crate::database::{Database, SharedDatabase};
use approx_store_core::{RegionHandle, StoreResult, TensorView};

/// Region storage backend.
pub trait RegionBackend {
    /// Create a tensor region and return its handle.
    fn instantiate_region(
        &mut self,
        address: u64,
        name: &str,
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle>;

    /// Append a tensor to the side the region expects next.
    fn write_tensor(&mut self, handle: RegionHandle, tensor: TensorView<'_>) -> StoreResult<()>;

    /// Append rows to a tabular region.
    fn write(
        &mut self,
        handle: RegionHandle,
        buffer: &[f64],
        num_rows: u64,
        num_cols: u64,
    ) -> StoreResult<()>;

    /// Record a named memory range.
    fn register_memory(
        &mut self,
        group_name: &str,
        name: &str,
        address: u64,
        size_bytes: u64,
        type_id: i64,
    ) -> StoreResult<()>;
}

impl RegionBackend for Database {
    fn instantiate_region(
        &mut self,
        address: u64,
        name: &str,
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle> {
        Database::instantiate_region(self, address, name, chunk_rows_hint)
    }

    fn write_tensor(&mut self, handle: RegionHandle, tensor: TensorView<'_>) -> StoreResult<()> {
        Database::write_tensor(self, handle, tensor).map(|_| ())
    }

    fn write(
        &mut self,
        handle: RegionHandle,
        buffer: &[f64],
        num_rows: u64,
        num_cols: u64,
    ) -> StoreResult<()> {
        Database::write(self, handle, buffer, num_rows, num_cols).map(|_| ())
    }

    fn register_memory(
        &mut self,
        group_name: &str,
        name: &str,
        address: u64,
        size_bytes: u64,
        type_id: i64,
    ) -> StoreResult<()> {
        Database::register_memory(self, group_name, name, address, size_bytes, type_id)
    }
}

impl RegionBackend for SharedDatabase {
    fn instantiate_region(
        &mut self,
        address: u64,
        name: &str,
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle> {
        SharedDatabase::instantiate_region(self, address, name, chunk_rows_hint)
    }

    fn write_tensor(&mut self, handle: RegionHandle, tensor: TensorView<'_>) -> StoreResult<()> {
        SharedDatabase::write_tensor(self, handle, tensor).map(|_| ())
    }

    fn write(
        &mut self,
        handle: RegionHandle,
        buffer: &[f64],
        num_rows: u64,
        num_cols: u64,
    ) -> StoreResult<()> {
        SharedDatabase::write(self, handle, buffer, num_rows, num_cols).map(|_| ())
    }

    fn register_memory(
        &mut self,
        group_name: &str,
        name: &str,
        address: u64,
        size_bytes: u64,
        type_id: i64,
    ) -> StoreResult<()> {
        SharedDatabase::register_memory(self, group_name, name, address, size_bytes, type_id)
    }
}
