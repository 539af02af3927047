//! Database struct and open/close logic
//!
//! The Database owns one store file and the registry of regions recorded in
//! it during this process:
//!
//! - `instantiate_region` / `instantiate_tabular_region` create a region
//!   group and hand back a [`RegionHandle`], a bounds-checked index that
//!   stays valid until the Database is closed
//! - `write_tensor` appends to a tensor region, alternating input and output
//! - `write` appends feature rows to a tabular region
//! - `register_memory` records a named memory range
//!
//! Regions are never removed and handles are never reused. Opening an
//! existing file in append mode keeps its groups; new regions are created
//! next to them.

pub mod config;
mod shared;

pub use config::{OnExisting, StoreConfig, CONFIG_FILE_NAME};
pub use shared::SharedDatabase;

use crate::layout::{ADDRESS_ATTR, CHUNK_ROWS_ATTR, KIND_ATTR, NAME_ATTR};
use crate::memory::{MemoryEntry, MemoryRegistry};
use crate::region::{Region, RegionStore};
use crate::tabular::{TabularRegionView, VarInfo};
use approx_store_core::{
    RegionHandle, RegionKind, RegionState, ScalarType, StoreError, StoreResult, StreamSide,
    Tensor, TensorView,
};
use approx_store_durability::{
    AttrTarget, AttributeValue, Container, ContainerCounters, GroupId, Mutation, Writeset,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summary of one registered region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    /// Handle
    pub handle: RegionHandle,
    /// Storage layout
    pub kind: RegionKind,
    /// Name given at creation
    pub name: String,
    /// Group holding the region's datasets
    pub group: String,
    /// Source address
    pub address: u64,
}

/// Region store over one container file.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    container: Container,
    regions: Vec<Region>,
    memory: MemoryRegistry,
    config: StoreConfig,
}

impl Database {
    /// Open or create the store at `path` with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Open or create the store at `path`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a bad configuration. `StorageOpen` if the file
    /// cannot be created or opened, is held by another Database, or is not a
    /// store file. `Corruption` if a committed record cannot be applied.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let durability = config.durability_mode()?;
        let container = match config.on_existing()? {
            OnExisting::Append => Container::open_or_create(&path, durability)?,
            OnExisting::Truncate => Container::create(&path, durability)?,
        };

        info!(
            target: "approx_store::db",
            path = %path.display(),
            durability = durability.description(),
            existing_groups = container.catalog().groups().len(),
            "Opened store"
        );

        Ok(Database {
            path,
            container,
            regions: Vec::new(),
            memory: MemoryRegistry::new(),
            config,
        })
    }

    /// Create a tensor region.
    ///
    /// The region's group is named `name`, or `name.N` with the smallest
    /// free `N` when the name is taken. `chunk_rows_hint` is recorded on the
    /// group; streams always store one row per chunk.
    pub fn instantiate_region(
        &mut self,
        address: u64,
        name: &str,
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle> {
        let handle = self.next_handle()?;
        let group = self.container.catalog().next_group_id();
        let group_name = self.unique_group_name(name);

        let ws = Self::group_writeset(group, &group_name, name, RegionKind::Tensor, address, chunk_rows_hint);
        self.container.commit(ws)?;

        self.regions.push(Region::Tensor(RegionStore::new(
            handle,
            address,
            name,
            group,
            &group_name,
        )));
        info!(
            target: "approx_store::db",
            handle = %handle,
            group = %group_name,
            address = format_args!("{:#x}", address),
            "Created tensor region"
        );
        Ok(handle)
    }

    /// Create a tabular region whose rows hold the declared variables.
    pub fn instantiate_tabular_region(
        &mut self,
        address: u64,
        name: &str,
        inputs: &[VarInfo],
        outputs: &[VarInfo],
        chunk_rows_hint: u64,
    ) -> StoreResult<RegionHandle> {
        let handle = self.next_handle()?;
        let group = self.container.catalog().next_group_id();
        let group_name = self.unique_group_name(name);

        let (view, layout) = TabularRegionView::plan(
            &self.container,
            handle,
            address,
            name,
            group,
            &group_name,
            inputs,
            outputs,
        )?;
        let mut ws =
            Self::group_writeset(group, &group_name, name, RegionKind::Tabular, address, chunk_rows_hint);
        ws.extend(layout);
        self.container.commit(ws)?;

        info!(
            target: "approx_store::db",
            handle = %handle,
            group = %group_name,
            columns = view.num_cols(),
            "Created tabular region"
        );
        self.regions.push(Region::Tabular(view));
        Ok(handle)
    }

    fn next_handle(&self) -> StoreResult<RegionHandle> {
        u32::try_from(self.regions.len())
            .map(RegionHandle::new)
            .map_err(|_| StoreError::storage_write("region registry is full"))
    }

    fn unique_group_name(&self, name: &str) -> String {
        let catalog = self.container.catalog();
        if catalog.group_by_name(name).is_none() {
            return name.to_string();
        }
        let mut suffix = 1u64;
        loop {
            let candidate = format!("{}.{}", name, suffix);
            if catalog.group_by_name(&candidate).is_none() {
                warn!(
                    target: "approx_store::db",
                    name,
                    group = %candidate,
                    "Region name already in use, storing under a suffixed group"
                );
                return candidate;
            }
            suffix += 1;
        }
    }

    fn group_writeset(
        group: GroupId,
        group_name: &str,
        name: &str,
        kind: RegionKind,
        address: u64,
        chunk_rows_hint: u64,
    ) -> Writeset {
        let attr = |attr: &str, value: AttributeValue| Mutation::SetAttribute {
            target: AttrTarget::Group(group),
            name: attr.to_string(),
            value,
        };
        let mut ws = Writeset::new();
        ws.push(Mutation::CreateGroup {
            id: group,
            name: group_name.to_string(),
        });
        ws.push(attr(KIND_ATTR, AttributeValue::Text(kind.as_str().to_string())));
        ws.push(attr(NAME_ATTR, AttributeValue::Text(name.to_string())));
        ws.push(attr(ADDRESS_ATTR, AttributeValue::Int(address as i64)));
        ws.push(attr(CHUNK_ROWS_ATTR, AttributeValue::Int(chunk_rows_hint as i64)));
        ws
    }

    fn tensor_region_mut(&mut self, handle: RegionHandle) -> StoreResult<(&mut RegionStore, &mut Container)> {
        let len = self.regions.len();
        match self.regions.get_mut(handle.index()) {
            Some(Region::Tensor(region)) => Ok((region, &mut self.container)),
            Some(Region::Tabular(_)) => Err(StoreError::RegionKindMismatch {
                handle,
                expected: RegionKind::Tensor,
                actual: RegionKind::Tabular,
            }),
            None => Err(StoreError::InvalidHandle { handle, len }),
        }
    }

    /// Append `tensor` to the side the region expects next.
    ///
    /// Returns the new row's index within its stream.
    pub fn write_tensor<'a>(
        &mut self,
        handle: RegionHandle,
        tensor: impl Into<TensorView<'a>>,
    ) -> StoreResult<u64> {
        let (region, container) = self.tensor_region_mut(handle)?;
        region.write(container, tensor.into())
    }

    /// Append an input row. Fails unless the region awaits input.
    pub fn write_input<'a>(
        &mut self,
        handle: RegionHandle,
        tensor: impl Into<TensorView<'a>>,
    ) -> StoreResult<u64> {
        let (region, container) = self.tensor_region_mut(handle)?;
        region.write_input(container, tensor.into())
    }

    /// Append an output row. Fails unless the region awaits output.
    pub fn write_output<'a>(
        &mut self,
        handle: RegionHandle,
        tensor: impl Into<TensorView<'a>>,
    ) -> StoreResult<u64> {
        let (region, container) = self.tensor_region_mut(handle)?;
        region.write_output(container, tensor.into())
    }

    /// Append `num_rows` rows of `num_cols` values to a tabular region.
    ///
    /// Returns the index of the first new row.
    pub fn write(
        &mut self,
        handle: RegionHandle,
        buffer: &[f64],
        num_rows: u64,
        num_cols: u64,
    ) -> StoreResult<u64> {
        let len = self.regions.len();
        match self.regions.get_mut(handle.index()) {
            Some(Region::Tabular(view)) => view.write(&mut self.container, buffer, num_rows, num_cols),
            Some(Region::Tensor(_)) => Err(StoreError::RegionKindMismatch {
                handle,
                expected: RegionKind::Tabular,
                actual: RegionKind::Tensor,
            }),
            None => Err(StoreError::InvalidHandle { handle, len }),
        }
    }

    /// Record a named memory range.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` if `type_id` names no scalar type.
    pub fn register_memory(
        &mut self,
        group_name: &str,
        name: &str,
        address: u64,
        size_bytes: u64,
        type_id: i64,
    ) -> StoreResult<()> {
        let scalar_type = ScalarType::from_id(type_id)?;
        let replaced = self.memory.register(MemoryEntry {
            group: group_name.to_string(),
            name: name.to_string(),
            address,
            size_bytes,
            scalar_type,
        });
        debug!(
            target: "approx_store::db",
            group = group_name,
            name,
            size_bytes,
            scalar_type = %scalar_type,
            replaced = replaced.is_some(),
            "Registered memory"
        );
        Ok(())
    }

    /// Registered memory ranges.
    pub fn memory(&self) -> &MemoryRegistry {
        &self.memory
    }

    /// Number of regions created by this Database.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Region by handle.
    pub fn region(&self, handle: RegionHandle) -> StoreResult<&Region> {
        self.regions.get(handle.index()).ok_or(StoreError::InvalidHandle {
            handle,
            len: self.regions.len(),
        })
    }

    /// All regions in handle order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Summary of a region.
    pub fn region_info(&self, handle: RegionHandle) -> StoreResult<RegionInfo> {
        let region = self.region(handle)?;
        Ok(RegionInfo {
            handle,
            kind: region.kind(),
            name: region.name().to_string(),
            group: region.group_name().to_string(),
            address: region.address(),
        })
    }

    fn tensor_region(&self, handle: RegionHandle) -> StoreResult<&RegionStore> {
        match self.region(handle)? {
            Region::Tensor(region) => Ok(region),
            Region::Tabular(_) => Err(StoreError::RegionKindMismatch {
                handle,
                expected: RegionKind::Tensor,
                actual: RegionKind::Tabular,
            }),
        }
    }

    fn tabular_region(&self, handle: RegionHandle) -> StoreResult<&TabularRegionView> {
        match self.region(handle)? {
            Region::Tabular(view) => Ok(view),
            Region::Tensor(_) => Err(StoreError::RegionKindMismatch {
                handle,
                expected: RegionKind::Tabular,
                actual: RegionKind::Tensor,
            }),
        }
    }

    /// Input rows of a tensor region.
    pub fn input_rows(&self, handle: RegionHandle) -> StoreResult<u64> {
        Ok(self.tensor_region(handle)?.input().rows())
    }

    /// Output rows of a tensor region.
    pub fn output_rows(&self, handle: RegionHandle) -> StoreResult<u64> {
        Ok(self.tensor_region(handle)?.output().rows())
    }

    /// Rows of a tabular region.
    pub fn tabular_rows(&self, handle: RegionHandle) -> StoreResult<u64> {
        Ok(self.tabular_region(handle)?.rows())
    }

    /// Alternation state of a tensor region.
    pub fn region_state(&self, handle: RegionHandle) -> StoreResult<RegionState> {
        Ok(self.tensor_region(handle)?.state())
    }

    /// Read back row `row` of one side of a tensor region.
    pub fn read_row(&mut self, handle: RegionHandle, side: StreamSide, row: u64) -> StoreResult<Tensor> {
        let (region, container) = self.tensor_region_mut(handle)?;
        region.stream(side).read_row(container, row)
    }

    /// Read back row `row` of a tabular region.
    pub fn read_tabular_row(&mut self, handle: RegionHandle, row: u64) -> StoreResult<Vec<f64>> {
        let len = self.regions.len();
        match self.regions.get(handle.index()) {
            Some(Region::Tabular(view)) => view.read_row(&mut self.container, row),
            Some(Region::Tensor(_)) => Err(StoreError::RegionKindMismatch {
                handle,
                expected: RegionKind::Tabular,
                actual: RegionKind::Tensor,
            }),
            None => Err(StoreError::InvalidHandle { handle, len }),
        }
    }

    /// fsync every commit so far.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.container.flush().map_err(StoreError::from)
    }

    /// Store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Cumulative commit and sync counters.
    pub fn counters(&self) -> ContainerCounters {
        self.container.counters()
    }

    /// Flush and release the file, reporting flush errors.
    ///
    /// Dropping the Database also releases the file but can only log them.
    pub fn close(self) -> StoreResult<()> {
        let regions = self.regions.len();
        let path = self.path;
        self.container.close()?;
        info!(
            target: "approx_store::db",
            path = %path.display(),
            regions,
            "Closed store"
        );
        Ok(())
    }
}
