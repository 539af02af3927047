//! Read-only access to a written store file.
//!
//! The file describes itself: each region group carries its kind, source
//! address and requested name, and each dataset its scalar type. A reader
//! rebuilds the region list from those attributes alone.

use crate::layout::{ADDRESS_ATTR, CHUNK_ROWS_ATTR, KIND_ATTR, NAME_ATTR, TYPE_ATTR};
use crate::region::{Region, RegionStore};
use crate::tabular::TabularRegionView;
use approx_store_core::{
    RegionHandle, RegionKind, ScalarType, StoreError, StoreResult, StreamSide, Tensor,
};
use approx_store_durability::{AttributeValue, Container, Group};
use std::path::Path;
use tracing::info;

/// Read-only view of a store file.
#[derive(Debug)]
pub struct StoreReader {
    container: Container,
    regions: Vec<Region>,
}

impl StoreReader {
    /// Open `path` and rebuild its region list.
    ///
    /// Takes no lock; sees the commits complete at the time of opening.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let container = Container::open_read_only(path.as_ref())?;
        let mut regions = Vec::with_capacity(container.catalog().groups().len());
        for (index, group) in container.catalog().groups().iter().enumerate() {
            let handle = RegionHandle::new(index as u32);
            regions.push(load_region(&container, handle, group)?);
        }
        info!(
            target: "approx_store::db",
            path = %path.as_ref().display(),
            regions = regions.len(),
            "Opened store for reading"
        );
        Ok(StoreReader { container, regions })
    }

    /// All regions in creation order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Group names in creation order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(Region::group_name)
    }

    /// Region stored under `group`.
    pub fn region(&self, group: &str) -> StoreResult<&Region> {
        self.regions
            .iter()
            .find(|r| r.group_name() == group)
            .ok_or_else(|| StoreError::NotFound(format!("region group '{}'", group)))
    }

    fn tensor_region(&self, group: &str) -> StoreResult<&RegionStore> {
        let region = self.region(group)?;
        region.as_tensor().ok_or(StoreError::RegionKindMismatch {
            handle: region.handle(),
            expected: RegionKind::Tensor,
            actual: region.kind(),
        })
    }

    fn tabular_region(&self, group: &str) -> StoreResult<&TabularRegionView> {
        let region = self.region(group)?;
        region.as_tabular().ok_or(StoreError::RegionKindMismatch {
            handle: region.handle(),
            expected: RegionKind::Tabular,
            actual: region.kind(),
        })
    }

    /// Row count of one side of a tensor region.
    pub fn rows(&self, group: &str, side: StreamSide) -> StoreResult<u64> {
        Ok(self.tensor_region(group)?.stream(side).rows())
    }

    /// Scalar type of one side, read from the dataset's `type` attribute.
    pub fn scalar_type(&self, group: &str, side: StreamSide) -> StoreResult<ScalarType> {
        let stream = self.tensor_region(group)?.stream(side);
        stream
            .scalar_type()
            .ok_or_else(|| StoreError::NotFound(stream.path().to_string()))
    }

    /// Per-row shape of one side.
    pub fn shape(&self, group: &str, side: StreamSide) -> StoreResult<Vec<u64>> {
        let stream = self.tensor_region(group)?.stream(side);
        stream
            .shape()
            .map(<[u64]>::to_vec)
            .ok_or_else(|| StoreError::NotFound(stream.path().to_string()))
    }

    /// Read row `row` of one side of a tensor region.
    pub fn read_row(&mut self, group: &str, side: StreamSide, row: u64) -> StoreResult<Tensor> {
        let stream = self.tensor_region(group)?.stream(side).clone();
        stream.read_row(&mut self.container, row)
    }

    /// Rows of a tabular region.
    pub fn tabular_rows(&self, group: &str) -> StoreResult<u64> {
        Ok(self.tabular_region(group)?.rows())
    }

    /// Read row `row` of a tabular region.
    pub fn read_tabular_row(&mut self, group: &str, row: u64) -> StoreResult<Vec<f64>> {
        let view = self.tabular_region(group)?.clone();
        view.read_row(&mut self.container, row)
    }

    /// Chunk row hint recorded when the region was created.
    pub fn chunk_rows_hint(&self, group: &str) -> StoreResult<u64> {
        let region = self.region(group)?;
        self.container
            .catalog()
            .group_by_name(region.group_name())
            .and_then(|g| g.attribute(CHUNK_ROWS_ATTR))
            .and_then(AttributeValue::as_int)
            .map(|v| v as u64)
            .ok_or_else(|| StoreError::NotFound(format!("{} attribute of '{}'", CHUNK_ROWS_ATTR, group)))
    }

    /// Raw `type` attribute of a dataset in `group`.
    pub fn type_attribute(&self, group: &str, dataset: &str) -> StoreResult<i64> {
        let catalog = self.container.catalog();
        let g = catalog
            .group_by_name(group)
            .ok_or_else(|| StoreError::NotFound(format!("region group '{}'", group)))?;
        catalog
            .dataset_in(g.id(), dataset)
            .and_then(|ds| ds.attribute(TYPE_ATTR))
            .and_then(AttributeValue::as_int)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{} type attribute", group, dataset)))
    }

    /// File identity fixed at creation.
    pub fn file_uuid(&self) -> [u8; 16] {
        self.container.file_uuid()
    }
}

fn load_region(container: &Container, handle: RegionHandle, group: &Group) -> StoreResult<Region> {
    let text = |attr: &str| group.attribute(attr).and_then(AttributeValue::as_text);
    let kind = text(KIND_ATTR)
        .and_then(RegionKind::parse)
        .ok_or_else(|| StoreError::Corruption(format!("group '{}' has no region kind", group.name())))?;
    let name = text(NAME_ATTR).unwrap_or(group.name());
    let address = group
        .attribute(ADDRESS_ATTR)
        .and_then(AttributeValue::as_int)
        .unwrap_or(0) as u64;

    Ok(match kind {
        RegionKind::Tensor => Region::Tensor(RegionStore::attach(
            container,
            handle,
            address,
            name,
            group.id(),
            group.name(),
        )?),
        RegionKind::Tabular => Region::Tabular(TabularRegionView::attach(
            container, handle, address, name, group,
        )?),
    })
}
