//! Tabular region: fixed-width `f64` feature rows in one 2-D dataset.
//!
//! The column count is the total element count of the declared input and
//! output variables. The variable layout is stored on the region group so a
//! reader can split each row back into variables.

use crate::layout::{
    dataset_path, INPUT_ELEMENTS_ATTR, INPUT_TYPES_ATTR, OUTPUT_ELEMENTS_ATTR, OUTPUT_TYPES_ATTR,
    TABULAR_DATASET, TYPE_ATTR,
};
use approx_store_core::{Element, RegionHandle, ScalarType, StoreError, StoreResult};
use approx_store_durability::{
    chunk_byte_length, AttrTarget, AttributeValue, Container, DatasetId, Dataspace, Group,
    GroupId, Hyperslab, Mutation, Writeset, MAX_CHUNK_BYTES,
};

/// Largest amount of row data one tabular write may carry.
///
/// A write of this size still fits one commit record with one-column rows.
pub const MAX_WRITE_BYTES: u64 = 512 << 20;

/// Declared variable of a tabular region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInfo {
    /// Element type of the variable in the traced program
    pub scalar_type: ScalarType,
    /// Number of elements the variable contributes to each row
    pub num_elements: u64,
}

impl VarInfo {
    /// Create a variable description.
    pub fn new(scalar_type: ScalarType, num_elements: u64) -> Self {
        VarInfo {
            scalar_type,
            num_elements,
        }
    }
}

fn total_elements(vars: &[VarInfo]) -> Option<u64> {
    vars.iter().try_fold(0u64, |acc, v| acc.checked_add(v.num_elements))
}

fn column_count(inputs: &[VarInfo], outputs: &[VarInfo]) -> Option<u64> {
    total_elements(inputs)?.checked_add(total_elements(outputs)?)
}

fn layout_attrs(types_attr: &str, elements_attr: &str, vars: &[VarInfo], group: GroupId) -> [Mutation; 2] {
    [
        Mutation::SetAttribute {
            target: AttrTarget::Group(group),
            name: types_attr.to_string(),
            value: AttributeValue::IntList(vars.iter().map(|v| v.scalar_type.id()).collect()),
        },
        Mutation::SetAttribute {
            target: AttrTarget::Group(group),
            name: elements_attr.to_string(),
            value: AttributeValue::IntList(vars.iter().map(|v| v.num_elements as i64).collect()),
        },
    ]
}

fn read_layout(group: &Group, types_attr: &str, elements_attr: &str) -> StoreResult<Vec<VarInfo>> {
    let missing = |attr: &str| StoreError::Corruption(format!("{} lacks {}", group.name(), attr));
    let types = group
        .attribute(types_attr)
        .and_then(AttributeValue::as_int_list)
        .ok_or_else(|| missing(types_attr))?;
    let elements = group
        .attribute(elements_attr)
        .and_then(AttributeValue::as_int_list)
        .ok_or_else(|| missing(elements_attr))?;
    if types.len() != elements.len() {
        return Err(StoreError::Corruption(format!(
            "{}: {} has {} entries, {} has {}",
            group.name(),
            types_attr,
            types.len(),
            elements_attr,
            elements.len()
        )));
    }
    types
        .iter()
        .zip(elements)
        .map(|(t, n)| ScalarType::from_id(*t).map(|ty| VarInfo::new(ty, *n as u64)))
        .collect()
}

/// One tabular region.
#[derive(Debug, Clone)]
pub struct TabularRegionView {
    handle: RegionHandle,
    address: u64,
    name: String,
    group_name: String,
    path: String,
    dataset: DatasetId,
    inputs: Vec<VarInfo>,
    outputs: Vec<VarInfo>,
    num_cols: u64,
    rows: u64,
}

impl TabularRegionView {
    /// Mutations creating the `data` dataset and the layout attributes under
    /// `group`, plus the view that will track them once committed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn plan(
        container: &Container,
        handle: RegionHandle,
        address: u64,
        name: &str,
        group: GroupId,
        group_name: &str,
        inputs: &[VarInfo],
        outputs: &[VarInfo],
    ) -> StoreResult<(Self, Vec<Mutation>)> {
        let path = dataset_path(group_name, TABULAR_DATASET);
        let num_cols = column_count(inputs, outputs).unwrap_or(u64::MAX);
        if num_cols == 0 {
            return Err(StoreError::shape_mismatch(&path, "at least one column", "0 columns"));
        }
        if chunk_byte_length(ScalarType::Float64.native_type(), &[1, num_cols]).is_none() {
            return Err(StoreError::shape_mismatch(
                &path,
                format!("rows of at most {} bytes", MAX_CHUNK_BYTES),
                format!("{} columns", num_cols),
            ));
        }

        let dataset = container.catalog().next_dataset_id();
        let mut mutations = vec![
            Mutation::CreateDataset {
                id: dataset,
                group,
                name: TABULAR_DATASET.to_string(),
                dtype: ScalarType::Float64.native_type(),
                space: Dataspace::growable_rows(&[num_cols]),
                chunk_dims: vec![1, num_cols],
            },
            Mutation::SetAttribute {
                target: AttrTarget::Dataset(dataset),
                name: TYPE_ATTR.to_string(),
                value: AttributeValue::Int(ScalarType::Float64.id()),
            },
        ];
        mutations.extend(layout_attrs(INPUT_TYPES_ATTR, INPUT_ELEMENTS_ATTR, inputs, group));
        mutations.extend(layout_attrs(OUTPUT_TYPES_ATTR, OUTPUT_ELEMENTS_ATTR, outputs, group));

        let view = TabularRegionView {
            handle,
            address,
            name: name.to_string(),
            group_name: group_name.to_string(),
            path,
            dataset,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            num_cols,
            rows: 0,
        };
        Ok((view, mutations))
    }

    /// View over a tabular region already in the container.
    pub(crate) fn attach(
        container: &Container,
        handle: RegionHandle,
        address: u64,
        name: &str,
        group: &Group,
    ) -> StoreResult<Self> {
        let path = dataset_path(group.name(), TABULAR_DATASET);
        let ds = container
            .catalog()
            .dataset_in(group.id(), TABULAR_DATASET)
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        let inputs = read_layout(group, INPUT_TYPES_ATTR, INPUT_ELEMENTS_ATTR)?;
        let outputs = read_layout(group, OUTPUT_TYPES_ATTR, OUTPUT_ELEMENTS_ATTR)?;
        let dims = ds.space().dims();
        let num_cols = column_count(&inputs, &outputs)
            .ok_or_else(|| StoreError::Corruption(format!("{} layout overflows", path)))?;
        if dims.len() != 2 || dims[1] != num_cols {
            return Err(StoreError::Corruption(format!(
                "{} has extent {:?}, layout declares {} columns",
                path, dims, num_cols
            )));
        }
        Ok(TabularRegionView {
            handle,
            address,
            name: name.to_string(),
            group_name: group.name().to_string(),
            path,
            dataset: ds.id(),
            inputs,
            outputs,
            num_cols,
            rows: dims[0],
        })
    }

    /// Handle in the owning database.
    pub fn handle(&self) -> RegionHandle {
        self.handle
    }

    /// Source address given at creation.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group holding the dataset.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// `group/data` path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared input variables.
    pub fn inputs(&self) -> &[VarInfo] {
        &self.inputs
    }

    /// Declared output variables.
    pub fn outputs(&self) -> &[VarInfo] {
        &self.outputs
    }

    /// Row width.
    pub fn num_cols(&self) -> u64 {
        self.num_cols
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Append `num_rows` rows of `num_cols` values in one commit.
    ///
    /// Returns the index of the first new row. A batch of more than
    /// [`MAX_WRITE_BYTES`] is refused with [`StoreError::StorageWrite`].
    pub fn write(
        &mut self,
        container: &mut Container,
        buffer: &[f64],
        num_rows: u64,
        num_cols: u64,
    ) -> StoreResult<u64> {
        if num_cols != self.num_cols {
            return Err(StoreError::shape_mismatch(
                &self.path,
                format!("{} columns", self.num_cols),
                format!("{} columns", num_cols),
            ));
        }
        let batch_bytes = num_rows
            .checked_mul(num_cols)
            .and_then(|n| n.checked_mul(ScalarType::Float64.size_in_bytes() as u64));
        let expected = match batch_bytes {
            Some(bytes) if bytes <= MAX_WRITE_BYTES => num_rows * num_cols,
            _ => {
                return Err(StoreError::storage_write(format!(
                    "{}: write of {} rows x {} columns exceeds {} bytes",
                    self.path, num_rows, num_cols, MAX_WRITE_BYTES
                )))
            }
        };
        if buffer.len() as u64 != expected {
            return Err(StoreError::shape_mismatch(
                &self.path,
                format!("{} values ({} rows x {} columns)", expected, num_rows, num_cols),
                format!("{} values", buffer.len()),
            ));
        }
        let first = self.rows;
        if num_rows == 0 {
            return Ok(first);
        }

        let mut bytes = vec![0u8; buffer.len() * ScalarType::Float64.size_in_bytes()];
        f64::encode(buffer, &mut bytes);

        let mut ws = Writeset::new();
        ws.push(Mutation::SetExtent {
            dataset: self.dataset,
            dims: vec![first + num_rows, num_cols],
        });
        ws.extend(container.hyperslab_writes(
            self.dataset,
            &Hyperslab::rows(first, num_rows, &[num_cols]),
            &bytes,
        )?);
        container.commit(ws)?;

        self.rows += num_rows;
        Ok(first)
    }

    /// Read row `row` back.
    pub fn read_row(&self, container: &mut Container, row: u64) -> StoreResult<Vec<f64>> {
        if row >= self.rows {
            return Err(StoreError::RowOutOfRange {
                dataset: self.path.clone(),
                row,
                rows: self.rows,
            });
        }
        let bytes = container.read_hyperslab(self.dataset, &Hyperslab::rows(row, 1, &[self.num_cols]))?;
        let mut values = vec![0f64; self.num_cols as usize];
        f64::decode(&bytes, &mut values);
        Ok(values)
    }
}
