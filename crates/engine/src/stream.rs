//! Append-only tensor stream: one growable, chunked dataset holding one row
//! per call.
//!
//! A stream is created lazily on its first write. That write freezes the
//! element type and per-row shape; the dataset is created with dims
//! `[0, shape...]`, max dims `[unlimited, shape...]` and chunk dims
//! `[1, shape...]`, and the scalar type id is stored in its `type`
//! attribute. Later writes must match the frozen layout.
//!
//! Every append extends dimension 0 and writes the new row in one commit,
//! so a row is either fully present and counted or absent.

use crate::layout::{dataset_path, TYPE_ATTR};
use approx_store_core::{
    describe_layout, ScalarType, StoreError, StoreResult, StreamSide, Tensor, TensorView,
};
use approx_store_durability::{
    chunk_byte_length, AttrTarget, AttributeValue, Container, DatasetId, Dataspace, GroupId,
    Hyperslab, Mutation, Writeset, MAX_CHUNK_BYTES, MAX_RANK,
};
use tracing::debug;

/// Frozen layout of an initialized stream.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StreamLayout {
    dataset: DatasetId,
    scalar_type: ScalarType,
    shape: Vec<u64>,
}

/// One side (`input` or `output`) of a region.
#[derive(Debug, Clone)]
pub struct TensorStream {
    group: GroupId,
    path: String,
    side: StreamSide,
    layout: Option<StreamLayout>,
    rows: u64,
}

impl TensorStream {
    /// Uninitialized stream under `group`.
    pub(crate) fn new(group: GroupId, group_name: &str, side: StreamSide) -> Self {
        TensorStream {
            group,
            path: dataset_path(group_name, side.dataset_name()),
            side,
            layout: None,
            rows: 0,
        }
    }

    /// Stream over whatever dataset the container already holds for `side`.
    pub(crate) fn attach(
        container: &Container,
        group: GroupId,
        group_name: &str,
        side: StreamSide,
    ) -> StoreResult<Self> {
        let mut stream = TensorStream::new(group, group_name, side);
        let Some(ds) = container.catalog().dataset_in(group, side.dataset_name()) else {
            return Ok(stream);
        };
        let type_id = ds
            .attribute(TYPE_ATTR)
            .and_then(AttributeValue::as_int)
            .ok_or_else(|| StoreError::Corruption(format!("{} has no type attribute", stream.path)))?;
        let scalar_type = ScalarType::from_id(type_id)?;
        if ds.dtype() != scalar_type.native_type() {
            return Err(StoreError::Corruption(format!(
                "{} stores {} but its type attribute says {}",
                stream.path,
                ds.dtype(),
                scalar_type
            )));
        }
        let dims = ds.space().dims();
        stream.rows = dims[0];
        stream.layout = Some(StreamLayout {
            dataset: ds.id(),
            scalar_type,
            shape: dims[1..].to_vec(),
        });
        Ok(stream)
    }

    /// Which side of the region this stream records.
    pub fn side(&self) -> StreamSide {
        self.side
    }

    /// Dataset name (`input` or `output`).
    pub fn name(&self) -> &'static str {
        self.side.dataset_name()
    }

    /// `group/dataset` path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the first write has happened.
    pub fn is_initialized(&self) -> bool {
        self.layout.is_some()
    }

    /// Element type, once initialized.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.layout.as_ref().map(|l| l.scalar_type)
    }

    /// Per-row shape, once initialized.
    pub fn shape(&self) -> Option<&[u64]> {
        self.layout.as_ref().map(|l| l.shape.as_slice())
    }

    /// Rows appended so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Create the dataset and its `type` attribute in one commit.
    ///
    /// Idempotent for the same layout; a different layout on an initialized
    /// stream is a [`StoreError::ShapeMismatch`].
    pub(crate) fn initialize(
        &mut self,
        container: &mut Container,
        shape: &[u64],
        scalar_type: ScalarType,
    ) -> StoreResult<()> {
        if let Some(layout) = &self.layout {
            return self.check_layout(layout, shape, scalar_type);
        }
        if shape.iter().any(|d| *d == 0) {
            return Err(StoreError::shape_mismatch(
                &self.path,
                "non-empty row shape",
                describe_layout(scalar_type, shape),
            ));
        }
        if shape.len() >= MAX_RANK {
            return Err(StoreError::shape_mismatch(
                &self.path,
                format!("row rank of at most {}", MAX_RANK - 1),
                format!("rank {}", shape.len()),
            ));
        }

        let dataset = container.catalog().next_dataset_id();
        let mut chunk_dims = Vec::with_capacity(shape.len() + 1);
        chunk_dims.push(1);
        chunk_dims.extend_from_slice(shape);
        if chunk_byte_length(scalar_type.native_type(), &chunk_dims).is_none() {
            return Err(StoreError::shape_mismatch(
                &self.path,
                format!("row of at most {} bytes", MAX_CHUNK_BYTES),
                describe_layout(scalar_type, shape),
            ));
        }

        let mut ws = Writeset::new();
        ws.push(Mutation::CreateDataset {
            id: dataset,
            group: self.group,
            name: self.name().to_string(),
            dtype: scalar_type.native_type(),
            space: Dataspace::growable_rows(shape),
            chunk_dims,
        });
        ws.push(Mutation::SetAttribute {
            target: AttrTarget::Dataset(dataset),
            name: TYPE_ATTR.to_string(),
            value: AttributeValue::Int(scalar_type.id()),
        });
        container.commit(ws)?;

        debug!(
            target: "approx_store::db",
            dataset = %self.path,
            layout = %describe_layout(scalar_type, shape),
            "Initialized stream"
        );
        self.layout = Some(StreamLayout {
            dataset,
            scalar_type,
            shape: shape.to_vec(),
        });
        Ok(())
    }

    fn check_layout(
        &self,
        layout: &StreamLayout,
        shape: &[u64],
        scalar_type: ScalarType,
    ) -> StoreResult<()> {
        if layout.scalar_type != scalar_type || layout.shape != shape {
            return Err(StoreError::shape_mismatch(
                &self.path,
                describe_layout(layout.scalar_type, &layout.shape),
                describe_layout(scalar_type, shape),
            ));
        }
        Ok(())
    }

    /// Append one row, initializing the stream on first use.
    ///
    /// Returns the index of the new row. Nothing changes on error.
    pub(crate) fn append(&mut self, container: &mut Container, tensor: TensorView<'_>) -> StoreResult<u64> {
        self.initialize(container, tensor.shape(), tensor.scalar_type())?;
        let dataset = match &self.layout {
            Some(layout) => layout.dataset,
            None => return Err(StoreError::NotFound(self.path.clone())),
        };

        let row = self.rows;
        let slab = Hyperslab::rows(row, 1, tensor.shape());
        let mut dims = Vec::with_capacity(tensor.shape().len() + 1);
        dims.push(row + 1);
        dims.extend_from_slice(tensor.shape());

        let mut ws = Writeset::new();
        ws.push(Mutation::SetExtent { dataset, dims });
        ws.extend(container.hyperslab_writes(dataset, &slab, tensor.as_bytes())?);
        container.commit(ws)?;

        self.rows += 1;
        Ok(row)
    }

    /// Read row `row` back as a tensor of the frozen layout.
    pub fn read_row(&self, container: &mut Container, row: u64) -> StoreResult<Tensor> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| StoreError::NotFound(self.path.clone()))?;
        if row >= self.rows {
            return Err(StoreError::RowOutOfRange {
                dataset: self.path.clone(),
                row,
                rows: self.rows,
            });
        }
        let bytes = container.read_hyperslab(layout.dataset, &Hyperslab::rows(row, 1, &layout.shape))?;
        Tensor::from_bytes(layout.scalar_type, layout.shape.clone(), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_store_durability::DurabilityMode;
    use tempfile::tempdir;

    fn container_with_group(path: &std::path::Path) -> (Container, GroupId) {
        let mut c = Container::create(path, DurabilityMode::Always).unwrap();
        let mut ws = Writeset::new();
        ws.push(Mutation::CreateGroup {
            id: GroupId(0),
            name: "loopA".into(),
        });
        c.commit(ws).unwrap();
        (c, GroupId(0))
    }

    #[test]
    fn test_first_append_initializes() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Input);
        assert!(!s.is_initialized());

        let t = Tensor::vector(&[1.0f64, 2.0]);
        assert_eq!(s.append(&mut c, t.view()).unwrap(), 0);

        assert!(s.is_initialized());
        assert_eq!(s.scalar_type(), Some(ScalarType::Float64));
        assert_eq!(s.shape(), Some(&[2u64][..]));
        assert_eq!(s.rows(), 1);

        let ds = c.catalog().dataset_in(g, "input").unwrap();
        assert_eq!(ds.space().dims(), &[1, 2]);
        assert_eq!(ds.chunk_dims(), &[1, 2]);
        assert_eq!(ds.attribute(TYPE_ATTR), Some(&AttributeValue::Int(0)));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Output);
        s.initialize(&mut c, &[3], ScalarType::Int32).unwrap();
        let seq = c.last_sequence();
        s.initialize(&mut c, &[3], ScalarType::Int32).unwrap();
        assert_eq!(c.last_sequence(), seq);
    }

    #[test]
    fn test_layout_frozen_after_first_write() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Input);
        s.append(&mut c, Tensor::vector(&[1.0f64, 2.0]).view()).unwrap();

        let wrong_shape = Tensor::vector(&[1.0f64, 2.0, 3.0]);
        assert!(matches!(
            s.append(&mut c, wrong_shape.view()),
            Err(StoreError::ShapeMismatch { .. })
        ));
        let wrong_type = Tensor::vector(&[1.0f32, 2.0]);
        assert!(matches!(
            s.append(&mut c, wrong_type.view()),
            Err(StoreError::ShapeMismatch { .. })
        ));
        assert_eq!(s.rows(), 1);
    }

    #[test]
    fn test_empty_shape_rejected() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Input);
        let empty = Tensor::vector::<f64>(&[]);
        assert!(matches!(
            s.append(&mut c, empty.view()),
            Err(StoreError::ShapeMismatch { .. })
        ));
        assert!(!s.is_initialized());
    }

    #[test]
    fn test_rank_beyond_file_format_rejected() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let seq = c.last_sequence();
        let mut s = TensorStream::new(g, "loopA", StreamSide::Input);

        for rank in [MAX_RANK, MAX_RANK + 1] {
            let err = s.initialize(&mut c, &vec![1; rank], ScalarType::Float64).unwrap_err();
            assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        }
        assert!(!s.is_initialized());
        assert_eq!(c.last_sequence(), seq);

        let widest = Tensor::from_slice(&[7.0f64], &vec![1; MAX_RANK - 1]).unwrap();
        s.append(&mut c, widest.view()).unwrap();
        assert_eq!(s.read_row(&mut c, 0).unwrap(), widest);
    }

    #[test]
    fn test_oversized_row_rejected() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Input);
        for shape in [vec![u64::MAX, 2], vec![1 << 20, 1 << 10]] {
            let err = s.initialize(&mut c, &shape, ScalarType::Float64).unwrap_err();
            assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        }
        assert!(!s.is_initialized());
    }

    #[test]
    fn test_read_rows_back() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Input);
        for i in 0..4 {
            let t = Tensor::from_slice(&[i as i16, -(i as i16), 7, 8], &[2, 2]).unwrap();
            s.append(&mut c, t.view()).unwrap();
        }
        let row = s.read_row(&mut c, 2).unwrap();
        assert_eq!(row.shape(), &[2, 2]);
        assert_eq!(row.to_vec::<i16>().unwrap(), vec![2, -2, 7, 8]);
        assert!(matches!(
            s.read_row(&mut c, 4),
            Err(StoreError::RowOutOfRange { row: 4, rows: 4, .. })
        ));
    }

    #[test]
    fn test_scalar_rows() {
        let dir = tempdir().unwrap();
        let (mut c, g) = container_with_group(&dir.path().join("s.apx"));
        let mut s = TensorStream::new(g, "loopA", StreamSide::Output);
        let t = Tensor::from_slice(&[42u8], &[]).unwrap();
        s.append(&mut c, t.view()).unwrap();
        s.append(&mut c, t.view()).unwrap();
        assert_eq!(s.shape(), Some(&[][..]));
        assert_eq!(s.read_row(&mut c, 1).unwrap().to_vec::<u8>().unwrap(), vec![42]);
    }

    #[test]
    fn test_attach_recovers_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.apx");
        {
            let (mut c, g) = container_with_group(&path);
            let mut s = TensorStream::new(g, "loopA", StreamSide::Input);
            s.append(&mut c, Tensor::vector(&[5i64, 6, 7]).view()).unwrap();
        }
        let mut c = Container::open_read_only(&path).unwrap();
        let s = TensorStream::attach(&c, GroupId(0), "loopA", StreamSide::Input).unwrap();
        assert_eq!(s.scalar_type(), Some(ScalarType::Int64));
        assert_eq!(s.rows(), 1);
        assert_eq!(s.read_row(&mut c, 0).unwrap().to_vec::<i64>().unwrap(), vec![5, 6, 7]);

        let out = TensorStream::attach(&c, GroupId(0), "loopA", StreamSide::Output).unwrap();
        assert!(!out.is_initialized());
    }
}
