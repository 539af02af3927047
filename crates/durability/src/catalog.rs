//! In-memory catalog of a container file.
//!
//! The catalog is rebuilt on open by replaying every commit record and is
//! kept current by applying each new commit. It holds the group and dataset
//! hierarchy, attributes, extents, and the chunk index that maps every
//! written chunk to its byte range in the file. Chunk bytes themselves are
//! never held in memory.
//!
//! Mutations are applied with an undo log so a commit whose record fails to
//! reach the file can be rolled back, leaving the catalog exactly as before.

use crate::attribute::AttributeValue;
use crate::dataspace::{ChunkCoord, Dataspace};
use crate::format::Mutation;
use approx_store_core::NativeType;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a top-level group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

/// Identifier of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(pub u32);

/// Object an attribute is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrTarget {
    /// A group
    Group(GroupId),
    /// A dataset
    Dataset(DatasetId),
}

/// Byte range of a stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Absolute file offset of the first chunk byte
    pub offset: u64,
    /// Chunk length in bytes
    pub len: u32,
}

/// Largest chunk a dataset may declare, so one chunk always fits a commit record.
pub const MAX_CHUNK_BYTES: u64 = 1 << 30;

/// Bytes per chunk of `dtype` elements in `chunk_dims`, if within [`MAX_CHUNK_BYTES`].
pub fn chunk_byte_length(dtype: NativeType, chunk_dims: &[u64]) -> Option<usize> {
    let bytes = chunk_dims
        .iter()
        .try_fold(dtype.size() as u64, |acc, &k| acc.checked_mul(k))?;
    if bytes > MAX_CHUNK_BYTES {
        return None;
    }
    usize::try_from(bytes).ok()
}

/// Top-level group.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    name: String,
    attributes: BTreeMap<String, AttributeValue>,
    datasets: BTreeMap<String, DatasetId>,
}

impl Group {
    /// Group id.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// All attributes, sorted by name.
    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Dataset id by name.
    pub fn dataset(&self, name: &str) -> Option<DatasetId> {
        self.datasets.get(name).copied()
    }

    /// Dataset names in this group, sorted.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }
}

/// Chunked dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    id: DatasetId,
    group: GroupId,
    name: String,
    dtype: NativeType,
    space: Dataspace,
    chunk_dims: Vec<u64>,
    chunk_bytes: usize,
    attributes: BTreeMap<String, AttributeValue>,
    chunks: FxHashMap<ChunkCoord, ChunkLocation>,
}

impl Dataset {
    /// Dataset id.
    pub fn id(&self) -> DatasetId {
        self.id
    }

    /// Owning group.
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element storage primitive.
    pub fn dtype(&self) -> NativeType {
        self.dtype
    }

    /// Current and maximum extent.
    pub fn space(&self) -> &Dataspace {
        &self.space
    }

    /// Chunk shape.
    pub fn chunk_dims(&self) -> &[u64] {
        &self.chunk_dims
    }

    /// Bytes per chunk.
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Location of a written chunk.
    pub fn chunk(&self, coord: &[u64]) -> Option<ChunkLocation> {
        self.chunks.get(coord).copied()
    }

    /// Number of written chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Reverse of one applied mutation.
#[derive(Debug)]
pub(crate) enum Undo {
    PopGroup,
    PopDataset,
    Attribute {
        target: AttrTarget,
        name: String,
        previous: Option<AttributeValue>,
    },
    Extent {
        dataset: DatasetId,
        previous: Vec<u64>,
    },
    Chunk {
        dataset: DatasetId,
        coord: ChunkCoord,
        previous: Option<ChunkLocation>,
    },
}

/// Group and dataset hierarchy of one container file.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<Group>,
    groups_by_name: BTreeMap<String, GroupId>,
    datasets: Vec<Dataset>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Id the next created group must use.
    pub fn next_group_id(&self) -> GroupId {
        GroupId(self.groups.len() as u32)
    }

    /// Id the next created dataset must use.
    pub fn next_dataset_id(&self) -> DatasetId {
        DatasetId(self.datasets.len() as u32)
    }

    /// Group by id.
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0 as usize)
    }

    /// Group by name.
    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups_by_name.get(name).and_then(|id| self.group(*id))
    }

    /// All groups in creation order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Dataset by id.
    pub fn dataset(&self, id: DatasetId) -> Option<&Dataset> {
        self.datasets.get(id.0 as usize)
    }

    /// Dataset by group and name.
    pub fn dataset_in(&self, group: GroupId, name: &str) -> Option<&Dataset> {
        self.group(group)
            .and_then(|g| g.dataset(name))
            .and_then(|id| self.dataset(id))
    }

    /// Apply one mutation.
    ///
    /// `chunk_offset` is the absolute file offset of the chunk data and is
    /// required for `WriteChunk`. On success returns the undo entry.
    pub(crate) fn apply(
        &mut self,
        mutation: &Mutation,
        chunk_offset: Option<u64>,
    ) -> Result<Undo, CatalogError> {
        match mutation {
            Mutation::CreateGroup { id, name } => {
                if *id != self.next_group_id() {
                    return Err(CatalogError::IdOutOfOrder {
                        expected: self.next_group_id().0,
                        actual: id.0,
                    });
                }
                if self.groups_by_name.contains_key(name) {
                    return Err(CatalogError::DuplicateName(name.clone()));
                }
                self.groups_by_name.insert(name.clone(), *id);
                self.groups.push(Group {
                    id: *id,
                    name: name.clone(),
                    attributes: BTreeMap::new(),
                    datasets: BTreeMap::new(),
                });
                Ok(Undo::PopGroup)
            }
            Mutation::CreateDataset {
                id,
                group,
                name,
                dtype,
                space,
                chunk_dims,
            } => {
                if *id != self.next_dataset_id() {
                    return Err(CatalogError::IdOutOfOrder {
                        expected: self.next_dataset_id().0,
                        actual: id.0,
                    });
                }
                if chunk_dims.len() != space.rank() || chunk_dims.iter().any(|k| *k == 0) {
                    return Err(CatalogError::InvalidChunk(chunk_dims.clone()));
                }
                let chunk_bytes = chunk_byte_length(*dtype, chunk_dims)
                    .ok_or_else(|| CatalogError::InvalidChunk(chunk_dims.clone()))?;
                let owner = self
                    .groups
                    .get_mut(group.0 as usize)
                    .ok_or(CatalogError::UnknownGroup(*group))?;
                if owner.datasets.contains_key(name) {
                    return Err(CatalogError::DuplicateName(format!("{}/{}", owner.name, name)));
                }
                owner.datasets.insert(name.clone(), *id);
                self.datasets.push(Dataset {
                    id: *id,
                    group: *group,
                    name: name.clone(),
                    dtype: *dtype,
                    space: space.clone(),
                    chunk_dims: chunk_dims.clone(),
                    chunk_bytes,
                    attributes: BTreeMap::new(),
                    chunks: FxHashMap::default(),
                });
                Ok(Undo::PopDataset)
            }
            Mutation::SetAttribute {
                target,
                name,
                value,
            } => {
                let attributes = self.attributes_mut(*target)?;
                let previous = attributes.insert(name.clone(), value.clone());
                Ok(Undo::Attribute {
                    target: *target,
                    name: name.clone(),
                    previous,
                })
            }
            Mutation::SetExtent { dataset, dims } => {
                let ds = self.dataset_mut(*dataset)?;
                if !ds.space.can_extend_to(dims) {
                    return Err(CatalogError::InvalidExtent {
                        dataset: ds.name.clone(),
                        current: ds.space.dims().to_vec(),
                        requested: dims.clone(),
                    });
                }
                let previous = ds.space.dims().to_vec();
                ds.space.set_dims(dims.clone());
                Ok(Undo::Extent {
                    dataset: *dataset,
                    previous,
                })
            }
            Mutation::WriteChunk {
                dataset,
                coord,
                data,
            } => {
                let offset = chunk_offset.ok_or(CatalogError::MissingChunkOffset)?;
                let ds = self.dataset_mut(*dataset)?;
                let inside = coord.len() == ds.chunk_dims.len()
                    && coord
                        .iter()
                        .zip(&ds.chunk_dims)
                        .zip(ds.space.dims())
                        .all(|((q, k), d)| q.checked_mul(*k).map_or(false, |s| s < *d));
                if !inside {
                    return Err(CatalogError::ChunkOutOfBounds {
                        dataset: ds.name.clone(),
                        coord: coord.to_vec(),
                    });
                }
                if data.len() != ds.chunk_bytes() {
                    return Err(CatalogError::ChunkSize {
                        dataset: ds.name.clone(),
                        expected: ds.chunk_bytes(),
                        actual: data.len(),
                    });
                }
                let len = u32::try_from(data.len()).map_err(|_| CatalogError::ChunkSize {
                    dataset: ds.name.clone(),
                    expected: ds.chunk_bytes,
                    actual: data.len(),
                })?;
                let previous = ds.chunks.insert(coord.clone(), ChunkLocation { offset, len });
                Ok(Undo::Chunk {
                    dataset: *dataset,
                    coord: coord.clone(),
                    previous,
                })
            }
        }
    }

    /// Revert applied mutations, most recent first.
    pub(crate) fn rollback(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::PopGroup => {
                    if let Some(group) = self.groups.pop() {
                        self.groups_by_name.remove(&group.name);
                    }
                }
                Undo::PopDataset => {
                    if let Some(ds) = self.datasets.pop() {
                        if let Some(group) = self.groups.get_mut(ds.group.0 as usize) {
                            group.datasets.remove(&ds.name);
                        }
                    }
                }
                Undo::Attribute {
                    target,
                    name,
                    previous,
                } => {
                    if let Ok(attributes) = self.attributes_mut(target) {
                        match previous {
                            Some(value) => {
                                attributes.insert(name, value);
                            }
                            None => {
                                attributes.remove(&name);
                            }
                        }
                    }
                }
                Undo::Extent { dataset, previous } => {
                    if let Ok(ds) = self.dataset_mut(dataset) {
                        ds.space.set_dims(previous);
                    }
                }
                Undo::Chunk {
                    dataset,
                    coord,
                    previous,
                } => {
                    if let Ok(ds) = self.dataset_mut(dataset) {
                        match previous {
                            Some(loc) => {
                                ds.chunks.insert(coord, loc);
                            }
                            None => {
                                ds.chunks.remove(&coord);
                            }
                        }
                    }
                }
            }
        }
    }

    fn dataset_mut(&mut self, id: DatasetId) -> Result<&mut Dataset, CatalogError> {
        self.datasets
            .get_mut(id.0 as usize)
            .ok_or(CatalogError::UnknownDataset(id))
    }

    fn attributes_mut(
        &mut self,
        target: AttrTarget,
    ) -> Result<&mut BTreeMap<String, AttributeValue>, CatalogError> {
        match target {
            AttrTarget::Group(id) => self
                .groups
                .get_mut(id.0 as usize)
                .map(|g| &mut g.attributes)
                .ok_or(CatalogError::UnknownGroup(id)),
            AttrTarget::Dataset(id) => self.dataset_mut(id).map(|d| &mut d.attributes),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dataset#{}", self.0)
    }
}

/// Catalog mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Created id is not the next free id
    #[error("Id out of order: expected {expected}, got {actual}")]
    IdOutOfOrder {
        /// Next free id
        expected: u32,
        /// Id in the mutation
        actual: u32,
    },

    /// Name already taken
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// No such group
    #[error("Unknown {0}")]
    UnknownGroup(GroupId),

    /// No such dataset
    #[error("Unknown {0}")]
    UnknownDataset(DatasetId),

    /// Chunk shape is malformed or larger than [`MAX_CHUNK_BYTES`]
    #[error("Invalid chunk shape: {0:?}")]
    InvalidChunk(Vec<u64>),

    /// Extent change shrinks, exceeds the maximum, or changes rank
    #[error("Invalid extent for '{dataset}': {current:?} -> {requested:?}")]
    InvalidExtent {
        /// Dataset name
        dataset: String,
        /// Extent before the change
        current: Vec<u64>,
        /// Requested extent
        requested: Vec<u64>,
    },

    /// Chunk lies outside the current extent
    #[error("Chunk {coord:?} outside extent of '{dataset}'")]
    ChunkOutOfBounds {
        /// Dataset name
        dataset: String,
        /// Chunk coordinate
        coord: Vec<u64>,
    },

    /// Chunk data has the wrong size
    #[error("Chunk size mismatch for '{dataset}': expected {expected} bytes, got {actual}")]
    ChunkSize {
        /// Dataset name
        dataset: String,
        /// Bytes per chunk
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// WriteChunk applied without a file offset
    #[error("Chunk write without file offset")]
    MissingChunkOffset,
}
