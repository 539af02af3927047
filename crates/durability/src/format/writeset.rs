//! Writeset serialization.
//!
//! A writeset is the ordered list of catalog mutations carried by one commit
//! record.
//!
//! # Layout
//!
//! ```text
//! count(u32) + count × mutation
//!
//! mutation = tag(u8) + body
//!   1 CreateGroup    id(u32) name(str)
//!   2 CreateDataset  id(u32) group(u32) name(str) dtype(u8) rank(u8)
//!                    dims(rank×u64) max_dims(rank×u64) chunk(rank×u64)
//!   3 SetAttribute   target_kind(u8) target_id(u32) name(str) value
//!   4 SetExtent      dataset(u32) rank(u8) dims(rank×u64)
//!   5 WriteChunk     dataset(u32) rank(u8) coord(rank×u64) len(u32) data
//!
//! str   = len(u32) + utf8 bytes
//! value = tag(u8) + (i64 | count(u32) + count×i64 | str)
//! ```
//!
//! All integers little-endian.

use crate::attribute::AttributeValue;
use crate::catalog::{AttrTarget, DatasetId, GroupId};
use crate::dataspace::{ChunkCoord, Dataspace};
use approx_store_core::NativeType;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

const TAG_CREATE_GROUP: u8 = 1;
const TAG_CREATE_DATASET: u8 = 2;
const TAG_SET_ATTRIBUTE: u8 = 3;
const TAG_SET_EXTENT: u8 = 4;
const TAG_WRITE_CHUNK: u8 = 5;

const TARGET_GROUP: u8 = 0;
const TARGET_DATASET: u8 = 1;

/// One catalog mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create a top-level group
    CreateGroup {
        /// New group id (must be the next free id)
        id: GroupId,
        /// Group name, unique at top level
        name: String,
    },
    /// Create a chunked dataset inside a group
    CreateDataset {
        /// New dataset id (must be the next free id)
        id: DatasetId,
        /// Owning group
        group: GroupId,
        /// Dataset name, unique within the group
        name: String,
        /// Element storage primitive
        dtype: NativeType,
        /// Initial and maximum extent
        space: Dataspace,
        /// Chunk shape
        chunk_dims: Vec<u64>,
    },
    /// Create or replace an attribute
    SetAttribute {
        /// Group or dataset
        target: AttrTarget,
        /// Attribute name
        name: String,
        /// Attribute value
        value: AttributeValue,
    },
    /// Grow a dataset's extent
    SetExtent {
        /// Dataset to grow
        dataset: DatasetId,
        /// New extent
        dims: Vec<u64>,
    },
    /// Store one whole chunk
    WriteChunk {
        /// Target dataset
        dataset: DatasetId,
        /// Chunk coordinate
        coord: ChunkCoord,
        /// Chunk bytes, row-major little-endian
        data: Vec<u8>,
    },
}

/// Ordered batch of mutations committed atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Writeset {
    mutations: Vec<Mutation>,
}

impl Writeset {
    /// Create an empty writeset.
    pub fn new() -> Self {
        Writeset::default()
    }

    /// Append a mutation.
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Append several mutations.
    pub fn extend(&mut self, mutations: impl IntoIterator<Item = Mutation>) {
        self.mutations.extend(mutations);
    }

    /// Mutations in commit order.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Number of mutations.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Whether the writeset holds no mutations.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Serialize.
    ///
    /// Returns the bytes and, for each `WriteChunk` in order, the offset of
    /// its chunk data within those bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WritesetError::TooLarge`] if a rank, count or length does
    /// not fit its on-disk field.
    pub fn encode(&self) -> Result<(Vec<u8>, Vec<usize>), WritesetError> {
        let mut buf = Vec::new();
        let mut chunk_offsets = Vec::new();
        put_u32(&mut buf, narrow("mutation count", self.mutations.len())?);

        for mutation in &self.mutations {
            match mutation {
                Mutation::CreateGroup { id, name } => {
                    buf.push(TAG_CREATE_GROUP);
                    put_u32(&mut buf, id.0);
                    put_str(&mut buf, name)?;
                }
                Mutation::CreateDataset {
                    id,
                    group,
                    name,
                    dtype,
                    space,
                    chunk_dims,
                } => {
                    buf.push(TAG_CREATE_DATASET);
                    put_u32(&mut buf, id.0);
                    put_u32(&mut buf, group.0);
                    put_str(&mut buf, name)?;
                    buf.push(dtype.to_tag());
                    buf.push(rank_byte(space.rank())?);
                    if chunk_dims.len() != space.rank() {
                        return Err(WritesetError::InvalidDataspace);
                    }
                    put_dims(&mut buf, space.dims());
                    put_dims(&mut buf, space.max_dims());
                    put_dims(&mut buf, chunk_dims);
                }
                Mutation::SetAttribute {
                    target,
                    name,
                    value,
                } => {
                    buf.push(TAG_SET_ATTRIBUTE);
                    match target {
                        AttrTarget::Group(id) => {
                            buf.push(TARGET_GROUP);
                            put_u32(&mut buf, id.0);
                        }
                        AttrTarget::Dataset(id) => {
                            buf.push(TARGET_DATASET);
                            put_u32(&mut buf, id.0);
                        }
                    }
                    put_str(&mut buf, name)?;
                    put_value(&mut buf, value)?;
                }
                Mutation::SetExtent { dataset, dims } => {
                    buf.push(TAG_SET_EXTENT);
                    put_u32(&mut buf, dataset.0);
                    buf.push(rank_byte(dims.len())?);
                    put_dims(&mut buf, dims);
                }
                Mutation::WriteChunk {
                    dataset,
                    coord,
                    data,
                } => {
                    buf.push(TAG_WRITE_CHUNK);
                    put_u32(&mut buf, dataset.0);
                    buf.push(rank_byte(coord.len())?);
                    put_dims(&mut buf, coord);
                    put_u32(&mut buf, narrow("chunk length", data.len())?);
                    chunk_offsets.push(buf.len());
                    buf.extend_from_slice(data);
                }
            }
        }

        Ok((buf, chunk_offsets))
    }

    /// Deserialize.
    ///
    /// Returns the writeset and the chunk data offsets, as [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<(Self, Vec<usize>), WritesetError> {
        let mut cur = Cursor::new(bytes);
        let count = get_u32(&mut cur)?;
        let mut mutations = Vec::with_capacity(count.min(1024) as usize);
        let mut chunk_offsets = Vec::new();

        for _ in 0..count {
            let tag = get_u8(&mut cur)?;
            let mutation = match tag {
                TAG_CREATE_GROUP => Mutation::CreateGroup {
                    id: GroupId(get_u32(&mut cur)?),
                    name: get_str(&mut cur)?,
                },
                TAG_CREATE_DATASET => {
                    let id = DatasetId(get_u32(&mut cur)?);
                    let group = GroupId(get_u32(&mut cur)?);
                    let name = get_str(&mut cur)?;
                    let dtype_tag = get_u8(&mut cur)?;
                    let dtype = NativeType::from_tag(dtype_tag)
                        .ok_or(WritesetError::InvalidNativeType(dtype_tag))?;
                    let rank = get_u8(&mut cur)? as usize;
                    let dims = get_dims(&mut cur, rank)?;
                    let max_dims = get_dims(&mut cur, rank)?;
                    let chunk_dims = get_dims(&mut cur, rank)?;
                    let space =
                        Dataspace::new(dims, max_dims).ok_or(WritesetError::InvalidDataspace)?;
                    Mutation::CreateDataset {
                        id,
                        group,
                        name,
                        dtype,
                        space,
                        chunk_dims,
                    }
                }
                TAG_SET_ATTRIBUTE => {
                    let target = match get_u8(&mut cur)? {
                        TARGET_GROUP => AttrTarget::Group(GroupId(get_u32(&mut cur)?)),
                        TARGET_DATASET => AttrTarget::Dataset(DatasetId(get_u32(&mut cur)?)),
                        other => return Err(WritesetError::UnknownTarget(other)),
                    };
                    Mutation::SetAttribute {
                        target,
                        name: get_str(&mut cur)?,
                        value: get_value(&mut cur)?,
                    }
                }
                TAG_SET_EXTENT => {
                    let dataset = DatasetId(get_u32(&mut cur)?);
                    let rank = get_u8(&mut cur)? as usize;
                    Mutation::SetExtent {
                        dataset,
                        dims: get_dims(&mut cur, rank)?,
                    }
                }
                TAG_WRITE_CHUNK => {
                    let dataset = DatasetId(get_u32(&mut cur)?);
                    let rank = get_u8(&mut cur)? as usize;
                    let coord: ChunkCoord = get_dims(&mut cur, rank)?.into_iter().collect();
                    let len = get_u32(&mut cur)? as usize;
                    chunk_offsets.push(cur.position() as usize);
                    Mutation::WriteChunk {
                        dataset,
                        coord,
                        data: get_bytes(&mut cur, len)?,
                    }
                }
                other => return Err(WritesetError::UnknownMutation(other)),
            };
            mutations.push(mutation);
        }

        if (cur.position() as usize) != bytes.len() {
            return Err(WritesetError::TrailingBytes);
        }

        Ok((Writeset { mutations }, chunk_offsets))
    }
}

impl IntoIterator for Writeset {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

/// Writeset encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WritesetError {
    /// Ran out of bytes mid-mutation
    #[error("Writeset truncated")]
    Truncated,

    /// Unknown mutation tag
    #[error("Unknown mutation tag: {0}")]
    UnknownMutation(u8),

    /// Unknown attribute target kind
    #[error("Unknown attribute target kind: {0}")]
    UnknownTarget(u8),

    /// Unknown attribute value tag
    #[error("Unknown attribute value tag: {0}")]
    UnknownValue(u8),

    /// Storage primitive tag names no primitive
    #[error("Invalid native type tag: {0:#04x}")]
    InvalidNativeType(u8),

    /// Dims and max dims disagree
    #[error("Invalid dataspace")]
    InvalidDataspace,

    /// Name is not UTF-8
    #[error("Invalid UTF-8 in name")]
    InvalidUtf8,

    /// Bytes left over after the last mutation
    #[error("Trailing bytes after writeset")]
    TrailingBytes,

    /// Value too large for its on-disk field
    #[error("{field} of {len} does not fit the writeset format")]
    TooLarge {
        /// Field being encoded
        field: &'static str,
        /// Offending value
        len: usize,
    },
}

fn narrow(field: &'static str, len: usize) -> Result<u32, WritesetError> {
    u32::try_from(len).map_err(|_| WritesetError::TooLarge { field, len })
}

fn rank_byte(len: usize) -> Result<u8, WritesetError> {
    u8::try_from(len).map_err(|_| WritesetError::TooLarge { field: "rank", len })
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    // Writes into a Vec cannot fail.
    let _ = buf.write_u32::<LittleEndian>(v);
}

fn put_dims(buf: &mut Vec<u8>, dims: &[u64]) {
    for d in dims {
        let _ = buf.write_u64::<LittleEndian>(*d);
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<(), WritesetError> {
    put_u32(buf, narrow("string length", s.len())?);
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn put_value(buf: &mut Vec<u8>, value: &AttributeValue) -> Result<(), WritesetError> {
    buf.push(value.tag());
    match value {
        AttributeValue::Int(v) => {
            let _ = buf.write_i64::<LittleEndian>(*v);
        }
        AttributeValue::IntList(vs) => {
            put_u32(buf, narrow("list length", vs.len())?);
            for v in vs {
                let _ = buf.write_i64::<LittleEndian>(*v);
            }
        }
        AttributeValue::Text(s) => put_str(buf, s)?,
    }
    Ok(())
}

fn get_u8(cur: &mut Cursor<&[u8]>) -> Result<u8, WritesetError> {
    cur.read_u8().map_err(|_| WritesetError::Truncated)
}

fn get_u32(cur: &mut Cursor<&[u8]>) -> Result<u32, WritesetError> {
    cur.read_u32::<LittleEndian>()
        .map_err(|_| WritesetError::Truncated)
}

fn get_dims(cur: &mut Cursor<&[u8]>, rank: usize) -> Result<Vec<u64>, WritesetError> {
    (0..rank)
        .map(|_| {
            cur.read_u64::<LittleEndian>()
                .map_err(|_| WritesetError::Truncated)
        })
        .collect()
}

fn get_bytes(cur: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>, WritesetError> {
    let remaining = cur.get_ref().len() - cur.position() as usize;
    if len > remaining {
        return Err(WritesetError::Truncated);
    }
    let mut data = vec![0u8; len];
    cur.read_exact(&mut data)
        .map_err(|_| WritesetError::Truncated)?;
    Ok(data)
}

fn get_str(cur: &mut Cursor<&[u8]>) -> Result<String, WritesetError> {
    let len = get_u32(cur)? as usize;
    String::from_utf8(get_bytes(cur, len)?).map_err(|_| WritesetError::InvalidUtf8)
}

fn get_value(cur: &mut Cursor<&[u8]>) -> Result<AttributeValue, WritesetError> {
    match get_u8(cur)? {
        1 => cur
            .read_i64::<LittleEndian>()
            .map(AttributeValue::Int)
            .map_err(|_| WritesetError::Truncated),
        2 => {
            let n = get_u32(cur)? as usize;
            let values = (0..n)
                .map(|_| {
                    cur.read_i64::<LittleEndian>()
                        .map_err(|_| WritesetError::Truncated)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttributeValue::IntList(values))
        }
        3 => Ok(AttributeValue::Text(get_str(cur)?)),
        other => Err(WritesetError::UnknownValue(other)),
    }
}
