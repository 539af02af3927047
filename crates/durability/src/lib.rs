//! Durability layer for approx-store
//!
//! This crate owns everything that touches disk:
//!
//! - Container: one file holding groups, chunked datasets and attributes
//! - Commit log: CRC-framed records, each applied all-or-nothing
//! - Catalog: the in-memory index rebuilt by replaying the log
//! - Dataspaces and hyperslab selections over chunked layouts
//! - Durability modes: Always, Standard (default)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod catalog;
pub mod container;
pub mod dataspace;
pub mod error;
pub mod format;
pub mod mode;

pub use attribute::AttributeValue;
pub use catalog::{
    chunk_byte_length, AttrTarget, Catalog, CatalogError, ChunkLocation, Dataset, DatasetId,
    Group, GroupId, MAX_CHUNK_BYTES,
};
pub use container::{Container, ContainerCounters, ReplayStats};
pub use dataspace::{ChunkCoord, Dataspace, Hyperslab, MAX_RANK, UNLIMITED};
pub use error::{ContainerError, ContainerResult};
pub use format::{Mutation, Writeset, WritesetError};
pub use mode::DurabilityMode;
