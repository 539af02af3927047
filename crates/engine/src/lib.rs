//! Region store engine for approx-store
//!
//! This crate builds the region model on top of the container:
//! - Database: region registry, alternation state machine, memory registry
//! - SharedDatabase: the same behind a lock for multi-threaded callers
//! - RegionBackend: the interface the directive layer drives
//! - StoreReader: read-only access to a written store
//!
//! All bytes go through `approx-store-durability`; this crate only decides
//! which groups, datasets and attributes a region maps to.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod database;
pub mod layout;
pub mod memory;
pub mod reader;
pub mod region;
pub mod stream;
pub mod tabular;

pub use backend::RegionBackend;
pub use database::{
    Database, OnExisting, RegionInfo, SharedDatabase, StoreConfig, CONFIG_FILE_NAME,
};
pub use memory::{MemoryEntry, MemoryRegistry};
pub use reader::StoreReader;
pub use region::{Region, RegionStore};
pub use stream::TensorStream;
pub use tabular::{TabularRegionView, VarInfo, MAX_WRITE_BYTES};
