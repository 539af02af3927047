//! approx-store - Persistent per-region tensor store
//!
//! Records the inputs and outputs of annotated code regions of a running
//! program so they can later train approximate replacements. Each region
//! owns a group in a single store file; its `input` and `output` datasets
//! grow by one row per write, in strict input/output alternation.
//!
//! # Quick Start
//!
//! ```ignore
//! use approx_store::{Database, StoreReader, StreamSide, Tensor};
//!
//! let mut db = Database::open("trace.apx")?;
//! let region = db.instantiate_region(0x4005d0, "loop", 64)?;
//! db.write_tensor(region, &Tensor::vector(&[1.0f64, 2.0]))?; // input
//! db.write_tensor(region, &Tensor::vector(&[3.0f64]))?;      // output
//! db.close()?;
//!
//! let mut reader = StoreReader::open("trace.apx")?;
//! let x = reader.read_row("loop", StreamSide::Input, 0)?;
//! ```
//!
//! # Architecture
//!
//! - `approx-store-core`: scalar types, tensors, region state, errors
//! - `approx-store-durability`: the container file, its commit records and catalog
//! - `approx-store-engine`: regions, streams, the database and the reader

pub use approx_store_core::{
    byte_length, describe_layout, element_count, Element, NativeClass, NativeType, RegionHandle,
    RegionKind, RegionState, ScalarType, StoreError, StoreResult, StreamSide, Tensor, TensorView,
};
pub use approx_store_durability::{
    AttributeValue, Container, ContainerCounters, ContainerError, DurabilityMode, ReplayStats,
};
pub use approx_store_engine::{
    Database, MemoryEntry, MemoryRegistry, OnExisting, Region, RegionBackend, RegionInfo,
    RegionStore, SharedDatabase, StoreConfig, StoreReader, TabularRegionView, TensorStream,
    VarInfo, CONFIG_FILE_NAME, MAX_WRITE_BYTES,
};
