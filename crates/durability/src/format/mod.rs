//! On-disk byte formats of the container file.
//!
//! Serialization lives here, apart from the code that decides when things
//! are written, so the format can evolve on its own.
//!
//! # Module Structure
//!
//! - `header`: fixed 32-byte file header
//! - `record`: CRC-framed commit record
//! - `writeset`: mutation list carried by each record

pub mod header;
pub mod record;
pub mod writeset;

pub use header::{FileHeader, CONTAINER_FORMAT_VERSION, CONTAINER_MAGIC, FILE_HEADER_SIZE};
pub use record::{
    CommitRecord, RecordError, MAX_WRITESET_LEN, RECORD_FORMAT_VERSION, RECORD_WRITESET_OFFSET,
};
pub use writeset::{Mutation, Writeset, WritesetError};
