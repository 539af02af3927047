//! Container error type and its mapping onto [`StoreError`].

use crate::catalog::CatalogError;
use approx_store_core::StoreError;
use std::path::PathBuf;

/// Result alias for container operations.
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// Errors raised by the container file.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// File could not be created, opened, locked or recognised
    #[error("Cannot open container {path}: {reason}")]
    Open {
        /// Container path
        path: PathBuf,
        /// Cause
        reason: String,
    },

    /// I/O failure on an open container
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Committed record that cannot be applied
    #[error("Corrupt record at offset {offset}: {reason}")]
    Corrupt {
        /// File offset of the record
        offset: u64,
        /// Cause
        reason: String,
    },

    /// Mutation rejected by the catalog
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Selection outside the extent or not chunk-aligned
    #[error("Invalid selection on '{dataset}': {selection} against extent {extent:?}")]
    InvalidSelection {
        /// Dataset name
        dataset: String,
        /// Offending selection
        selection: String,
        /// Current extent
        extent: Vec<u64>,
    },

    /// Caller buffer does not match the selection
    #[error("Buffer size mismatch on '{dataset}': expected {expected} bytes, got {actual}")]
    BufferSize {
        /// Dataset name
        dataset: String,
        /// Bytes the selection covers
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Write attempted through a read-only handle
    #[error("Container opened read-only")]
    ReadOnly,

    /// Commit cannot be represented in the file format
    #[error("Commit too large: {0}")]
    Oversized(String),
}

impl ContainerError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ContainerError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ContainerError> for StoreError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::Open { path, reason } => StoreError::StorageOpen { path, reason },
            ContainerError::Corrupt { .. } => StoreError::Corruption(e.to_string()),
            ContainerError::InvalidSelection {
                dataset,
                selection,
                extent,
            } => StoreError::shape_mismatch(
                dataset,
                format!("selection within {:?}", extent),
                selection,
            ),
            ContainerError::BufferSize {
                dataset,
                expected,
                actual,
            } => StoreError::shape_mismatch(
                dataset,
                format!("{} bytes", expected),
                format!("{} bytes", actual),
            ),
            other => StoreError::storage_write(other),
        }
    }
}
