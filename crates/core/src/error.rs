//! Error types for the region store
//!
//! Every failure is returned to the immediate caller as a [`StoreError`].
//! Nothing in the store retries, and nothing terminates the process: the
//! directive layer decides whether to abort or keep running without
//! recording. We use `thiserror` for the `Display` and `Error` impls.

use crate::scalar::ScalarType;
use crate::types::{RegionHandle, RegionKind, StreamSide};
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the region store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Handle does not name a region in the registry
    #[error("Invalid region handle {handle}: registry holds {len} regions")]
    InvalidHandle {
        /// Offending handle
        handle: RegionHandle,
        /// Registry size at the time of the call
        len: usize,
    },

    /// Write issued out of input/output turn
    #[error("Alternation violation in region '{region}': expected {expected} write, got {attempted}")]
    AlternationViolation {
        /// Region name
        region: String,
        /// Side the region was waiting for
        expected: StreamSide,
        /// Side the caller tried to write
        attempted: StreamSide,
    },

    /// Scalar type identifier outside the supported set
    #[error("Unsupported scalar type id: {0}")]
    UnsupportedType(i64),

    /// Payload shape or element type disagrees with the frozen layout
    #[error("Shape mismatch on '{dataset}': expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Dataset (or payload) being checked
        dataset: String,
        /// Frozen shape/type
        expected: String,
        /// Offered shape/type
        actual: String,
    },

    /// Backing file could not be created or opened
    #[error("Failed to open store at {path}: {reason}")]
    StorageOpen {
        /// Backing file path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Backend I/O failure while writing
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// Operation targets the other region layout
    #[error("Region {handle} is a {actual} region, operation requires a {expected} region")]
    RegionKindMismatch {
        /// Region handle
        handle: RegionHandle,
        /// Layout the operation needs
        expected: RegionKind,
        /// Layout the region has
        actual: RegionKind,
    },

    /// Row index beyond the stream's row count
    #[error("Row {row} out of range for '{dataset}' ({rows} rows)")]
    RowOutOfRange {
        /// Dataset name
        dataset: String,
        /// Requested row
        row: u64,
        /// Current row count
        rows: u64,
    },

    /// Persisted data failed validation
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Named region, dataset or attribute does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration could not be read or parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Build a shape mismatch from any displayable layouts.
    pub fn shape_mismatch(
        dataset: impl Into<String>,
        expected: impl Display,
        actual: impl Display,
    ) -> Self {
        StoreError::ShapeMismatch {
            dataset: dataset.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Build a storage write error from any displayable cause.
    pub fn storage_write(cause: impl Display) -> Self {
        StoreError::StorageWrite(cause.to_string())
    }

    /// Build a storage open error.
    pub fn storage_open(path: impl Into<PathBuf>, reason: impl Display) -> Self {
        StoreError::StorageOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Render a row layout as `f64[2, 3]` for error messages and logs.
pub fn describe_layout(scalar_type: ScalarType, shape: &[u64]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("{}[{}]", scalar_type, dims.join(", "))
}
