//! Core types for approx-store
//!
//! This crate defines the foundational types used throughout the system:
//! - ScalarType / NativeType: the closed element-type set and its storage mapping
//! - Tensor / TensorView: shape-checked element buffers
//! - RegionHandle, RegionState, StreamSide, RegionKind: registry and state-machine types
//! - StoreError: the error type every layer reports through

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod scalar;
pub mod tensor;
pub mod types;

pub use error::{describe_layout, StoreError, StoreResult};
pub use scalar::{NativeClass, NativeType, ScalarType};
pub use tensor::{byte_length, element_count, Element, Tensor, TensorView};
pub use types::{RegionHandle, RegionKind, RegionState, StreamSide};
