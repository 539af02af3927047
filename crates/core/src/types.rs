//! Identifier and state types shared by every layer
//!
//! - RegionHandle: opaque, process-lifetime index into the region registry
//! - StreamSide: which of a region's two streams a write targets
//! - RegionState: the input/output alternation state machine
//! - RegionKind: tensor region vs tabular region

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a region in a database's registry.
///
/// Handles are assigned in creation order, never reused and never
/// invalidated while the database is open. The wrapped index is only
/// meaningful to the registry that issued it; every lookup is bounds-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionHandle(u32);

impl RegionHandle {
    /// Wrap a registry index.
    pub fn new(index: u32) -> Self {
        RegionHandle(index)
    }

    /// Registry index this handle refers to.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the two streams owned by a tensor region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamSide {
    /// Values entering the region
    Input,
    /// Values produced by the region
    Output,
}

impl StreamSide {
    /// Dataset name used for this side inside the region group.
    pub fn dataset_name(self) -> &'static str {
        match self {
            StreamSide::Input => "input",
            StreamSide::Output => "output",
        }
    }
}

impl fmt::Display for StreamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dataset_name())
    }
}

/// Alternation state of a tensor region.
///
/// Starts in `AwaitingInput`; every successful write flips it. There is no
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionState {
    /// Next legal write is an input
    #[default]
    AwaitingInput,
    /// Next legal write is an output
    AwaitingOutput,
}

impl RegionState {
    /// Side the next write must target.
    pub fn expected_side(self) -> StreamSide {
        match self {
            RegionState::AwaitingInput => StreamSide::Input,
            RegionState::AwaitingOutput => StreamSide::Output,
        }
    }

    /// State after a successful write in this state.
    pub fn next(self) -> RegionState {
        match self {
            RegionState::AwaitingInput => RegionState::AwaitingOutput,
            RegionState::AwaitingOutput => RegionState::AwaitingInput,
        }
    }
}

/// Storage layout of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// Two typed tensor streams (`input`, `output`)
    Tensor,
    /// One 2-D `f64` feature matrix (`data`)
    Tabular,
}

impl RegionKind {
    /// Persisted name (value of the region group's `kind` attribute).
    pub fn as_str(self) -> &'static str {
        match self {
            RegionKind::Tensor => "tensor",
            RegionKind::Tabular => "tabular",
        }
    }

    /// Parse a persisted kind name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tensor" => Some(RegionKind::Tensor),
            "tabular" => Some(RegionKind::Tabular),
            _ => None,
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
