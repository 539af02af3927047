//! Tensor region: an `input` and an `output` stream written in strict
//! alternation, starting with input.

use crate::stream::TensorStream;
use crate::tabular::TabularRegionView;
use approx_store_core::{
    RegionHandle, RegionKind, RegionState, StoreError, StoreResult, StreamSide, TensorView,
};
use approx_store_durability::{Container, GroupId};

/// Entry of the region registry.
#[derive(Debug, Clone)]
pub enum Region {
    /// Alternating input/output streams
    Tensor(RegionStore),
    /// Fixed-width feature rows
    Tabular(TabularRegionView),
}

impl Region {
    /// Storage layout.
    pub fn kind(&self) -> RegionKind {
        match self {
            Region::Tensor(_) => RegionKind::Tensor,
            Region::Tabular(_) => RegionKind::Tabular,
        }
    }

    /// Handle in the owning registry.
    pub fn handle(&self) -> RegionHandle {
        match self {
            Region::Tensor(r) => r.handle(),
            Region::Tabular(r) => r.handle(),
        }
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        match self {
            Region::Tensor(r) => r.name(),
            Region::Tabular(r) => r.name(),
        }
    }

    /// Group holding the region's datasets.
    pub fn group_name(&self) -> &str {
        match self {
            Region::Tensor(r) => r.group_name(),
            Region::Tabular(r) => r.group_name(),
        }
    }

    /// Source address given at creation.
    pub fn address(&self) -> u64 {
        match self {
            Region::Tensor(r) => r.address(),
            Region::Tabular(r) => r.address(),
        }
    }

    /// The tensor region, if this is one.
    pub fn as_tensor(&self) -> Option<&RegionStore> {
        match self {
            Region::Tensor(r) => Some(r),
            Region::Tabular(_) => None,
        }
    }

    /// The tabular region, if this is one.
    pub fn as_tabular(&self) -> Option<&TabularRegionView> {
        match self {
            Region::Tabular(r) => Some(r),
            Region::Tensor(_) => None,
        }
    }
}

/// One tensor region.
#[derive(Debug, Clone)]
pub struct RegionStore {
    handle: RegionHandle,
    address: u64,
    name: String,
    group_name: String,
    state: RegionState,
    input: TensorStream,
    output: TensorStream,
}

impl RegionStore {
    pub(crate) fn new(
        handle: RegionHandle,
        address: u64,
        name: &str,
        group: GroupId,
        group_name: &str,
    ) -> Self {
        RegionStore {
            handle,
            address,
            name: name.to_string(),
            group_name: group_name.to_string(),
            state: RegionState::AwaitingInput,
            input: TensorStream::new(group, group_name, StreamSide::Input),
            output: TensorStream::new(group, group_name, StreamSide::Output),
        }
    }

    /// Region over streams already in the container.
    ///
    /// The state resumes from the row counts: a region with more inputs
    /// than outputs awaits an output.
    pub(crate) fn attach(
        container: &Container,
        handle: RegionHandle,
        address: u64,
        name: &str,
        group: GroupId,
        group_name: &str,
    ) -> StoreResult<Self> {
        let input = TensorStream::attach(container, group, group_name, StreamSide::Input)?;
        let output = TensorStream::attach(container, group, group_name, StreamSide::Output)?;
        let state = if input.rows() > output.rows() {
            RegionState::AwaitingOutput
        } else {
            RegionState::AwaitingInput
        };
        Ok(RegionStore {
            handle,
            address,
            name: name.to_string(),
            group_name: group_name.to_string(),
            state,
            input,
            output,
        })
    }

    /// Handle in the owning database.
    pub fn handle(&self) -> RegionHandle {
        self.handle
    }

    /// Source address given at creation.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group holding the streams. Differs from [`name`](Self::name) when
    /// the name was already taken.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Which side the next write must target.
    pub fn state(&self) -> RegionState {
        self.state
    }

    /// Input stream.
    pub fn input(&self) -> &TensorStream {
        &self.input
    }

    /// Output stream.
    pub fn output(&self) -> &TensorStream {
        &self.output
    }

    /// Stream for `side`.
    pub fn stream(&self, side: StreamSide) -> &TensorStream {
        match side {
            StreamSide::Input => &self.input,
            StreamSide::Output => &self.output,
        }
    }

    /// Append an input row. Legal only while awaiting input.
    pub fn write_input(&mut self, container: &mut Container, tensor: TensorView<'_>) -> StoreResult<u64> {
        self.write_side(container, StreamSide::Input, tensor)
    }

    /// Append an output row. Legal only while awaiting output.
    pub fn write_output(&mut self, container: &mut Container, tensor: TensorView<'_>) -> StoreResult<u64> {
        self.write_side(container, StreamSide::Output, tensor)
    }

    /// Append to whichever side the state expects.
    pub fn write(&mut self, container: &mut Container, tensor: TensorView<'_>) -> StoreResult<u64> {
        let side = self.state.expected_side();
        self.write_side(container, side, tensor)
    }

    fn write_side(
        &mut self,
        container: &mut Container,
        side: StreamSide,
        tensor: TensorView<'_>,
    ) -> StoreResult<u64> {
        let expected = self.state.expected_side();
        if side != expected {
            return Err(StoreError::AlternationViolation {
                region: self.group_name.clone(),
                expected,
                attempted: side,
            });
        }
        let stream = match side {
            StreamSide::Input => &mut self.input,
            StreamSide::Output => &mut self.output,
        };
        let row = stream.append(container, tensor)?;
        self.state = self.state.next();
        Ok(row)
    }
}
