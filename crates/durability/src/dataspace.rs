//! Dataspaces, chunk layout and hyperslab selections.
//!
//! A dataset's dataspace has a current extent (`dims`) and a maximum extent
//! (`max_dims`, where [`UNLIMITED`] marks a growable dimension). Data is
//! stored in fixed-shape chunks addressed by their chunk coordinate (the
//! chunk's index along each dimension). Reads and writes go through a
//! [`Hyperslab`]: a contiguous box `start .. start + count` in element
//! coordinates. Selections must be chunk-aligned so that every touched chunk
//! is replaced or read whole and no other chunk is ever rewritten.

use smallvec::SmallVec;
use std::fmt;

/// Maximum-extent marker for a growable dimension.
pub const UNLIMITED: u64 = u64::MAX;

/// Highest dataspace rank the on-disk format can describe.
pub const MAX_RANK: usize = u8::MAX as usize;

/// Chunk coordinate: index of a chunk along each dimension.
pub type ChunkCoord = SmallVec<[u64; 4]>;

/// Current and maximum extent of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    dims: Vec<u64>,
    max_dims: Vec<u64>,
}

impl Dataspace {
    /// Create a dataspace.
    ///
    /// Returns `None` if the ranks differ, the rank is zero or above
    /// [`MAX_RANK`], or any dimension exceeds its maximum.
    pub fn new(dims: Vec<u64>, max_dims: Vec<u64>) -> Option<Self> {
        if dims.is_empty() || dims.len() > MAX_RANK || dims.len() != max_dims.len() {
            return None;
        }
        if dims.iter().zip(&max_dims).any(|(d, m)| d > m) {
            return None;
        }
        Some(Dataspace { dims, max_dims })
    }

    /// Dataspace for row-appended data: `[0, row_shape...]`, dim 0 unlimited.
    pub fn growable_rows(row_shape: &[u64]) -> Self {
        let mut dims = Vec::with_capacity(row_shape.len() + 1);
        dims.push(0);
        dims.extend_from_slice(row_shape);
        let mut max_dims = dims.clone();
        max_dims[0] = UNLIMITED;
        Dataspace { dims, max_dims }
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Current extent.
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Maximum extent.
    pub fn max_dims(&self) -> &[u64] {
        &self.max_dims
    }

    /// Whether `dims` is a legal new extent: same rank, within the maximum,
    /// and never smaller than the current extent.
    pub fn can_extend_to(&self, dims: &[u64]) -> bool {
        dims.len() == self.dims.len()
            && dims
                .iter()
                .zip(self.dims.iter().zip(&self.max_dims))
                .all(|(new, (cur, max))| new >= cur && new <= max)
    }

    /// Set a new extent. Callers check [`can_extend_to`](Self::can_extend_to) first.
    pub(crate) fn set_dims(&mut self, dims: Vec<u64>) {
        self.dims = dims;
    }
}

/// Contiguous box selection in element coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    start: Vec<u64>,
    count: Vec<u64>,
}

impl Hyperslab {
    /// Select `count` elements from `start` along each dimension.
    pub fn new(start: Vec<u64>, count: Vec<u64>) -> Self {
        Hyperslab { start, count }
    }

    /// Select `rows` consecutive rows starting at `first`, each of `row_shape`.
    pub fn rows(first: u64, rows: u64, row_shape: &[u64]) -> Self {
        let mut start = vec![0; row_shape.len() + 1];
        start[0] = first;
        let mut count = Vec::with_capacity(row_shape.len() + 1);
        count.push(rows);
        count.extend_from_slice(row_shape);
        Hyperslab { start, count }
    }

    /// Selection origin.
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Selection size.
    pub fn count(&self) -> &[u64] {
        &self.count
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// Number of selected elements, or `None` if it overflows `u64`.
    pub fn num_elements(&self) -> Option<u64> {
        if self.count.contains(&0) {
            return Some(0);
        }
        self.count.iter().try_fold(1u64, |acc, &c| acc.checked_mul(c))
    }

    /// Whether the selection lies inside `dims`.
    pub fn is_within(&self, dims: &[u64]) -> bool {
        self.rank() == dims.len()
            && self
                .start
                .iter()
                .zip(&self.count)
                .zip(dims)
                .all(|((s, c), d)| s.checked_add(*c).map_or(false, |end| end <= *d))
    }

    /// Whether every selected chunk is covered whole.
    pub fn is_chunk_aligned(&self, chunk_dims: &[u64]) -> bool {
        self.rank() == chunk_dims.len()
            && self
                .start
                .iter()
                .zip(&self.count)
                .zip(chunk_dims)
                .all(|((s, c), k)| *k > 0 && s % k == 0 && c % k == 0)
    }

    /// Chunk coordinates covered by an aligned selection, in row-major order.
    pub fn chunk_coords(&self, chunk_dims: &[u64]) -> Vec<ChunkCoord> {
        let first: ChunkCoord = self
            .start
            .iter()
            .zip(chunk_dims)
            .map(|(s, k)| s / k)
            .collect();
        let spans: Vec<u64> = self
            .count
            .iter()
            .zip(chunk_dims)
            .map(|(c, k)| c / k)
            .collect();

        let mut coords = Vec::new();
        if spans.iter().any(|n| *n == 0) {
            return coords;
        }
        let mut offset = vec![0u64; spans.len()];
        loop {
            coords.push(first.iter().zip(&offset).map(|(f, o)| f + o).collect());
            if !advance(&mut offset, &spans) {
                return coords;
            }
        }
    }

    /// Visit each contiguous run of elements shared by the selection buffer
    /// and the chunk at `coord`.
    ///
    /// The callback receives `(chunk_offset, selection_offset, len)` in
    /// elements. Both buffers are row-major; runs follow the innermost
    /// dimension.
    pub fn for_each_run(
        &self,
        chunk_dims: &[u64],
        coord: &[u64],
        mut f: impl FnMut(usize, usize, usize),
    ) {
        let rank = chunk_dims.len();
        let run = chunk_dims[rank - 1] as usize;
        let outer = &chunk_dims[..rank - 1];

        // Position of the chunk origin inside the selection.
        let origin: Vec<u64> = coord
            .iter()
            .zip(chunk_dims)
            .zip(&self.start)
            .map(|((q, k), s)| q * k - s)
            .collect();

        let mut local = vec![0u64; rank - 1];
        loop {
            let mut chunk_off = 0u64;
            let mut sel_off = 0u64;
            for d in 0..rank {
                let p = if d < rank - 1 { local[d] } else { 0 };
                chunk_off = chunk_off * chunk_dims[d] + p;
                sel_off = sel_off * self.count[d] + origin[d] + p;
            }
            f(chunk_off as usize, sel_off as usize, run);

            if !advance(&mut local, outer) {
                return;
            }
        }
    }
}

/// Row-major odometer step. Returns false once every position was visited.
fn advance(pos: &mut [u64], limits: &[u64]) -> bool {
    for d in (0..pos.len()).rev() {
        pos[d] += 1;
        if pos[d] < limits[d] {
            return true;
        }
        pos[d] = 0;
    }
    false
}

impl fmt::Display for Hyperslab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "start={:?} count={:?}", self.start, self.count)
    }
}
