//! Container file: a single file holding groups, chunked datasets and
//! attributes.
//!
//! The file starts with a [`FileHeader`] followed by a log of
//! [`CommitRecord`]s. Every record carries one [`Writeset`]; opening the
//! file replays all records into a [`Catalog`] that indexes where each chunk
//! lives. A commit is appended as one CRC-protected record, so a crash can
//! only ever lose whole commits from the tail. A torn tail is discarded when
//! the file is next opened for writing.
//!
//! # Locking
//!
//! Writable handles hold an exclusive `fs2` lock on the file for their whole
//! lifetime. Read-only handles take no lock and see the commits that were
//! complete when they opened the file.

use crate::catalog::{Catalog, DatasetId, Undo};
use crate::dataspace::Hyperslab;
use crate::error::{ContainerError, ContainerResult};
use crate::format::{
    CommitRecord, FileHeader, Mutation, RecordError, Writeset, FILE_HEADER_SIZE,
    RECORD_WRITESET_OFFSET,
};
use crate::mode::DurabilityMode;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Cumulative container counters.
///
/// These accumulate over the lifetime of the handle and are never reset.
#[derive(Debug, Clone, Default)]
pub struct ContainerCounters {
    /// Records appended
    pub commits: u64,
    /// Chunks written
    pub chunks_written: u64,
    /// Bytes appended to the file
    pub bytes_written: u64,
    /// fsync calls
    pub sync_calls: u64,
    /// Nanoseconds spent in fsync
    pub sync_nanos: u64,
}

/// Outcome of replaying the file on open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied
    pub records_replayed: u64,
    /// Mutations applied across all records
    pub mutations_applied: u64,
    /// Bytes after the last valid record
    pub bytes_discarded: u64,
}

/// Open container file.
pub struct Container {
    path: PathBuf,
    file: File,
    header: FileHeader,
    catalog: Catalog,
    durability: DurabilityMode,
    writable: bool,

    /// Offset one past the last valid record
    end_offset: u64,

    /// Sequence number of the last applied record (0 before the first)
    last_sequence: u64,

    /// Commits written since the last fsync
    unsynced_commits: usize,

    replay: ReplayStats,
    counters: ContainerCounters,
}

impl Container {
    /// Create a new container, replacing any existing file at `path`.
    pub fn create(path: impl AsRef<Path>, durability: DurabilityMode) -> ContainerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ContainerError::open(&path, e))?;
        lock_exclusive(&file, &path)?;

        let header = FileHeader::new(*uuid::Uuid::new_v4().as_bytes(), now_micros());
        let init = |file: &mut File| -> std::io::Result<()> {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header.to_bytes())?;
            file.sync_all()
        };
        init(&mut file).map_err(|e| ContainerError::open(&path, e))?;

        info!(
            target: "approx_store::container",
            path = %path.display(),
            durability = durability.description(),
            "Created container"
        );

        Ok(Container {
            path,
            file,
            header,
            catalog: Catalog::new(),
            durability,
            writable: true,
            end_offset: FILE_HEADER_SIZE as u64,
            last_sequence: 0,
            unsynced_commits: 0,
            replay: ReplayStats::default(),
            counters: ContainerCounters::default(),
        })
    }

    /// Open an existing container for appending.
    ///
    /// Replays every committed record. A torn or corrupt tail is truncated
    /// away with a warning.
    pub fn open(path: impl AsRef<Path>, durability: DurabilityMode) -> ContainerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ContainerError::open(&path, e))?;
        lock_exclusive(&file, &path)?;
        Self::load(path, file, durability, true)
    }

    /// Open `path` for appending, creating it if it does not exist or is
    /// too short to hold a header.
    ///
    /// A file shorter than the header can only be a creation that crashed
    /// before the header was synced, so it is recreated with a warning.
    pub fn open_or_create(
        path: impl AsRef<Path>,
        durability: DurabilityMode,
    ) -> ContainerResult<Self> {
        let path = path.as_ref();
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() >= FILE_HEADER_SIZE as u64 => Self::open(path, durability),
            Ok(meta) if meta.len() > 0 => {
                warn!(
                    target: "approx_store::container",
                    path = %path.display(),
                    len = meta.len(),
                    "Recreating container with incomplete header"
                );
                Self::create(path, durability)
            }
            _ => Self::create(path, durability),
        }
    }

    /// Open an existing container without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ContainerError::open(&path, e))?;
        Self::load(path, file, DurabilityMode::default(), false)
    }

    fn load(
        path: PathBuf,
        mut file: File,
        durability: DurabilityMode,
        writable: bool,
    ) -> ContainerResult<Self> {
        let file_len = file
            .metadata()
            .map_err(|e| ContainerError::open(&path, e))?
            .len();
        if file_len < FILE_HEADER_SIZE as u64 {
            return Err(ContainerError::open(&path, "file too short for header"));
        }

        let mut header_bytes = [0u8; FILE_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_exact(&mut header_bytes))
            .map_err(|e| ContainerError::open(&path, e))?;
        let header = FileHeader::from_bytes(&header_bytes)
            .filter(FileHeader::is_valid)
            .ok_or_else(|| ContainerError::open(&path, "not a container file"))?;

        let mut catalog = Catalog::new();
        let (end_offset, last_sequence, mut replay) =
            replay_records(&mut file, &mut catalog, file_len).map_err(|e| match e {
                ContainerError::Io(io) => ContainerError::open(&path, io),
                other => other,
            })?;

        if replay.bytes_discarded > 0 {
            warn!(
                target: "approx_store::container",
                path = %path.display(),
                valid_end = end_offset,
                bytes_discarded = replay.bytes_discarded,
                "Discarding incomplete tail of container"
            );
            if writable {
                file.set_len(end_offset)
                    .and_then(|_| file.sync_all())
                    .map_err(|e| ContainerError::open(&path, e))?;
            } else {
                replay.bytes_discarded = 0;
            }
        }

        info!(
            target: "approx_store::container",
            path = %path.display(),
            records = replay.records_replayed,
            mutations = replay.mutations_applied,
            groups = catalog.groups().len(),
            read_only = !writable,
            "Opened container"
        );

        Ok(Container {
            path,
            file,
            header,
            catalog,
            durability,
            writable,
            end_offset,
            last_sequence,
            unsynced_commits: 0,
            replay,
            counters: ContainerCounters::default(),
        })
    }

    /// Append a writeset as one atomic commit.
    ///
    /// Returns the commit sequence number. On failure neither the catalog
    /// nor the file changes. An empty writeset writes nothing and returns
    /// the last sequence number.
    pub fn commit(&mut self, writeset: Writeset) -> ContainerResult<u64> {
        if !self.writable {
            return Err(ContainerError::ReadOnly);
        }
        if writeset.is_empty() {
            return Ok(self.last_sequence);
        }

        let sequence = self.last_sequence + 1;
        let (payload, chunk_offsets) = writeset
            .encode()
            .map_err(|e| ContainerError::Oversized(e.to_string()))?;
        let record = CommitRecord::new(sequence, payload)
            .to_bytes()
            .map_err(|e| ContainerError::Oversized(e.to_string()))?;
        let data_base = self.end_offset + RECORD_WRITESET_OFFSET as u64;

        let undo = apply_writeset(
            &mut self.catalog,
            writeset.mutations(),
            data_base,
            &chunk_offsets,
        )?;

        if let Err(e) = self.persist(&record) {
            if let Err(trunc) = self.file.set_len(self.end_offset) {
                warn!(
                    target: "approx_store::container",
                    error = %trunc,
                    "Failed to truncate after write failure"
                );
            }
            self.catalog.rollback(undo);
            return Err(ContainerError::Io(e));
        }

        self.end_offset += record.len() as u64;
        self.last_sequence = sequence;
        self.counters.commits += 1;
        self.counters.chunks_written += chunk_offsets.len() as u64;
        self.counters.bytes_written += record.len() as u64;

        debug!(
            target: "approx_store::container",
            sequence,
            bytes = record.len(),
            "Committed record"
        );
        Ok(sequence)
    }

    fn persist(&mut self, record: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.end_offset))?;
        self.file.write_all(record)?;
        self.unsynced_commits += 1;
        if self.durability.sync_due(self.unsynced_commits) {
            self.sync()?;
        }
        Ok(())
    }

    /// Split a chunk-aligned selection of `data` into chunk writes.
    ///
    /// The extent is not checked here; a write past the current extent is
    /// rejected at commit unless the same writeset extends it first.
    pub fn hyperslab_writes(
        &self,
        dataset: DatasetId,
        slab: &Hyperslab,
        data: &[u8],
    ) -> ContainerResult<Vec<Mutation>> {
        let ds = self
            .catalog
            .dataset(dataset)
            .ok_or(crate::catalog::CatalogError::UnknownDataset(dataset))?;
        let chunk_dims = ds.chunk_dims();
        if !slab.is_chunk_aligned(chunk_dims) {
            return Err(ContainerError::InvalidSelection {
                dataset: ds.name().to_string(),
                selection: slab.to_string(),
                extent: ds.space().dims().to_vec(),
            });
        }
        let elem = ds.dtype().size();
        let expected = selection_bytes(slab, elem).ok_or_else(|| ContainerError::InvalidSelection {
            dataset: ds.name().to_string(),
            selection: slab.to_string(),
            extent: ds.space().dims().to_vec(),
        })?;
        if data.len() != expected {
            return Err(ContainerError::BufferSize {
                dataset: ds.name().to_string(),
                expected,
                actual: data.len(),
            });
        }

        let mut writes = Vec::new();
        for coord in slab.chunk_coords(chunk_dims) {
            let mut chunk = vec![0u8; ds.chunk_bytes()];
            slab.for_each_run(chunk_dims, &coord, |c, s, n| {
                chunk[c * elem..(c + n) * elem].copy_from_slice(&data[s * elem..(s + n) * elem]);
            });
            writes.push(Mutation::WriteChunk {
                dataset,
                coord,
                data: chunk,
            });
        }
        Ok(writes)
    }

    /// Read a chunk-aligned selection. Unwritten chunks read as zeros.
    pub fn read_hyperslab(&mut self, dataset: DatasetId, slab: &Hyperslab) -> ContainerResult<Vec<u8>> {
        let ds = self
            .catalog
            .dataset(dataset)
            .ok_or(crate::catalog::CatalogError::UnknownDataset(dataset))?;
        let chunk_dims = ds.chunk_dims().to_vec();
        if !slab.is_chunk_aligned(&chunk_dims) || !slab.is_within(ds.space().dims()) {
            return Err(ContainerError::InvalidSelection {
                dataset: ds.name().to_string(),
                selection: slab.to_string(),
                extent: ds.space().dims().to_vec(),
            });
        }
        let elem = ds.dtype().size();
        let len = selection_bytes(slab, elem).ok_or_else(|| ContainerError::InvalidSelection {
            dataset: ds.name().to_string(),
            selection: slab.to_string(),
            extent: ds.space().dims().to_vec(),
        })?;
        let mut out = vec![0u8; len];

        let locations: Vec<_> = slab
            .chunk_coords(&chunk_dims)
            .into_iter()
            .filter_map(|coord| ds.chunk(&coord).map(|loc| (coord, loc)))
            .collect();

        let mut chunk = Vec::new();
        for (coord, loc) in locations {
            chunk.resize(loc.len as usize, 0);
            self.file.seek(SeekFrom::Start(loc.offset))?;
            self.file.read_exact(&mut chunk)?;
            slab.for_each_run(&chunk_dims, &coord, |c, s, n| {
                out[s * elem..(s + n) * elem].copy_from_slice(&chunk[c * elem..(c + n) * elem]);
            });
        }
        Ok(out)
    }

    /// fsync the file if any commit is unsynced.
    pub fn flush(&mut self) -> ContainerResult<()> {
        if self.unsynced_commits > 0 {
            self.sync()?;
        }
        Ok(())
    }

    fn sync(&mut self) -> std::io::Result<()> {
        let start = Instant::now();
        self.file.sync_data()?;
        self.counters.sync_calls += 1;
        self.counters.sync_nanos += start.elapsed().as_nanos() as u64;
        self.unsynced_commits = 0;
        Ok(())
    }

    /// Flush and release the file.
    pub fn close(mut self) -> ContainerResult<()> {
        self.flush()?;
        Ok(())
    }

    /// Catalog of groups and datasets.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// File path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File identity, fixed at creation.
    pub fn file_uuid(&self) -> [u8; 16] {
        self.header.file_uuid
    }

    /// Creation time in microseconds since the epoch.
    pub fn created_micros(&self) -> u64 {
        self.header.created_micros
    }

    /// Sequence number of the last commit, 0 if none.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Bytes of valid content, header included.
    pub fn len(&self) -> u64 {
        self.end_offset
    }

    /// Whether the file holds no commits.
    pub fn is_empty(&self) -> bool {
        self.last_sequence == 0
    }

    /// Whether the handle can commit.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Configured durability mode.
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// What replay found when the file was opened.
    pub fn replay_stats(&self) -> &ReplayStats {
        &self.replay
    }

    /// Snapshot of cumulative counters.
    pub fn counters(&self) -> ContainerCounters {
        self.counters.clone()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.unsynced_commits > 0 {
            if let Err(e) = self.file.sync_data() {
                warn!(
                    target: "approx_store::container",
                    path = %self.path.display(),
                    error = %e,
                    "Failed to sync container on drop"
                );
            }
        }
        if self.writable {
            let _ = FileExt::unlock(&self.file);
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .field("last_sequence", &self.last_sequence)
            .field("end_offset", &self.end_offset)
            .finish()
    }
}

fn lock_exclusive(file: &File, path: &Path) -> ContainerResult<()> {
    file.try_lock_exclusive().map_err(|_| {
        ContainerError::open(path, "container is already in use by another writer")
    })
}

/// Byte length of a selection of `elem`-byte elements, if it fits in memory.
fn selection_bytes(slab: &Hyperslab, elem: usize) -> Option<usize> {
    let bytes = slab.num_elements()?.checked_mul(elem as u64)?;
    usize::try_from(bytes).ok()
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Apply a writeset's mutations, rolling back on the first rejection.
///
/// Chunk data of the `i`th `WriteChunk` lives at `data_base + chunk_offsets[i]`.
fn apply_writeset(
    catalog: &mut Catalog,
    mutations: &[Mutation],
    data_base: u64,
    chunk_offsets: &[usize],
) -> ContainerResult<Vec<Undo>> {
    let mut undo = Vec::with_capacity(mutations.len());
    let mut chunks = chunk_offsets.iter();
    for mutation in mutations {
        let offset = match mutation {
            Mutation::WriteChunk { .. } => chunks.next().map(|o| data_base + *o as u64),
            _ => None,
        };
        match catalog.apply(mutation, offset) {
            Ok(entry) => undo.push(entry),
            Err(e) => {
                catalog.rollback(undo);
                return Err(e.into());
            }
        }
    }
    Ok(undo)
}

/// Replay every complete record after the header.
///
/// Returns the end of the last valid record, the last sequence number and
/// stats. Replay stops at the first partial or checksum-failing record. A
/// record that passes its checksum but cannot be applied is corruption.
fn replay_records(
    file: &mut File,
    catalog: &mut Catalog,
    file_len: u64,
) -> ContainerResult<(u64, u64, ReplayStats)> {
    let mut offset = FILE_HEADER_SIZE as u64;
    let mut last_sequence = 0u64;
    let mut stats = ReplayStats::default();

    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    while offset < file_len {
        let remaining = file_len - offset;
        if remaining < 4 {
            break;
        }
        let mut prefix = [0u8; 4];
        reader.read_exact(&mut prefix)?;
        let framed = match CommitRecord::framed_len(&prefix) {
            Ok(n) if n as u64 <= remaining => n,
            _ => break,
        };

        buf.clear();
        buf.extend_from_slice(&prefix);
        buf.resize(framed, 0);
        reader.read_exact(&mut buf[4..])?;

        let record = match CommitRecord::from_bytes(&buf) {
            Ok((record, _)) => record,
            Err(RecordError::ChecksumMismatch { .. }) | Err(RecordError::InsufficientData) => break,
            Err(e) => {
                return Err(ContainerError::Corrupt {
                    offset,
                    reason: e.to_string(),
                })
            }
        };

        if record.sequence != last_sequence + 1 {
            return Err(ContainerError::Corrupt {
                offset,
                reason: format!(
                    "sequence {} follows {}",
                    record.sequence, last_sequence
                ),
            });
        }

        let (writeset, chunk_offsets) =
            Writeset::decode(&record.writeset).map_err(|e| ContainerError::Corrupt {
                offset,
                reason: e.to_string(),
            })?;
        let data_base = offset + RECORD_WRITESET_OFFSET as u64;
        apply_writeset(catalog, writeset.mutations(), data_base, &chunk_offsets).map_err(
            |e| ContainerError::Corrupt {
                offset,
                reason: e.to_string(),
            },
        )?;

        stats.records_replayed += 1;
        stats.mutations_applied += writeset.len() as u64;
        last_sequence = record.sequence;
        offset += framed as u64;
    }

    stats.bytes_discarded = file_len - offset;
    Ok((offset, last_sequence, stats))
}
