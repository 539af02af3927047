//! Commit record format.
//!
//! After the file header the container is a log of commit records. Each
//! record carries one encoded [`Writeset`](super::Writeset) and is applied
//! all-or-nothing on replay.
//!
//! # Record Layout
//!
//! ```text
//! ┌─────────────────┬──────────────────┬──────────────┬─────────────────────┬──────────┐
//! │ Length (4 bytes)│ Format Ver (1)   │ Sequence (8) │ Writeset (variable) │ CRC32 (4)│
//! └─────────────────┴──────────────────┴──────────────┴─────────────────────┴──────────┘
//! ```
//!
//! The length field counts everything after itself. The CRC covers the
//! format version, sequence and writeset.

use crc32fast::Hasher;

/// Current commit record format version
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Byte offset of the writeset within a serialized record.
pub const RECORD_WRITESET_OFFSET: usize = 4 + 1 + 8;

/// Smallest legal value of the length field: version + sequence + CRC.
const MIN_RECORD_LENGTH: usize = 1 + 8 + 4;

/// Largest writeset a record can frame.
pub const MAX_WRITESET_LEN: usize = u32::MAX as usize - MIN_RECORD_LENGTH;

/// One atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit sequence number, starting at 1 and increasing by one
    pub sequence: u64,

    /// Encoded writeset
    pub writeset: Vec<u8>,
}

impl CommitRecord {
    /// Create a new commit record.
    pub fn new(sequence: u64, writeset: Vec<u8>) -> Self {
        CommitRecord { sequence, writeset }
    }

    /// Serialize record to bytes.
    ///
    /// Format: length (4) + format_version (1) + sequence (8) + writeset + crc32 (4)
    ///
    /// Fails with [`RecordError::TooLarge`] if the writeset exceeds
    /// [`MAX_WRITESET_LEN`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        let length = Self::length_field(self.writeset.len())?;
        let mut record = Vec::with_capacity(4 + length as usize);
        record.extend_from_slice(&length.to_le_bytes());
        record.push(RECORD_FORMAT_VERSION);
        record.extend_from_slice(&self.sequence.to_le_bytes());
        record.extend_from_slice(&self.writeset);

        let crc = Self::compute_crc(&record[4..]);
        record.extend_from_slice(&crc.to_le_bytes());

        Ok(record)
    }

    /// Length field for a writeset of `writeset_len` bytes.
    pub fn length_field(writeset_len: usize) -> Result<u32, RecordError> {
        if writeset_len > MAX_WRITESET_LEN {
            return Err(RecordError::TooLarge(writeset_len));
        }
        Ok((MIN_RECORD_LENGTH + writeset_len) as u32)
    }

    /// Read the length prefix of a record.
    ///
    /// Returns the total serialized size (prefix included).
    pub fn framed_len(prefix: &[u8; 4]) -> Result<usize, RecordError> {
        let length = u32::from_le_bytes(*prefix) as usize;
        if length < MIN_RECORD_LENGTH {
            return Err(RecordError::InvalidFormat);
        }
        Ok(4 + length)
    }

    /// Deserialize record from bytes.
    ///
    /// Returns (record, bytes_consumed) on success.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        if bytes.len() < 4 {
            return Err(RecordError::InsufficientData);
        }

        let framed = Self::framed_len(&[bytes[0], bytes[1], bytes[2], bytes[3]])?;
        if bytes.len() < framed {
            return Err(RecordError::InsufficientData);
        }

        let body = &bytes[4..framed - 4];
        let stored_crc = u32::from_le_bytes([
            bytes[framed - 4],
            bytes[framed - 3],
            bytes[framed - 2],
            bytes[framed - 1],
        ]);
        let computed_crc = Self::compute_crc(body);
        if computed_crc != stored_crc {
            return Err(RecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        let format_version = body[0];
        if format_version != RECORD_FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(format_version));
        }

        let mut seq = [0u8; 8];
        seq.copy_from_slice(&body[1..9]);

        let record = CommitRecord {
            sequence: u64::from_le_bytes(seq),
            writeset: body[9..].to_vec(),
        };

        Ok((record, framed))
    }

    /// Compute CRC32 checksum of data.
    fn compute_crc(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Commit record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Not enough data to parse record
    #[error("Insufficient data to parse record")]
    InsufficientData,

    /// Record format is invalid
    #[error("Invalid record format")]
    InvalidFormat,

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Expected checksum from record
        expected: u32,
        /// Computed checksum
        computed: u32,
    },

    /// Unsupported format version
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Writeset too large for the length field
    #[error("Writeset of {0} bytes exceeds the record size limit")]
    TooLarge(usize),
}
