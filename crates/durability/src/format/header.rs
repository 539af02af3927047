//! Container file header.
//!
//! # Binary Format (32 bytes)
//!
//! ```text
//! magic("APXS", 4) + format_version(4) + file_uuid(16) + created_micros(8) = 32 bytes
//! ```
//!
//! The header is written once when the file is created and never rewritten.

/// Magic bytes identifying a container file: "APXS"
pub const CONTAINER_MAGIC: [u8; 4] = *b"APXS";

/// Current container format version
pub const CONTAINER_FORMAT_VERSION: u32 = 1;

/// Size of the file header in bytes
pub const FILE_HEADER_SIZE: usize = 32;

/// Container file header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Magic bytes: "APXS"
    pub magic: [u8; 4],

    /// Format version for forward compatibility
    pub format_version: u32,

    /// Identity of this file, fixed at creation
    pub file_uuid: [u8; 16],

    /// Creation time (microseconds since epoch)
    pub created_micros: u64,
}

impl FileHeader {
    /// Create a header for a new file.
    pub fn new(file_uuid: [u8; 16], created_micros: u64) -> Self {
        FileHeader {
            magic: CONTAINER_MAGIC,
            format_version: CONTAINER_FORMAT_VERSION,
            file_uuid,
            created_micros,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..24].copy_from_slice(&self.file_uuid);
        bytes[24..32].copy_from_slice(&self.created_micros.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8; FILE_HEADER_SIZE]) -> Option<Self> {
        Some(FileHeader {
            magic: bytes[0..4].try_into().ok()?,
            format_version: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            file_uuid: bytes[8..24].try_into().ok()?,
            created_micros: u64::from_le_bytes(bytes[24..32].try_into().ok()?),
        })
    }

    /// Validate magic bytes and format version.
    pub fn is_valid(&self) -> bool {
        self.magic == CONTAINER_MAGIC && self.format_version == CONTAINER_FORMAT_VERSION
    }
}
