//! Scalar element types and their storage primitives
//!
//! [`ScalarType`] is the closed set of element types a region can record.
//! Its identifier is what gets persisted in every dataset's `type` attribute,
//! so the numbering is part of the file format and must never change.
//!
//! [`NativeType`] describes the storage primitive a dataset is laid out with
//! (class + width). [`ScalarType::native_type`] is the total mapping between
//! the two.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a recorded tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// 64-bit IEEE float (`double`)
    Float64,
    /// 32-bit IEEE float (`float`)
    Float32,
    /// 32-bit signed integer (`int`)
    Int32,
    /// 64-bit signed integer (`long`)
    Int64,
    /// 16-bit signed integer (`short`)
    Int16,
    /// Unsigned byte (`unsigned char`)
    UInt8,
}

impl ScalarType {
    /// Every supported scalar type, in identifier order.
    pub const ALL: [ScalarType; 6] = [
        ScalarType::Float64,
        ScalarType::Float32,
        ScalarType::Int32,
        ScalarType::Int64,
        ScalarType::Int16,
        ScalarType::UInt8,
    ];

    /// Persisted identifier (value of the `type` attribute).
    pub fn id(self) -> i64 {
        match self {
            ScalarType::Float64 => 0,
            ScalarType::Float32 => 1,
            ScalarType::Int32 => 2,
            ScalarType::Int64 => 3,
            ScalarType::Int16 => 4,
            ScalarType::UInt8 => 5,
        }
    }

    /// Resolve a persisted identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedType`] for identifiers outside the
    /// closed set.
    pub fn from_id(id: i64) -> StoreResult<Self> {
        match id {
            0 => Ok(ScalarType::Float64),
            1 => Ok(ScalarType::Float32),
            2 => Ok(ScalarType::Int32),
            3 => Ok(ScalarType::Int64),
            4 => Ok(ScalarType::Int16),
            5 => Ok(ScalarType::UInt8),
            other => Err(StoreError::UnsupportedType(other)),
        }
    }

    /// Storage primitive used for datasets of this element type.
    pub fn native_type(self) -> NativeType {
        match self {
            ScalarType::Float64 => NativeType::NATIVE_DOUBLE,
            ScalarType::Float32 => NativeType::NATIVE_FLOAT,
            ScalarType::Int32 => NativeType::NATIVE_INT,
            ScalarType::Int64 => NativeType::NATIVE_LONG,
            ScalarType::Int16 => NativeType::NATIVE_SHORT,
            ScalarType::UInt8 => NativeType::NATIVE_UCHAR,
        }
    }

    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        self.native_type().size()
    }

    /// Short lowercase name (`f64`, `i32`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Float64 => "f64",
            ScalarType::Float32 => "f32",
            ScalarType::Int32 => "i32",
            ScalarType::Int64 => "i64",
            ScalarType::Int16 => "i16",
            ScalarType::UInt8 => "u8",
        }
    }
}

impl TryFrom<i64> for ScalarType {
    type Error = StoreError;

    fn try_from(id: i64) -> StoreResult<Self> {
        ScalarType::from_id(id)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Class of a storage primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NativeClass {
    /// IEEE floating point
    Float = 1,
    /// Two's complement signed integer
    SignedInt = 2,
    /// Unsigned integer
    UnsignedInt = 3,
}

/// Storage primitive identifier: element class plus width in bytes.
///
/// Always little-endian on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeType {
    class: NativeClass,
    size: u8,
}

impl NativeType {
    /// 8-byte float
    pub const NATIVE_DOUBLE: NativeType = NativeType::new(NativeClass::Float, 8);
    /// 4-byte float
    pub const NATIVE_FLOAT: NativeType = NativeType::new(NativeClass::Float, 4);
    /// 4-byte signed integer
    pub const NATIVE_INT: NativeType = NativeType::new(NativeClass::SignedInt, 4);
    /// 8-byte signed integer
    pub const NATIVE_LONG: NativeType = NativeType::new(NativeClass::SignedInt, 8);
    /// 2-byte signed integer
    pub const NATIVE_SHORT: NativeType = NativeType::new(NativeClass::SignedInt, 2);
    /// 1-byte unsigned integer
    pub const NATIVE_UCHAR: NativeType = NativeType::new(NativeClass::UnsignedInt, 1);

    const fn new(class: NativeClass, size: u8) -> Self {
        NativeType { class, size }
    }

    /// Element class.
    pub fn class(self) -> NativeClass {
        self.class
    }

    /// Element width in bytes.
    pub fn size(self) -> usize {
        self.size as usize
    }

    /// One-byte on-disk tag: class in the high nibble, width in the low nibble.
    pub fn to_tag(self) -> u8 {
        ((self.class as u8) << 4) | self.size
    }

    /// Decode an on-disk tag. Returns `None` for tags that name no primitive.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let class = match tag >> 4 {
            1 => NativeClass::Float,
            2 => NativeClass::SignedInt,
            3 => NativeClass::UnsignedInt,
            _ => return None,
        };
        let size = tag & 0x0F;
        let valid = match class {
            NativeClass::Float => matches!(size, 4 | 8),
            NativeClass::SignedInt | NativeClass::UnsignedInt => matches!(size, 1 | 2 | 4 | 8),
        };
        valid.then_some(NativeType { class, size })
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.class {
            NativeClass::Float => "f",
            NativeClass::SignedInt => "i",
            NativeClass::UnsignedInt => "u",
        };
        write!(f, "{}{}", prefix, self.size as usize * 8)
    }
}
