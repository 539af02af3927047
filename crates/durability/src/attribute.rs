//! Attribute values attached to groups and datasets.

use std::fmt;

/// Value of a named attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Scalar integer
    Int(i64),
    /// One-dimensional integer array
    IntList(Vec<i64>),
    /// UTF-8 string
    Text(String),
}

impl AttributeValue {
    /// On-disk tag.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            AttributeValue::Int(_) => 1,
            AttributeValue::IntList(_) => 2,
            AttributeValue::Text(_) => 3,
        }
    }

    /// Scalar integer value, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer array value, if this is one.
    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttributeValue::IntList(v) => Some(v),
            _ => None,
        }
    }

    /// String value, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::IntList(v) => write!(f, "{:?}", v),
            AttributeValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}
