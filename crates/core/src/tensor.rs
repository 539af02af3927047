//! Tensor payloads
//!
//! A tensor is a row-major buffer of little-endian element bytes tagged with
//! its [`ScalarType`] and shape. [`Tensor`] owns its bytes; [`TensorView`]
//! borrows them and is what the write paths accept, so callers holding raw
//! buffers never copy.

use crate::error::{describe_layout, StoreError, StoreResult};
use crate::scalar::ScalarType;
use byteorder::{ByteOrder, LittleEndian};

mod sealed {
    pub trait Sealed {}
}

/// Rust primitive that maps onto one [`ScalarType`].
///
/// Sealed: the set of element types is closed.
pub trait Element: Copy + Default + sealed::Sealed + 'static {
    /// Scalar type recorded for this element.
    const SCALAR_TYPE: ScalarType;

    /// Encode `values` as little-endian bytes into `out`.
    ///
    /// `out.len()` must equal `values.len() * size_of::<Self>()`.
    fn encode(values: &[Self], out: &mut [u8]);

    /// Decode little-endian bytes into `out`.
    ///
    /// `bytes.len()` must equal `out.len() * size_of::<Self>()`.
    fn decode(bytes: &[u8], out: &mut [Self]);
}

macro_rules! impl_element {
    ($ty:ty, $scalar:expr, $write:ident, $read:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const SCALAR_TYPE: ScalarType = $scalar;

            fn encode(values: &[Self], out: &mut [u8]) {
                LittleEndian::$write(values, out);
            }

            fn decode(bytes: &[u8], out: &mut [Self]) {
                LittleEndian::$read(bytes, out);
            }
        }
    };
}

impl_element!(f64, ScalarType::Float64, write_f64_into, read_f64_into);
impl_element!(f32, ScalarType::Float32, write_f32_into, read_f32_into);
impl_element!(i32, ScalarType::Int32, write_i32_into, read_i32_into);
impl_element!(i64, ScalarType::Int64, write_i64_into, read_i64_into);
impl_element!(i16, ScalarType::Int16, write_i16_into, read_i16_into);

impl sealed::Sealed for u8 {}

impl Element for u8 {
    const SCALAR_TYPE: ScalarType = ScalarType::UInt8;

    fn encode(values: &[Self], out: &mut [u8]) {
        out.copy_from_slice(values);
    }

    fn decode(bytes: &[u8], out: &mut [Self]) {
        out.copy_from_slice(bytes);
    }
}

/// Number of elements in a row of the given shape (1 for rank 0).
///
/// Returns `None` if the product overflows `u64`. A zero dimension always
/// yields `Some(0)`.
pub fn element_count(shape: &[u64]) -> Option<u64> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

/// Byte length of a row of `scalar_type` elements in `shape`, if it fits `u64`.
pub fn byte_length(scalar_type: ScalarType, shape: &[u64]) -> Option<u64> {
    element_count(shape)?.checked_mul(scalar_type.size_in_bytes() as u64)
}

/// Owned tensor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    scalar_type: ScalarType,
    shape: Vec<u64>,
    data: Vec<u8>,
}

impl Tensor {
    /// Build a tensor from typed values laid out row-major in `shape`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShapeMismatch`] if `values.len()` is not the
    /// product of `shape`.
    pub fn from_slice<T: Element>(values: &[T], shape: &[u64]) -> StoreResult<Self> {
        if element_count(shape) != Some(values.len() as u64) {
            return Err(StoreError::shape_mismatch(
                "tensor",
                describe_layout(T::SCALAR_TYPE, shape),
                format!("{} elements", values.len()),
            ));
        }
        let mut data = vec![0u8; values.len() * T::SCALAR_TYPE.size_in_bytes()];
        T::encode(values, &mut data);
        Ok(Tensor {
            scalar_type: T::SCALAR_TYPE,
            shape: shape.to_vec(),
            data,
        })
    }

    /// Build a rank-1 tensor holding `values`.
    pub fn vector<T: Element>(values: &[T]) -> Self {
        let mut data = vec![0u8; values.len() * T::SCALAR_TYPE.size_in_bytes()];
        T::encode(values, &mut data);
        Tensor {
            scalar_type: T::SCALAR_TYPE,
            shape: vec![values.len() as u64],
            data,
        }
    }

    /// Wrap raw little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShapeMismatch`] if the byte length does not match
    /// `shape` and `scalar_type`.
    pub fn from_bytes(scalar_type: ScalarType, shape: Vec<u64>, data: Vec<u8>) -> StoreResult<Self> {
        TensorView::new(scalar_type, &shape, &data)?;
        Ok(Tensor {
            scalar_type,
            shape,
            data,
        })
    }

    /// Element type.
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Row-major shape.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of elements.
    pub fn num_elements(&self) -> u64 {
        (self.data.len() / self.scalar_type.size_in_bytes()) as u64
    }

    /// Borrow as a view.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            scalar_type: self.scalar_type,
            shape: &self.shape,
            data: &self.data,
        }
    }

    /// Decode the elements as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShapeMismatch`] if `T` is not this tensor's
    /// element type.
    pub fn to_vec<T: Element>(&self) -> StoreResult<Vec<T>> {
        self.view().to_vec()
    }
}

/// Borrowed tensor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorView<'a> {
    scalar_type: ScalarType,
    shape: &'a [u64],
    data: &'a [u8],
}

impl<'a> TensorView<'a> {
    /// Borrow raw little-endian bytes as a tensor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShapeMismatch`] if the byte length does not match
    /// `shape` and `scalar_type`.
    pub fn new(scalar_type: ScalarType, shape: &'a [u64], data: &'a [u8]) -> StoreResult<Self> {
        let expected = byte_length(scalar_type, shape).ok_or_else(|| {
            StoreError::shape_mismatch(
                "tensor",
                "a shape whose byte length fits in 64 bits",
                describe_layout(scalar_type, shape),
            )
        })?;
        if expected != data.len() as u64 {
            return Err(StoreError::shape_mismatch(
                "tensor",
                format!("{} ({} bytes)", describe_layout(scalar_type, shape), expected),
                format!("{} bytes", data.len()),
            ));
        }
        Ok(TensorView {
            scalar_type,
            shape,
            data,
        })
    }

    /// Element type.
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Row-major shape.
    pub fn shape(&self) -> &'a [u64] {
        self.shape
    }

    /// Raw little-endian bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Number of elements.
    pub fn num_elements(&self) -> u64 {
        (self.data.len() / self.scalar_type.size_in_bytes()) as u64
    }

    /// Copy into an owned tensor.
    pub fn to_tensor(&self) -> Tensor {
        Tensor {
            scalar_type: self.scalar_type,
            shape: self.shape.to_vec(),
            data: self.data.to_vec(),
        }
    }

    /// Decode the elements as `T`.
    pub fn to_vec<T: Element>(&self) -> StoreResult<Vec<T>> {
        if T::SCALAR_TYPE != self.scalar_type {
            return Err(StoreError::shape_mismatch(
                "tensor",
                describe_layout(self.scalar_type, self.shape),
                describe_layout(T::SCALAR_TYPE, self.shape),
            ));
        }
        let mut out = vec![T::default(); self.num_elements() as usize];
        T::decode(self.data, &mut out);
        Ok(out)
    }
}

impl<'a> From<&'a Tensor> for TensorView<'a> {
    fn from(tensor: &'a Tensor) -> Self {
        tensor.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_roundtrip_f64() {
        let t = Tensor::vector(&[1.0f64, 2.0, -3.5]);
        assert_eq!(t.scalar_type(), ScalarType::Float64);
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.as_bytes().len(), 24);
        assert_eq!(t.to_vec::<f64>().unwrap(), vec![1.0, 2.0, -3.5]);
    }

    #[test]
    fn test_little_endian_layout() {
        let t = Tensor::vector(&[0x0102i16]);
        assert_eq!(t.as_bytes(), &[0x02, 0x01]);
    }

    #[test]
    fn test_from_slice_checks_element_count() {
        let err = Tensor::from_slice(&[1i32, 2, 3], &[2, 2]).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));

        let t = Tensor::from_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        assert_eq!(t.num_elements(), 6);
    }

    #[test]
    fn test_rank_zero_holds_one_element() {
        let t = Tensor::from_slice(&[42u8], &[]).unwrap();
        assert_eq!(t.num_elements(), 1);
        assert_eq!(t.to_vec::<u8>().unwrap(), vec![42]);
    }

    #[test]
    fn test_view_rejects_wrong_byte_length() {
        let data = [0u8; 7];
        let err = TensorView::new(ScalarType::Float32, &[2], &data).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_to_vec_rejects_other_type() {
        let t = Tensor::vector(&[1.0f32, 2.0]);
        assert!(t.to_vec::<f64>().is_err());
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_from_bytes_matches_typed_constructor() {
        let typed = Tensor::vector(&[7i64, -8]);
        let raw = Tensor::from_bytes(ScalarType::Int64, vec![2], typed.as_bytes().to_vec()).unwrap();
        assert_eq!(raw, typed);
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        assert_eq!(element_count(&[u64::MAX, 2]), None);
        assert_eq!(element_count(&[u64::MAX, 0, 2]), Some(0));
        assert_eq!(byte_length(ScalarType::Float64, &[u64::MAX / 4]), None);

        let err = TensorView::new(ScalarType::Float64, &[u64::MAX, 2], &[]).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        let err = Tensor::from_bytes(ScalarType::UInt8, vec![1 << 32, 1 << 32], vec![]).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        let err = Tensor::from_slice::<f32>(&[], &[u64::MAX, u64::MAX]).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_view_to_tensor() {
        let t = Tensor::vector(&[1u8, 2, 3]);
        let view: TensorView<'_> = (&t).into();
        assert_eq!(view.to_tensor(), t);
    }

    proptest::proptest! {
        #[test]
        fn prop_view_accepts_exactly_matching_lengths(
            shape in proptest::collection::vec(0u64..5, 0..4),
            extra in 0usize..3,
            idx in 0usize..ScalarType::ALL.len(),
        ) {
            let ty = ScalarType::ALL[idx];
            let len = element_count(&shape).unwrap() as usize * ty.size_in_bytes();
            let data = vec![0u8; len + extra];
            let accepted = TensorView::new(ty, &shape, &data).is_ok();
            proptest::prop_assert_eq!(accepted, extra == 0);
        }

        #[test]
        fn prop_i64_bytes_decode_to_written_values(values in proptest::collection::vec(proptest::prelude::any::<i64>(), 0..32)) {
            let t = Tensor::vector(&values);
            proptest::prop_assert_eq!(t.to_vec::<i64>().unwrap(), values);
        }
    }
}
