use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Element type of an [`Array`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Bool,
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl Dtype {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Bool | Self::U8 => 1,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Stable single-byte code used in the sample frame header.
    pub fn code(&self) -> u8 {
        match self {
            Self::Bool => 0,
            Self::U8 => 1,
            Self::I32 => 2,
            Self::I64 => 3,
            Self::F32 => 4,
            Self::F64 => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Bool),
            1 => Some(Self::U8),
            2 => Some(Self::I32),
            3 => Some(Self::I64),
            4 => Some(Self::F32),
            5 => Some(Self::F64),
            _ => None,
        }
    }

    fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(s)
    }
}

/// A dense n-dimensional sample value.
///
/// Elements are stored little-endian in row-major order. An empty shape is a
/// scalar holding exactly one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Array {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Bytes,
}

/// Bytes needed to hold `shape` elements of `dtype`.
pub fn byte_len(shape: &[usize], dtype: Dtype) -> TypeResult<usize> {
    shape
        .iter()
        .try_fold(dtype.size(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| TypeError::ShapeOverflow(shape.to_vec()))
}

impl Array {
    /// Build an array, checking that `data` fills `shape` exactly.
    pub fn new(dtype: Dtype, shape: Vec<usize>, data: impl Into<Bytes>) -> TypeResult<Self> {
        let data = data.into();
        let expected = byte_len(&shape, dtype)?;
        if data.len() != expected {
            return Err(TypeError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    pub fn from_i64s(values: &[i64]) -> Self {
        Self::from_le(Dtype::I64, vec![values.len()], values.iter().map(|v| v.to_le_bytes()))
    }

    pub fn from_f32s(values: &[f32]) -> Self {
        Self::from_le(Dtype::F32, vec![values.len()], values.iter().map(|v| v.to_le_bytes()))
    }

    pub fn from_f64s(values: &[f64]) -> Self {
        Self::from_le(Dtype::F64, vec![values.len()], values.iter().map(|v| v.to_le_bytes()))
    }

    pub fn from_u8s(values: &[u8]) -> Self {
        Self {
            dtype: Dtype::U8,
            shape: vec![values.len()],
            data: Bytes::copy_from_slice(values),
        }
    }

    /// An array of `shape` with every element set to `value`.
    pub fn full_f64(shape: Vec<usize>, value: f64) -> Self {
        let n = shape.iter().product::<usize>();
        Self::from_le(Dtype::F64, shape, std::iter::repeat(value.to_le_bytes()).take(n))
    }

    /// An `i64` array of `shape` with every element set to `value`.
    pub fn full_i64(shape: Vec<usize>, value: i64) -> Self {
        let n = shape.iter().product::<usize>();
        Self::from_le(Dtype::I64, shape, std::iter::repeat(value.to_le_bytes()).take(n))
    }

    pub fn scalar_i64(value: i64) -> Self {
        Self::from_le(Dtype::I64, Vec::new(), std::iter::once(value.to_le_bytes()))
    }

    pub fn scalar_f64(value: f64) -> Self {
        Self::from_le(Dtype::F64, Vec::new(), std::iter::once(value.to_le_bytes()))
    }

    fn from_le<const N: usize>(
        dtype: Dtype,
        shape: Vec<usize>,
        elems: impl Iterator<Item = [u8; N]>,
    ) -> Self {
        let mut buf = Vec::new();
        for e in elems {
            buf.extend_from_slice(&e);
        }
        Self {
            dtype,
            shape,
            data: Bytes::from(buf),
        }
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw little-endian element bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// All elements widened to `i64`. Float arrays are rejected.
    pub fn to_i64_vec(&self) -> TypeResult<Vec<i64>> {
        if self.dtype.is_float() {
            return Err(TypeError::DtypeMismatch {
                expected: "integer".into(),
                actual: self.dtype.to_string(),
            });
        }
        let size = self.dtype.size();
        Ok(self
            .data
            .chunks_exact(size)
            .map(|c| match self.dtype {
                Dtype::Bool | Dtype::U8 => i64::from(c[0]),
                Dtype::I32 => i64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                _ => i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]),
            })
            .collect())
    }

    /// All elements converted to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let size = self.dtype.size();
        self.data
            .chunks_exact(size)
            .map(|c| match self.dtype {
                Dtype::Bool | Dtype::U8 => f64::from(c[0]),
                Dtype::I32 => f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                Dtype::F32 => f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                Dtype::I64 => {
                    i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f64
                }
                Dtype::F64 => {
                    f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                }
            })
            .collect()
    }

    /// The single element of a one-element integer array.
    pub fn as_i64(&self) -> Option<i64> {
        match self.to_i64_vec() {
            Ok(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}

impl From<i64> for Array {
    fn from(value: i64) -> Self {
        Self::scalar_i64(value)
    }
}

impl From<i32> for Array {
    fn from(value: i32) -> Self {
        Self::from_le(Dtype::I32, Vec::new(), std::iter::once(value.to_le_bytes()))
    }
}

impl From<f64> for Array {
    fn from(value: f64) -> Self {
        Self::scalar_f64(value)
    }
}

impl From<Vec<i64>> for Array {
    fn from(values: Vec<i64>) -> Self {
        Self::from_i64s(&values)
    }
}

impl From<&[i64]> for Array {
    fn from(values: &[i64]) -> Self {
        Self::from_i64s(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_shape() {
        assert!(Array::new(Dtype::I32, vec![2, 2], vec![0u8; 16]).is_ok());
        assert_eq!(
            Array::new(Dtype::I32, vec![2, 2], vec![0u8; 15]),
            Err(TypeError::ShapeMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn oversized_shape_is_an_error() {
        assert_eq!(
            Array::new(Dtype::I64, vec![usize::MAX, 4], Vec::<u8>::new()),
            Err(TypeError::ShapeOverflow(vec![usize::MAX, 4]))
        );
        assert!(byte_len(&[usize::MAX / 8 + 1], Dtype::I64).is_err());
        assert_eq!(byte_len(&[3, 2], Dtype::I32), Ok(24));
    }

    #[test]
    fn scalar_has_empty_shape() {
        let a = Array::scalar_i64(42);
        assert!(a.shape().is_empty());
        assert_eq!(a.num_elements(), 1);
        assert_eq!(a.as_i64(), Some(42));
    }

    #[test]
    fn full_fills_every_element() {
        let a = Array::full_f64(vec![3, 2], 1.5);
        assert_eq!(a.num_elements(), 6);
        assert!(a.to_f64_vec().iter().all(|v| *v == 1.5));
        assert!(a.to_i64_vec().is_err());
    }

    #[test]
    fn integer_widening() {
        let a = Array::new(Dtype::I32, vec![2], [(-3i32).to_le_bytes(), 7i32.to_le_bytes()].concat())
            .unwrap();
        assert_eq!(a.to_i64_vec().unwrap(), vec![-3, 7]);
        assert_eq!(Array::from_u8s(&[1, 255]).to_i64_vec().unwrap(), vec![1, 255]);
    }

    #[test]
    fn dtype_codes_roundtrip() {
        for dtype in [Dtype::Bool, Dtype::U8, Dtype::I32, Dtype::I64, Dtype::F32, Dtype::F64] {
            assert_eq!(Dtype::from_code(dtype.code()), Some(dtype));
        }
        assert_eq!(Dtype::from_code(99), None);
    }

    #[test]
    fn equality_covers_shape_and_dtype() {
        assert_ne!(Array::from_i64s(&[1]), Array::scalar_i64(1));
        assert_ne!(Array::from_f64s(&[1.0]), Array::from_i64s(&[1]));
        assert_eq!(Array::from(vec![1, 2]), Array::from_i64s(&[1, 2]));
    }
}
