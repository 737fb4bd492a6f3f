use thiserror::Error;

use crate::identity::{SampleId, TensorId};

/// Errors produced by type operations and change replay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Array data does not fill the declared shape.
    #[error("array data is {actual} bytes, shape requires {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The element count of a shape does not fit in memory.
    #[error("shape {0:?} overflows")]
    ShapeOverflow(Vec<usize>),

    /// The array holds a different element type than requested.
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch { expected: String, actual: String },

    #[error("unknown htype: {0}")]
    UnknownHtype(String),

    #[error("unknown compression: {0}")]
    UnknownCompression(String),

    /// A change refers to a tensor that is not live in the snapshot.
    #[error("tensor {0} is not present")]
    UnknownTensor(TensorId),

    /// A change creates a tensor id that is already live.
    #[error("tensor {0} already exists")]
    DuplicateTensor(TensorId),

    /// Two live tensors would share a name.
    #[error("tensor name '{0}' is already in use")]
    NameTaken(String),

    /// A rename's source name does not match the tensor's current name.
    #[error("tensor {tensor} is named '{actual}', not '{expected}'")]
    NameMismatch {
        tensor: TensorId,
        expected: String,
        actual: String,
    },

    #[error("sample {sample} is not present in tensor {tensor}")]
    UnknownSample { tensor: TensorId, sample: SampleId },

    #[error("sample {sample} already exists in tensor {tensor}")]
    DuplicateSample { tensor: TensorId, sample: SampleId },
}

/// Convenience alias for type results.
pub type TypeResult<T> = Result<T, TypeError>;
