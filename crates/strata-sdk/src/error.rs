use strata_dag::GraphError;
use strata_diff::DiffError;
use strata_merge::{Conflict, MergeError};
use strata_refs::RefError;
use strata_store::{CodecError, StoreError};
use strata_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("checkout failed: {0}")]
    Checkout(String),

    #[error("cannot merge tensor {tensor:?}: it has no sample identity and was modified on the target")]
    MergeNotSupported { tensor: String },

    #[error("cannot merge tensor {tensor:?}: {field} differs between branches ({ours} vs {theirs})")]
    MergeMismatch {
        tensor: String,
        field: &'static str,
        ours: String,
        theirs: String,
    },

    #[error("unresolved merge conflicts: {}", describe(.0))]
    MergeConflict(Vec<Conflict>),

    #[error("tensor not found: {0}")]
    TensorNotFound(String),

    #[error("tensor already exists: {0}")]
    TensorExists(String),

    #[error("index {index} out of bounds for tensor of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("HEAD is detached; check out a branch to make changes")]
    DetachedHead,

    #[error("invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("dataset already exists")]
    AlreadyExists,

    #[error("no dataset found")]
    NotFound,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A sample failed its integrity check.
    #[error(transparent)]
    Codec(CodecError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Refs(RefError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Merge(MergeError),

    #[error(transparent)]
    Types(#[from] TypeError),
}

fn describe(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<StoreError> for DatasetError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Codec(codec) => DatasetError::Codec(codec),
            other => DatasetError::Store(other),
        }
    }
}

impl From<RefError> for DatasetError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::InvalidBranchName { name, reason } => {
                DatasetError::InvalidBranchName { name, reason }
            }
            RefError::DetachedHead => DatasetError::DetachedHead,
            other => DatasetError::Refs(other),
        }
    }
}

impl From<MergeError> for DatasetError {
    fn from(e: MergeError) -> Self {
        match e {
            MergeError::NotSupported { tensor } => DatasetError::MergeNotSupported { tensor },
            MergeError::Mismatch {
                tensor,
                field,
                ours,
                theirs,
            } => DatasetError::MergeMismatch {
                tensor,
                field,
                ours,
                theirs,
            },
            MergeError::Conflict(conflicts) => DatasetError::MergeConflict(conflicts),
            MergeError::Persist(source) => match source.downcast::<DatasetError>() {
                Ok(inner) => *inner,
                Err(other) => DatasetError::Merge(MergeError::Persist(other)),
            },
            MergeError::Graph(e) => DatasetError::Graph(e),
            MergeError::Diff(e) => DatasetError::Diff(e),
            other => DatasetError::Merge(other),
        }
    }
}

pub type DatasetResult<T> = Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_passes_through_unchanged() {
        let corrupt = CodecError::Corrupt {
            reason: "crc mismatch".into(),
        };
        let err: DatasetError = StoreError::Codec(corrupt.clone()).into();
        assert!(matches!(err, DatasetError::Codec(ref c) if *c == corrupt));
    }

    #[test]
    fn ref_errors_map_to_public_kinds() {
        let err: DatasetError = RefError::DetachedHead.into();
        assert!(matches!(err, DatasetError::DetachedHead));
        let err: DatasetError = RefError::InvalidBranchName {
            name: "a b".into(),
            reason: "space".into(),
        }
        .into();
        assert!(matches!(err, DatasetError::InvalidBranchName { .. }));
    }

    #[test]
    fn persist_errors_unwrap_to_the_original() {
        let inner = DatasetError::TensorNotFound("x".into());
        let err: DatasetError = MergeError::Persist(Box::new(inner)).into();
        assert!(matches!(err, DatasetError::TensorNotFound(name) if name == "x"));
    }
}
