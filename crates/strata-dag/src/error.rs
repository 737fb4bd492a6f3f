//! Error types for the commit graph.

use strata_types::{ObjectId, TensorId, TypeError};

/// Errors that can occur during commit graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A referenced commit was not found in the graph.
    #[error("commit not found: {0:?}")]
    CommitNotFound(ObjectId),

    /// A parent reference points to a commit that does not exist.
    #[error("dangling parent reference: commit {commit:?} references missing parent {parent:?}")]
    DanglingParent { commit: ObjectId, parent: ObjectId },

    /// Attempted to insert a commit whose id already exists.
    #[error("duplicate commit: {0:?}")]
    DuplicateCommit(ObjectId),

    /// Wrong number of parents, or the same parent twice.
    #[error("invalid parents: {0}")]
    InvalidParents(String),

    /// The change set does not replay onto the first parent's snapshot.
    #[error("changes do not apply to parent snapshot: {source}")]
    InvalidChanges {
        #[source]
        source: TypeError,
    },

    /// A revived or aliased tensor is not known to any other parent.
    #[error("tensor {tensor} is not reachable from the merge parents")]
    UnreachableTensor { tensor: TensorId },

    /// Only commits without children can be removed.
    #[error("commit {0:?} has children")]
    HasChildren(ObjectId),

    /// A short id matches more than one commit.
    #[error("ambiguous commit prefix '{prefix}' matches {count} commits")]
    AmbiguousPrefix { prefix: String, count: usize },

    /// Structural invariant broken (found by `validate`).
    #[error("corrupt graph: {0}")]
    Corrupt(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
