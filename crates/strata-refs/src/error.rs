//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// A branch with this name already exists.
    #[error("branch already exists: {name}")]
    AlreadyExists { name: String },

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// HEAD is in a detached state (not pointing to a branch).
    #[error("HEAD is detached")]
    DetachedHead,

    /// Cannot delete the currently checked-out branch.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
