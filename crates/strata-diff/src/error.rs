//! Error types for the diff crate.

use strata_dag::GraphError;
use strata_types::TypeError;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Graph lookup or snapshot replay failed.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Uncommitted changes do not replay onto their base commit.
    #[error("uncommitted changes do not apply: {0}")]
    InvalidOverlay(#[source] TypeError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
