use strata_dag::GraphError;
use strata_diff::DiffError;
use strata_types::TypeError;
use thiserror::Error;

use crate::conflict::Conflict;
use crate::orchestrator::MergeState;

/// Errors that abort a merge. None of them leave the graph modified.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("tensor {tensor:?} was created on both sides with different {field}: {ours} vs {theirs}")]
    Mismatch {
        tensor: String,
        field: &'static str,
        ours: String,
        theirs: String,
    },

    #[error("tensor {tensor:?} has no sample identity and was modified on the target side")]
    NotSupported { tensor: String },

    #[error("unresolved merge conflicts: {}", describe(.0))]
    Conflict(Vec<Conflict>),

    #[error("merge already ran and ended {0}")]
    NotIdle(MergeState),

    #[error("unknown conflict resolution policy: {0}")]
    UnknownPolicy(String),

    #[error("merge plan does not apply to the current state: {source}")]
    InvalidPlan {
        #[source]
        source: TypeError,
    },

    #[error("failed to persist merge: {0}")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn describe(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type MergeResult<T> = Result<T, MergeError>;
