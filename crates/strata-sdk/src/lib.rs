//! Dataset API for Strata.
//!
//! A [`Dataset`] is a set of named tensors versioned like a source tree:
//! edits accumulate as pending changes, [`Dataset::commit`] seals them,
//! [`Dataset::checkout`] moves between branches and commits, and
//! [`Dataset::merge`] runs a three-way merge of another branch into the
//! current one. Everything persists through a
//! [`StorageProvider`](strata_store::StorageProvider).

pub mod config;
pub mod dataset;
pub mod error;
mod merge;
pub mod persist;
pub mod tensor;
#[cfg(test)]
mod testing;

pub use config::DatasetConfig;
pub use dataset::Dataset;
pub use error::{DatasetError, DatasetResult};
pub use persist::{VersionInfo, WorkingCopy};
pub use tensor::{Tensor, TensorMut};

// Re-export key types
pub use strata_dag::Commit;
pub use strata_diff::{DiffRecord, TensorDiff};
pub use strata_merge::{Conflict, ConflictResolution, MergeOutcome, MergeReport, MergeState};
pub use strata_refs::BranchInfo;
pub use strata_store::{LocalProvider, MemoryProvider, StorageProvider};
pub use strata_types::{Array, Compression, Dtype, Htype, ObjectId, SampleId, TensorId, TensorMeta};
