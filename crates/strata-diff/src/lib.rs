//! Tensor diff engine for Strata.
//!
//! Compares two dataset states by tensor and sample identity, never by name
//! or index, so renames and reordering never produce spurious changes.
//!
//! # Key Types
//!
//! - [`Revision`]: a sealed commit plus an optional uncommitted overlay
//! - [`TensorDiff`] / [`DiffRecord`]: per-tensor changes from a base to a head
//! - [`SampleDiff`]: added, updated and removed samples, plus the cleared marker

pub mod engine;
pub mod error;
pub mod record;
pub mod revision;

pub use engine::{diff, diff_snapshots, diff_with_cleared};
pub use error::{DiffError, DiffResult};
pub use record::{DiffRecord, DiffSummary, SampleDiff, TensorDiff, TensorStatus};
pub use revision::Revision;
