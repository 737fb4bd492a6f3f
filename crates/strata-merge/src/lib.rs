//! Merge engine for Strata.
//!
//! Implements three-way merge of tensor datasets: both sides are diffed
//! against their lowest common ancestor, disagreements are classified and
//! settled under a [`ConflictResolution`] policy, and the resulting plan is
//! sealed as a two-parent commit by the [`MergeOrchestrator`].

mod alias;
pub mod conflict;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod policy;
pub mod resolver;

pub use conflict::{Conflict, ConflictKind};
pub use error::{MergeError, MergeResult};
pub use orchestrator::{
    AppliedMerge, MergeCommitter, MergeOrchestrator, MergeOutcome, MergeReport, MergeRequest,
    MergeState,
};
pub use plan::MergePlan;
pub use policy::{ConflictResolution, MergeOptions, Side};
pub use resolver::{ConflictResolver, MergeInput, Resolution};
