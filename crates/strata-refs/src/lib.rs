//! Reference management for Strata.
//!
//! Branches are named, mutable pointers to commits. HEAD names the checked
//! out branch, or points directly at a commit when detached. The whole ref
//! state serializes to a [`RefTable`] stored with the dataset's version
//! metadata.
//!
//! # Modules
//!
//! - [`error`]: error types for ref operations
//! - [`types`]: [`Head`], [`BranchInfo`], [`RefTable`]
//! - [`traits`]: the [`RefStore`] trait
//! - [`names`]: branch name validation
//! - [`memory`]: the [`InMemoryRefStore`] backend

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use memory::InMemoryRefStore;
pub use names::validate_branch_name;
pub use traits::RefStore;
pub use types::{BranchInfo, Head, RefTable};
