//! Commit graph for Strata.
//!
//! Commits are immutable, content-addressed records of the changes between a
//! commit and its first parent. The [`CommitGraph`] links them, materializes
//! their snapshots by replay, and answers the ancestry queries a merge needs
//! (lowest common ancestor, exclusive ancestors, first-parent history).

pub mod commit;
pub mod error;
pub mod graph;

pub use commit::{Commit, CommitRecord, SealedCommit};
pub use error::{GraphError, GraphResult};
pub use graph::CommitGraph;
