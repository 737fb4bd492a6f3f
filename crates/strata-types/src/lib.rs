//! Foundation types for Strata, version control for tensor datasets.
//!
//! Every other Strata crate depends on `strata-types`. The crate is pure data
//! plus the replay rules that turn a list of [`Change`]s into a [`Snapshot`].
//!
//! # Key Types
//!
//! - [`ObjectId`]: content-addressed identifier (BLAKE3 hash), used for commits and sample values
//! - [`ContentHasher`]: domain-separated hasher producing `ObjectId`s
//! - [`TensorId`] / [`SampleId`]: stable identities that survive renames and reordering
//! - [`IdentityTracker`]: dataset-global allocator for those identities
//! - [`Array`]: a dense, typed, n-dimensional sample value
//! - [`TensorMeta`]: htype, sample compression and identity tracking of a tensor
//! - [`Snapshot`]: the full tensor state of a revision
//! - [`Change`]: one recorded mutation, replayable onto a snapshot

pub mod array;
pub mod change;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod object;
pub mod snapshot;
pub mod tensor;

pub use array::{Array, Dtype};
pub use change::Change;
pub use error::{TypeError, TypeResult};
pub use hasher::ContentHasher;
pub use identity::{IdentityTracker, SampleId, TensorId};
pub use object::ObjectId;
pub use snapshot::{SampleSlot, Snapshot, TensorState};
pub use tensor::{Compression, Htype, TensorMeta};
