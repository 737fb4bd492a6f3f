//! Storage for Strata datasets.
//!
//! A dataset persists everything through a flat key-value
//! [`StorageProvider`]. On top of it this crate layers:
//!
//! - [`codec`]: framing and compression of individual samples
//! - [`SampleStore`]: content-addressed sample values keyed by [`ObjectId`]
//! - [`WriteBatch`]: multi-key writes that roll back on failure
//! - [`keys`]: the key layout shared by every provider
//!
//! # Providers
//!
//! - [`MemoryProvider`]: `HashMap`-based, for tests and embedding
//! - [`LocalProvider`]: one file per key under a root directory
//!
//! [`ObjectId`]: strata_types::ObjectId

pub mod batch;
pub mod codec;
pub mod error;
pub mod keys;
pub mod local;
pub mod memory;
pub mod samples;
pub mod traits;

pub use batch::WriteBatch;
pub use error::{CodecError, CodecResult, StoreError, StoreResult};
pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use samples::SampleStore;
pub use traits::StorageProvider;
