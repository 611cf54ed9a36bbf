//! Storage abstractions for sky-looper streams.
//!
//! Provides:
//! - A [`RemoteStore`] trait over the public imagery buckets, with an
//!   `object_store` backed implementation (S3 or in-memory)
//! - [`LocalInventory`], the on-disk view used to skip redundant downloads

pub mod error;
pub mod inventory;
pub mod remote;

pub use error::{StorageError, StorageResult};
pub use inventory::LocalInventory;
pub use remote::{ObjectHandle, ObjectStoreRemote, RemoteStore, RemoteStoreConfig};
