//! Storage backends
//!
//! Two narrow capabilities, [`VersionBackend`] for object-version records and
//! [`BlobBackend`] for attachment bytes and metadata, each with a filesystem
//! and an in-memory implementation.

mod file_store;
mod memory;
mod traits;

pub use file_store::{FsBlobStore, FsVersionStore, ATTACHMENTS_DIR, OBJECTS_DIR};
pub use memory::{MemoryBlobStore, MemoryVersionStore};
pub use traits::{BlobBackend, VersionBackend};
