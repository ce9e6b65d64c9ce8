//! Backend capability traits
//!
//! The [`Database`](crate::Database) orchestrator talks to persistence only
//! through these two traits, so backends are picked at construction time and
//! can be swapped freely.

use crate::model::{Attachment, AttachmentId, ObjectId, ObjectVersion};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Persistence for immutable object-version records
///
/// Implementations must uphold:
/// - A stored `(uuid, version)` pair is never overwritten. Appending a pair
///   that already exists fails with [`Error::VersionConflict`](crate::Error::VersionConflict).
/// - Readers never observe a partially written record.
/// - Listing ids is safe while new objects are being appended.
#[async_trait]
pub trait VersionBackend: Send + Sync {
    /// Prepare the backend for use; idempotent
    async fn open(&self) -> Result<()>;

    /// Persist one version record and return it as stored
    async fn append_version(&self, record: &ObjectVersion) -> Result<ObjectVersion>;

    /// All stored versions of an object, ascending by version number
    ///
    /// Unknown ids yield an empty list.
    async fn get_versions_by_object(&self, id: &ObjectId) -> Result<Vec<ObjectVersion>>;

    /// Every object id with at least one stored version, in creation order
    async fn list_all_object_ids(&self) -> Result<Vec<ObjectId>>;

    /// Release resources; stored data stays in place
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Remove every stored record
    async fn destroy(&self) -> Result<()>;
}

/// Persistence for attachment blobs and their metadata
///
/// The blob of an attachment is always stored before its metadata, and an
/// attachment only counts as existing once its metadata is stored.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Prepare the backend for use; idempotent
    async fn open(&self) -> Result<()>;

    /// Persist the raw bytes of an attachment
    async fn store_blob(&self, id: &AttachmentId, data: Bytes) -> Result<()>;

    /// Raw bytes of an attachment, `None` if never stored
    async fn load_blob(&self, id: &AttachmentId) -> Result<Option<Bytes>>;

    /// Persist attachment metadata and return it as stored
    async fn store_attachment(&self, attachment: &Attachment) -> Result<Attachment>;

    /// Metadata of an attachment, `None` if never stored
    async fn load_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>>;

    /// Every attachment with stored metadata, in creation order
    async fn list_attachment_ids(&self) -> Result<Vec<AttachmentId>>;

    /// Release resources; stored data stays in place
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Remove every stored blob and metadata record
    async fn destroy(&self) -> Result<()>;
}
