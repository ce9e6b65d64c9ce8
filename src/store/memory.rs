//! In-memory backends
//!
//! Everything lives in process memory behind `RwLock`s. Data survives
//! `close`/`open` cycles of the same backend instance, which makes these the
//! stand-in for a key/value store owned by the host application. They are
//! also what the test-suite uses when the on-disk layout does not matter.

use crate::model::{Attachment, AttachmentId, ObjectId, ObjectVersion};
use crate::store::{BlobBackend, VersionBackend};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct VersionTable {
    /// Object ids in order of first append
    order: Vec<ObjectId>,
    chains: HashMap<ObjectId, Vec<ObjectVersion>>,
}

/// Version records held in memory
#[derive(Default)]
pub struct MemoryVersionStore {
    table: RwLock<VersionTable>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored version records
    pub fn len(&self) -> usize {
        self.table.read().chains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VersionBackend for MemoryVersionStore {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn append_version(&self, record: &ObjectVersion) -> Result<ObjectVersion> {
        let mut table = self.table.write();
        let VersionTable { order, chains } = &mut *table;

        let chain = chains.entry(record.uuid.clone()).or_insert_with(|| {
            order.push(record.uuid.clone());
            Vec::new()
        });
        if chain.iter().any(|v| v.version == record.version) {
            return Err(Error::VersionConflict {
                object: record.uuid.to_string(),
                version: record.version,
            });
        }

        let pos = chain.partition_point(|v| v.version < record.version);
        chain.insert(pos, record.clone());
        Ok(record.clone())
    }

    async fn get_versions_by_object(&self, id: &ObjectId) -> Result<Vec<ObjectVersion>> {
        Ok(self.table.read().chains.get(id).cloned().unwrap_or_default())
    }

    async fn list_all_object_ids(&self) -> Result<Vec<ObjectId>> {
        Ok(self.table.read().order.clone())
    }

    async fn destroy(&self) -> Result<()> {
        *self.table.write() = VersionTable::default();
        Ok(())
    }
}

#[derive(Default)]
struct BlobTable {
    blobs: HashMap<AttachmentId, Bytes>,
    /// Attachment ids in order of metadata insertion
    order: Vec<AttachmentId>,
    attachments: HashMap<AttachmentId, Attachment>,
}

/// Attachment blobs and metadata held in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    table: RwLock<BlobTable>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes across all stored blobs
    pub fn total_bytes(&self) -> u64 {
        self.table
            .read()
            .blobs
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }
}

#[async_trait]
impl BlobBackend for MemoryBlobStore {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn store_blob(&self, id: &AttachmentId, data: Bytes) -> Result<()> {
        self.table.write().blobs.insert(id.clone(), data);
        Ok(())
    }

    async fn load_blob(&self, id: &AttachmentId) -> Result<Option<Bytes>> {
        Ok(self.table.read().blobs.get(id).cloned())
    }

    async fn store_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
        let mut table = self.table.write();
        if table
            .attachments
            .insert(attachment.uuid.clone(), attachment.clone())
            .is_none()
        {
            table.order.push(attachment.uuid.clone());
        }
        Ok(attachment.clone())
    }

    async fn load_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>> {
        Ok(self.table.read().attachments.get(id).cloned())
    }

    async fn list_attachment_ids(&self) -> Result<Vec<AttachmentId>> {
        Ok(self.table.read().order.clone())
    }

    async fn destroy(&self) -> Result<()> {
        *self.table.write() = BlobTable::default();
        Ok(())
    }
}
