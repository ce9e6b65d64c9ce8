//! High-level Database API
//!
//! [`Database`] is the versioned object store: it composes a
//! [`VersionBackend`], a [`BlobBackend`] and the query engine into the
//! create / update / attach / query operations.
//!
//! Every mutation reads the current version, copies it, applies the change
//! and appends the copy as `version + 1`. Mutations of one object are
//! serialised by a per-object async lock held for the whole
//! read-modify-write, and backends refuse to store a version number twice,
//! so concurrent writers can never produce colliding versions.
//!
//! Reads are served from an in-memory cache of every version chain. The
//! cache belongs to one `Database`, is rebuilt from the backends on open and
//! is only updated after a backend write has succeeded.

use crate::config::{BackendKind, StoreConfig};
use crate::mime;
use crate::model::{
    Attachment, AttachmentId, AttachmentRef, AttachmentSource, ObjectId, ObjectVersion, Props,
    Reply,
};
use crate::query::Query;
use crate::store::{
    BlobBackend, FsBlobStore, FsVersionStore, MemoryBlobStore, MemoryVersionStore, VersionBackend,
};
use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The main database interface
pub struct Database {
    versions: Arc<dyn VersionBackend>,
    blobs: Arc<dyn BlobBackend>,
    cache: RwLock<Cache>,
    /// Per-object mutation locks
    locks: Mutex<HashMap<ObjectId, Arc<tokio::sync::Mutex<()>>>>,
    opened: RwLock<bool>,
    delete_on_exit: bool,
    /// Base directory removed by `destroy` for filesystem stores
    root: Option<PathBuf>,
}

/// Mirror of everything committed to the backends
#[derive(Default)]
struct Cache {
    /// Object ids, sorted; generated ids sort by creation time
    order: Vec<ObjectId>,
    chains: HashMap<ObjectId, Vec<ObjectVersion>>,
    attachments: HashMap<AttachmentId, Attachment>,
}

impl Cache {
    fn current(&self, id: &ObjectId) -> Option<&ObjectVersion> {
        self.chains.get(id).and_then(|chain| chain.last())
    }

    fn push(&mut self, record: ObjectVersion) {
        if !self.chains.contains_key(&record.uuid) {
            let pos = self.order.partition_point(|id| id < &record.uuid);
            self.order.insert(pos, record.uuid.clone());
        }
        let chain = self.chains.entry(record.uuid.clone()).or_default();
        let pos = chain.partition_point(|v| v.version < record.version);
        chain.insert(pos, record);
    }
}

impl Database {
    /// Open the store described by `config`
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let mut db = match config.backend {
            BackendKind::Filesystem => {
                let mut db = Self::new(
                    Arc::new(FsVersionStore::new(&config.base_dir)),
                    Arc::new(FsBlobStore::new(&config.base_dir)),
                );
                db.root = Some(config.base_dir.clone());
                db
            }
            BackendKind::Memory => Self::new(
                Arc::new(MemoryVersionStore::new()),
                Arc::new(MemoryBlobStore::new()),
            ),
        };
        db.delete_on_exit = config.delete_on_exit;
        db.load().await?;
        Ok(db)
    }

    /// Open (or create) a filesystem store rooted at `path`
    pub async fn open_dir(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StoreConfig::filesystem(path.as_ref())).await
    }

    /// Open a fresh in-memory store
    pub async fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::memory()).await
    }

    /// Open a store over caller-provided backends
    pub async fn with_backends(
        versions: Arc<dyn VersionBackend>,
        blobs: Arc<dyn BlobBackend>,
    ) -> Result<Self> {
        let db = Self::new(versions, blobs);
        db.load().await?;
        Ok(db)
    }

    fn new(versions: Arc<dyn VersionBackend>, blobs: Arc<dyn BlobBackend>) -> Self {
        Database {
            versions,
            blobs,
            cache: RwLock::new(Cache::default()),
            locks: Mutex::new(HashMap::new()),
            opened: RwLock::new(false),
            delete_on_exit: false,
            root: None,
        }
    }

    /// Open the backends and rebuild the cache from them
    async fn load(&self) -> Result<()> {
        self.versions.open().await?;
        self.blobs.open().await?;

        let mut cache = Cache::default();
        for id in self.versions.list_all_object_ids().await? {
            for record in self.versions.get_versions_by_object(&id).await? {
                cache.push(record);
            }
        }
        for id in self.blobs.list_attachment_ids().await? {
            if let Some(attachment) = self.blobs.load_attachment(&id).await? {
                cache.attachments.insert(id, attachment);
            }
        }

        info!(
            objects = cache.order.len(),
            attachments = cache.attachments.len(),
            "opened store"
        );
        *self.cache.write() = cache;
        *self.opened.write() = true;
        Ok(())
    }

    /// Close the store; with `delete_on_exit` all data is removed as well
    pub async fn close(&self) -> Result<()> {
        if self.delete_on_exit {
            return self.destroy().await;
        }
        *self.opened.write() = false;
        self.versions.close().await?;
        self.blobs.close().await?;
        info!("closed store");
        Ok(())
    }

    /// Close the store and remove every object, version and attachment
    pub async fn destroy(&self) -> Result<()> {
        *self.opened.write() = false;
        self.versions.destroy().await?;
        self.blobs.destroy().await?;
        *self.cache.write() = Cache::default();
        self.locks.lock().clear();

        if let Some(root) = &self.root {
            match tokio::fs::remove_dir_all(root).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!("destroyed store");
        Ok(())
    }

    /// Whether the store accepts operations
    pub fn is_open(&self) -> bool {
        *self.opened.read()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }

    // === Object Operations ===

    /// Create version 0 of a new object
    pub async fn new_object(&self, props: Option<Props>) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        let record = ObjectVersion::initial(props.unwrap_or_default());
        let stored = self.append(record).await?;
        Ok(Reply::one(stored))
    }

    /// Shallow-merge `props` into the current props as a new version
    pub async fn update_object_props(
        &self,
        id: &ObjectId,
        props: Option<Props>,
    ) -> Result<Reply<ObjectVersion>> {
        self.mutate(id, move |next| {
            if let Some(props) = props {
                next.merge_props(props);
            }
        })
        .await
    }

    /// Append a tombstone version; history stays retrievable
    pub async fn delete_object(&self, id: &ObjectId) -> Result<Reply<ObjectVersion>> {
        self.mutate(id, |next| next.deleted = true).await
    }

    /// Current (highest) version of an object
    pub async fn get_object(&self, id: &ObjectId) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        Ok(self.current(id).into())
    }

    /// One specific version of an object
    pub async fn get_object_by_version(
        &self,
        id: &ObjectId,
        version: u64,
    ) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        let cache = self.cache.read();
        let found = cache
            .chains
            .get(id)
            .and_then(|chain| chain.iter().find(|v| v.version == version))
            .cloned();
        Ok(found.into())
    }

    /// Full history of an object, ascending by version
    pub async fn get_object_versions(&self, id: &ObjectId) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        let cache = self.cache.read();
        Ok(match cache.chains.get(id) {
            Some(chain) if !chain.is_empty() => Reply::many(chain.clone()),
            _ => Reply::missing(),
        })
    }

    /// Current version of every object in creation order, tombstones included
    pub async fn get_all_objects(&self) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        Ok(Reply::many(self.snapshot()))
    }

    /// Number of known objects, tombstones included
    pub fn object_count(&self) -> usize {
        self.cache.read().order.len()
    }

    // === Attachment Operations ===

    /// Store a new blob and its metadata, independent of any object
    ///
    /// A string `mime` entry in `props` overrides extension-based detection.
    pub async fn new_attachment(
        &self,
        props: Option<Props>,
        source: AttachmentSource,
    ) -> Result<Reply<Attachment>> {
        self.ensure_open()?;
        let props = props.unwrap_or_default();
        let data = source.read().await?;

        let explicit = props.get("mime").and_then(|m| m.as_str());
        let mime = mime::detect(explicit, source.hint().as_deref());
        let attachment = Attachment::new(&data, mime, props);

        // Blob first: metadata must never point at bytes that were not stored
        self.blobs.store_blob(&attachment.uuid, data).await?;
        let stored = self.blobs.store_attachment(&attachment).await?;
        debug!(attachment = %stored.uuid, size = stored.size, mime = %stored.mime, "created attachment");

        self.cache
            .write()
            .attachments
            .insert(stored.uuid.clone(), stored.clone());
        Ok(Reply::one(stored))
    }

    /// Reference `attachment` from the object under `name`
    ///
    /// Replaces any reference already stored under that name. Fails when
    /// either the object or the attachment is unknown to this store.
    pub async fn add_attachment(
        &self,
        id: &ObjectId,
        name: &str,
        attachment: &Attachment,
    ) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        let reference = match self.require_attachment(&attachment.uuid) {
            Ok(stored) => stored.to_ref(),
            Err(e) => return into_reply(Err(e)),
        };
        let name = name.to_string();
        self.mutate(id, move |next| {
            next.attachments.insert(name, reference);
        })
        .await
    }

    /// Drop the reference stored under `name`
    ///
    /// Always appends a version, even when no such reference existed. The
    /// attachment itself is untouched.
    pub async fn remove_attachment(&self, id: &ObjectId, name: &str) -> Result<Reply<ObjectVersion>> {
        let name = name.to_string();
        self.mutate(id, move |next| {
            next.attachments.remove(&name);
        })
        .await
    }

    /// Reference stored under `name` on the object's current version
    pub async fn get_attachment(&self, id: &ObjectId, name: &str) -> Result<Reply<AttachmentRef>> {
        self.ensure_open()?;
        let cache = self.cache.read();
        let found = cache
            .current(id)
            .and_then(|current| current.attachments.get(name))
            .cloned();
        Ok(found.into())
    }

    /// Metadata of an attachment
    pub async fn get_attachment_info(&self, id: &AttachmentId) -> Result<Reply<Attachment>> {
        self.ensure_open()?;
        Ok(self.attachment(id).into())
    }

    /// Raw bytes of an attachment, bypassing objects entirely
    pub async fn get_attachment_data(&self, id: &AttachmentId) -> Result<Reply<Bytes>> {
        self.ensure_open()?;
        let attachment = match self.require_attachment(id) {
            Ok(attachment) => attachment,
            Err(e) => return into_reply(Err(e)),
        };

        let data = self
            .blobs
            .load_blob(id)
            .await?
            .ok_or_else(|| Error::Corruption(format!("Blob of attachment {} is missing", id)))?;
        attachment.verify(&data)?;
        Ok(Reply::one(data))
    }

    // === Search Operations ===

    /// Current versions matching every clause of `query`, in creation order
    pub async fn search(&self, query: &Query) -> Result<Reply<ObjectVersion>> {
        self.ensure_open()?;
        let current = self.snapshot();
        Ok(Reply::many(query.filter(&current)))
    }

    // === Internals ===

    fn current(&self, id: &ObjectId) -> Option<ObjectVersion> {
        self.cache.read().current(id).cloned()
    }

    fn snapshot(&self) -> Vec<ObjectVersion> {
        let cache = self.cache.read();
        cache
            .order
            .iter()
            .filter_map(|id| cache.current(id).cloned())
            .collect()
    }

    fn attachment(&self, id: &AttachmentId) -> Option<Attachment> {
        self.cache.read().attachments.get(id).cloned()
    }

    fn require_attachment(&self, id: &AttachmentId) -> Result<Attachment> {
        self.attachment(id)
            .ok_or_else(|| Error::NotFound(format!("attachment {}", id)))
    }

    fn require_current(&self, id: &ObjectId) -> Result<ObjectVersion> {
        self.current(id)
            .ok_or_else(|| Error::NotFound(format!("object {}", id)))
    }

    fn object_lock(&self, id: &ObjectId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(id.clone()).or_default().clone()
    }

    /// Read-modify-write of one object under its mutation lock
    async fn mutate<F>(&self, id: &ObjectId, change: F) -> Result<Reply<ObjectVersion>>
    where
        F: FnOnce(&mut ObjectVersion) + Send,
    {
        self.ensure_open()?;
        into_reply(self.try_mutate(id, change).await)
    }

    async fn try_mutate<F>(&self, id: &ObjectId, change: F) -> Result<ObjectVersion>
    where
        F: FnOnce(&mut ObjectVersion) + Send,
    {
        // Unknown ids never get a lock entry
        self.require_current(id)?;
        let lock = self.object_lock(id);
        let _guard = lock.lock().await;

        let mut next = self.require_current(id)?.next();
        change(&mut next);
        self.append(next).await
    }

    async fn append(&self, record: ObjectVersion) -> Result<ObjectVersion> {
        let stored = self.versions.append_version(&record).await?;
        debug!(object = %stored.uuid, version = stored.version, "appended version");
        self.cache.write().push(stored.clone());
        Ok(stored)
    }
}

/// Expected misses become a failed reply; every other error propagates
fn into_reply<T>(result: Result<T>) -> Result<Reply<T>> {
    match result {
        Ok(item) => Ok(Reply::one(item)),
        Err(Error::NotFound(what)) => {
            debug!(%what, "not found");
            Ok(Reply::missing())
        }
        Err(e) => Err(e),
    }
}
