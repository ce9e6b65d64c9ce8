//! Filesystem backends
//!
//! Directory layout:
//! ```text
//! <base>/
//!   objects/
//!     <object uuid>/
//!       0.json          one pretty-printed version record per file
//!       1.json
//!   attachments/
//!     <attachment uuid>/
//!       attr.json       attachment metadata
//!       blob            raw bytes
//! ```
//!
//! Every file is written to a hidden temporary sibling first and then moved
//! into place, so readers never see a half-written record. Version files are
//! hard-linked into place, which fails instead of replacing an existing one.

use crate::model::{Attachment, AttachmentId, ObjectId, ObjectVersion};
use crate::store::{BlobBackend, VersionBackend};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const OBJECTS_DIR: &str = "objects";
pub const ATTACHMENTS_DIR: &str = "attachments";
const ATTR_FILE: &str = "attr.json";
const BLOB_FILE: &str = "blob";

/// Whether a caller-supplied id can be used as one path component
fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

/// `"<n>.json"` → `n`
fn parse_version_file(name: &str) -> Option<u64> {
    name.strip_suffix(".json")?.parse().ok()
}

fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::now_v7().simple()))
}

async fn write_durable(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

/// Write `data` to `path` unless it already exists; returns false if it did
async fn write_new(dir: &Path, name: &str, data: &[u8]) -> Result<bool> {
    let tmp = temp_path(dir, name);
    write_durable(&tmp, data).await?;

    let linked = fs::hard_link(&tmp, dir.join(name)).await;
    if let Err(e) = fs::remove_file(&tmp).await {
        warn!(path = %tmp.display(), error = %e, "failed to remove temporary file");
    }

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Write `data` to `path`, replacing whatever was there
async fn write_replace(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    let tmp = temp_path(dir, name);
    write_durable(&tmp, data).await?;
    fs::rename(&tmp, dir.join(name)).await?;
    Ok(())
}

/// Read a file, mapping "does not exist" to `None`
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Names of the plain subdirectories of `root`, sorted
async fn list_subdirs(root: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() && is_plain_component(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

async fn remove_tree(root: &Path) -> Result<()> {
    match fs::remove_dir_all(root).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Version records stored as one JSON file per version
pub struct FsVersionStore {
    root: PathBuf,
}

impl FsVersionStore {
    /// Store rooted at `<base>/objects`
    pub fn new(base: impl AsRef<Path>) -> Self {
        FsVersionStore {
            root: base.as_ref().join(OBJECTS_DIR),
        }
    }

    /// Directory holding the object directories
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn object_dir(&self, id: &ObjectId) -> Option<PathBuf> {
        is_plain_component(id.as_str()).then(|| self.root.join(id.as_str()))
    }
}

#[async_trait]
impl VersionBackend for FsVersionStore {
    async fn open(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!(path = %self.root.display(), "opened version store");
        Ok(())
    }

    async fn append_version(&self, record: &ObjectVersion) -> Result<ObjectVersion> {
        let dir = self
            .object_dir(&record.uuid)
            .ok_or_else(|| Error::Corruption(format!("Unusable object id: {:?}", record.uuid.0)))?;
        fs::create_dir_all(&dir).await?;

        let name = format!("{}.json", record.version);
        let data = serde_json::to_vec_pretty(record)?;
        if !write_new(&dir, &name, &data).await? {
            return Err(Error::VersionConflict {
                object: record.uuid.to_string(),
                version: record.version,
            });
        }
        debug!(object = %record.uuid, version = record.version, "wrote version file");

        let raw = fs::read(dir.join(&name)).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn get_versions_by_object(&self, id: &ObjectId) -> Result<Vec<ObjectVersion>> {
        let Some(dir) = self.object_dir(id) else {
            return Ok(Vec::new());
        };
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(number) = parse_version_file(&name) else {
                if !name.starts_with('.') {
                    warn!(object = %id, file = %name, "ignoring unexpected file");
                }
                continue;
            };

            let raw = fs::read(entry.path()).await?;
            let record: ObjectVersion = serde_json::from_slice(&raw)?;
            if record.uuid != *id || record.version != number {
                return Err(Error::Corruption(format!(
                    "{}/{} holds version {} of {}",
                    id, name, record.version, record.uuid
                )));
            }
            versions.push(record);
        }

        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    async fn list_all_object_ids(&self) -> Result<Vec<ObjectId>> {
        Ok(list_subdirs(&self.root)
            .await?
            .into_iter()
            .map(ObjectId::from)
            .collect())
    }

    async fn destroy(&self) -> Result<()> {
        remove_tree(&self.root).await?;
        info!(path = %self.root.display(), "destroyed version store");
        Ok(())
    }
}

/// Attachments stored as a directory with metadata and raw bytes
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Store rooted at `<base>/attachments`
    pub fn new(base: impl AsRef<Path>) -> Self {
        FsBlobStore {
            root: base.as_ref().join(ATTACHMENTS_DIR),
        }
    }

    /// Directory holding the attachment directories
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn attachment_dir(&self, id: &AttachmentId) -> Option<PathBuf> {
        is_plain_component(id.as_str()).then(|| self.root.join(id.as_str()))
    }

    fn require_dir(&self, id: &AttachmentId) -> Result<PathBuf> {
        self.attachment_dir(id)
            .ok_or_else(|| Error::Corruption(format!("Unusable attachment id: {:?}", id.0)))
    }
}

#[async_trait]
impl BlobBackend for FsBlobStore {
    async fn open(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!(path = %self.root.display(), "opened blob store");
        Ok(())
    }

    async fn store_blob(&self, id: &AttachmentId, data: Bytes) -> Result<()> {
        let dir = self.require_dir(id)?;
        fs::create_dir_all(&dir).await?;
        write_replace(&dir, BLOB_FILE, &data).await?;
        debug!(attachment = %id, size = data.len(), "wrote blob");
        Ok(())
    }

    async fn load_blob(&self, id: &AttachmentId) -> Result<Option<Bytes>> {
        let Some(dir) = self.attachment_dir(id) else {
            return Ok(None);
        };
        Ok(read_optional(&dir.join(BLOB_FILE)).await?.map(Bytes::from))
    }

    async fn store_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
        let dir = self.require_dir(&attachment.uuid)?;
        fs::create_dir_all(&dir).await?;
        let data = serde_json::to_vec_pretty(attachment)?;
        write_replace(&dir, ATTR_FILE, &data).await?;
        debug!(attachment = %attachment.uuid, mime = %attachment.mime, "wrote attachment metadata");

        let raw = fs::read(dir.join(ATTR_FILE)).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn load_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>> {
        let Some(dir) = self.attachment_dir(id) else {
            return Ok(None);
        };
        match read_optional(&dir.join(ATTR_FILE)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list_attachment_ids(&self) -> Result<Vec<AttachmentId>> {
        let mut ids = Vec::new();
        for name in list_subdirs(&self.root).await? {
            if fs::metadata(self.root.join(&name).join(ATTR_FILE)).await.is_ok() {
                ids.push(AttachmentId::from(name));
            } else {
                warn!(attachment = %name, "skipping attachment without metadata");
            }
        }
        Ok(ids)
    }

    async fn destroy(&self) -> Result<()> {
        remove_tree(&self.root).await?;
        info!(path = %self.root.display(), "destroyed blob store");
        Ok(())
    }
}
