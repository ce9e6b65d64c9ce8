//! Attachments - immutable blobs with metadata, referenced by name from objects

use super::{Checksum, Props};
use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of an attachment, independent of any object
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(pub String);

impl AttachmentId {
    pub fn new(id: impl Into<String>) -> Self {
        AttachmentId(id.into())
    }

    /// Generate a fresh, time-ordered attachment ID
    pub fn generate() -> Self {
        AttachmentId(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttachmentId {
    fn from(s: &str) -> Self {
        AttachmentId(s.to_string())
    }
}

impl From<String> for AttachmentId {
    fn from(s: String) -> Self {
        AttachmentId(s)
    }
}

/// Attachment metadata, fixed at creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub uuid: AttachmentId,

    /// Blob length in bytes
    pub size: u64,

    /// Content type
    pub mime: String,

    /// Arbitrary caller metadata
    #[serde(default)]
    pub props: Props,

    /// Digest of the blob; absent in metadata written by older stores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
}

impl Attachment {
    /// Describe a freshly read blob
    pub fn new(data: &[u8], mime: impl Into<String>, props: Props) -> Self {
        Attachment {
            uuid: AttachmentId::generate(),
            size: data.len() as u64,
            mime: mime.into(),
            props,
            checksum: Some(Checksum::digest(data)),
        }
    }

    /// The lightweight reference stored inside object versions
    pub fn to_ref(&self) -> AttachmentRef {
        AttachmentRef {
            uuid: self.uuid.clone(),
            mime: self.mime.clone(),
            size: self.size,
        }
    }

    /// Check a loaded blob against this metadata
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.size {
            return Err(crate::Error::Corruption(format!(
                "Blob {} has {} bytes, expected {}",
                self.uuid,
                data.len(),
                self.size
            )));
        }
        if let Some(checksum) = &self.checksum {
            if !checksum.verify(data) {
                return Err(crate::Error::Corruption(format!(
                    "Blob {} does not match checksum {}",
                    self.uuid,
                    checksum.short()
                )));
            }
        }
        Ok(())
    }
}

/// Pointer from an object version to an attachment; does not own the blob
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub uuid: AttachmentId,
    pub mime: String,
    pub size: u64,
}

/// Where the bytes of a new attachment come from
#[derive(Clone, Debug)]
pub enum AttachmentSource {
    /// A file on the local filesystem
    Path(PathBuf),
    /// An in-memory buffer, optionally named for MIME detection
    Bytes { data: Bytes, name: Option<String> },
}

impl AttachmentSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        AttachmentSource::Path(path.into())
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        AttachmentSource::Bytes {
            data: data.into(),
            name: None,
        }
    }

    pub fn named_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        AttachmentSource::Bytes {
            data: data.into(),
            name: Some(name.into()),
        }
    }

    /// File name used for extension-based MIME detection
    pub fn hint(&self) -> Option<String> {
        match self {
            AttachmentSource::Path(path) => Some(path.to_string_lossy().into_owned()),
            AttachmentSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// Read the full source into memory
    pub async fn read(&self) -> Result<Bytes> {
        match self {
            AttachmentSource::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
            AttachmentSource::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}
