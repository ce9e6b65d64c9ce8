//! Object versions - the append-only history of a property bag

use super::AttachmentRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property map carried by objects and attachments
pub type Props = serde_json::Map<String, serde_json::Value>;

/// Stable identifier of an object, shared by all of its versions
///
/// Generated ids are UUIDv7 strings, so sorting ids sorts objects by
/// creation time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    /// Create an object ID from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        ObjectId(id.into())
    }

    /// Generate a fresh, time-ordered object ID
    pub fn generate() -> Self {
        ObjectId(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        ObjectId(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId(s)
    }
}

impl From<&ObjectId> for ObjectId {
    fn from(id: &ObjectId) -> Self {
        id.clone()
    }
}

/// One immutable snapshot of an object
///
/// `props` and `attachments` hold the complete state as of this version,
/// never a diff against the previous one. Records are never rewritten once
/// stored; every mutation produces a successor via [`ObjectVersion::next`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectVersion {
    /// Stable identity across versions
    pub uuid: ObjectId,

    /// Position in the object's chain, starting at 0
    pub version: u64,

    /// Full property set as of this version
    #[serde(default)]
    pub props: Props,

    /// Named attachment references
    #[serde(default, alias = "atts")]
    pub attachments: BTreeMap<String, AttachmentRef>,

    /// Tombstone flag
    #[serde(default)]
    pub deleted: bool,
}

impl ObjectVersion {
    /// Version 0 of a brand new object
    pub fn initial(props: Props) -> Self {
        ObjectVersion {
            uuid: ObjectId::generate(),
            version: 0,
            props,
            attachments: BTreeMap::new(),
            deleted: false,
        }
    }

    /// Copy of this record numbered as its successor, ready to be modified
    pub fn next(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next
    }

    /// Shallow merge: supplied keys overwrite, all other keys are kept
    pub fn merge_props(&mut self, props: Props) {
        for (key, value) in props {
            self.props.insert(key, value);
        }
    }

    /// Look up a property by key
    pub fn prop(&self, key: &str) -> Option<&serde_json::Value> {
        self.props.get(key)
    }
}
