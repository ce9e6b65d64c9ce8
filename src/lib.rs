//! # verso_db
//!
//! An embeddable versioned object store.
//!
//! verso_db keeps schemaless property-bag objects with their full edit
//! history. Every change appends a new immutable version instead of
//! overwriting the old one, binary attachments are stored once and referenced
//! by name from objects, and the current set of objects can be queried with
//! simple property predicates.
//!
//! ## Core Concepts
//!
//! - **Objects**: property bags identified by a stable UUID
//! - **Versions**: append-only snapshots, numbered 0, 1, 2, ... per object
//! - **Attachments**: immutable blobs with metadata, shared by reference
//! - **Queries**: conjunctions of `equals` / `substring` clauses
//! - **Backends**: swappable persistence (filesystem directory or memory)
//!
//! ## Example
//!
//! ```ignore
//! use verso_db::{Clause, Database, Query};
//! use serde_json::json;
//!
//! let db = Database::open_dir("notes").await?;
//! let note = db.new_object(json!({"name": "todo"}).as_object().cloned()).await?;
//! let id = &note.data[0].uuid;
//! db.update_object_props(id, json!({"done": true}).as_object().cloned()).await?;
//!
//! let hits = db.search(&Query::new().and(Clause::equals("done", true))).await?;
//! ```

pub mod config;
pub mod mime;
pub mod model;
pub mod query;
pub mod store;

mod database;
mod error;

pub use config::{BackendKind, StoreConfig};
pub use database::Database;
pub use error::{Error, Result};
pub use model::{
    Attachment, AttachmentId, AttachmentRef, AttachmentSource, Checksum, ObjectId, ObjectVersion,
    Props, Reply,
};
pub use query::{Clause, ClauseOptions, Op, Query};
pub use store::{
    BlobBackend, FsBlobStore, FsVersionStore, MemoryBlobStore, MemoryVersionStore, VersionBackend,
};
