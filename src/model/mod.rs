//! Core data model types for verso_db

mod attachment;
mod hash;
mod object;
mod reply;

pub use attachment::{Attachment, AttachmentId, AttachmentRef, AttachmentSource};
pub use hash::Checksum;
pub use object::{ObjectId, ObjectVersion, Props};
pub use reply::Reply;
