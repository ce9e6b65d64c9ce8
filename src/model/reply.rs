//! Uniform result envelope returned by every store operation

use serde::{Deserialize, Serialize};

/// `{success, data}` envelope
///
/// A failed reply always carries an empty `data` list. It signals an expected
/// miss (unknown object, version, attachment or attachment name); real errors
/// travel in the surrounding `Result`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply<T> {
    pub success: bool,
    pub data: Vec<T>,
}

impl<T> Reply<T> {
    /// Successful reply with a single item
    pub fn one(item: T) -> Self {
        Reply {
            success: true,
            data: vec![item],
        }
    }

    /// Successful reply with any number of items
    pub fn many(items: Vec<T>) -> Self {
        Reply {
            success: true,
            data: items,
        }
    }

    /// Failed reply
    pub fn missing() -> Self {
        Reply {
            success: false,
            data: Vec::new(),
        }
    }

    /// First item of a successful reply
    pub fn first(&self) -> Option<&T> {
        if self.success {
            self.data.first()
        } else {
            None
        }
    }

    pub fn into_first(self) -> Option<T> {
        if self.success {
            self.data.into_iter().next()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> From<Option<T>> for Reply<T> {
    fn from(item: Option<T>) -> Self {
        match item {
            Some(item) => Reply::one(item),
            None => Reply::missing(),
        }
    }
}
