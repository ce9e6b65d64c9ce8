//! Property queries: conjunctions of clauses evaluated against current versions
//!
//! Evaluation is pure and performs no I/O. The store feeds it the current
//! version of every known object (see [`Database::search`](crate::Database::search)).

mod clause;

pub use clause::{Clause, ClauseOptions, Op};

use crate::model::ObjectVersion;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A conjunction of clauses; every clause must pass
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub and: Vec<Clause>,
}

impl Query {
    /// An empty query, which matches every object
    pub fn new() -> Self {
        Query::default()
    }

    /// Add a clause to the conjunction
    pub fn and(mut self, clause: Clause) -> Self {
        self.and.push(clause);
        self
    }

    /// Parse a query from its JSON form
    ///
    /// `{"and": [{"prop": .., "op": "equals" | "substring", "value": .., "options": {..}}]}`.
    /// An unsupported operator, or any other malformed clause, is an
    /// [`Error::InvalidQuery`].
    pub fn from_json(value: &Value) -> Result<Self> {
        Query::deserialize(value).map_err(|e| Error::InvalidQuery(e.to_string()))
    }

    /// Whether every clause passes for this object version
    pub fn matches(&self, object: &ObjectVersion) -> bool {
        self.and.iter().all(|clause| clause.matches(object))
    }

    /// Keep the objects that match, preserving their order
    pub fn filter<'a, I>(&self, objects: I) -> Vec<ObjectVersion>
    where
        I: IntoIterator<Item = &'a ObjectVersion>,
    {
        objects
            .into_iter()
            .filter(|obj| self.matches(obj))
            .cloned()
            .collect()
    }
}
