//! Single predicates over an object's properties

use crate::model::ObjectVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a clause
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Type-sensitive equality, no coercion
    Equals,
    /// String containment
    Substring,
}

/// Operator-specific options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseOptions {
    /// Case-fold both sides before a substring comparison
    #[serde(default)]
    pub caseinsensitive: bool,
}

/// One predicate: `props[prop] <op> value`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub prop: String,
    pub op: Op,
    pub value: Value,
    #[serde(default)]
    pub options: ClauseOptions,
}

impl Clause {
    pub fn equals(prop: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause {
            prop: prop.into(),
            op: Op::Equals,
            value: value.into(),
            options: ClauseOptions::default(),
        }
    }

    pub fn substring(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Clause {
            prop: prop.into(),
            op: Op::Substring,
            value: Value::String(value.into()),
            options: ClauseOptions::default(),
        }
    }

    /// Make a substring comparison ignore case
    pub fn case_insensitive(mut self) -> Self {
        self.options.caseinsensitive = true;
        self
    }

    /// Evaluate against the properties of one object version
    ///
    /// A property that is absent never matches, whatever the operator.
    pub fn matches(&self, object: &ObjectVersion) -> bool {
        let Some(prop) = object.prop(&self.prop) else {
            return false;
        };

        match self.op {
            Op::Equals => *prop == self.value,
            Op::Substring => match (prop.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) if self.options.caseinsensitive => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }
}
