//! The record data model: single records, keyed collections, write
//! payloads, and the null-marker sentinel used for negative caching.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::{RowCacheError, RowCacheResult};

/// Sentinel cached value for a confirmed-absent source-of-truth lookup.
pub const NIL_VALUE: &str = "NIL_VALUE";

/// Reserved hash field carrying the null marker on list-shaped keys.
pub const NIL_KEY: &str = "NIL_KEY";

/// One row of domain data: field name to scalar/array value.
pub type Record = serde_json::Map<String, Value>;

/// A keyed collection of records: sub-key to record, stored as one hash.
pub type RecordSet = BTreeMap<String, Record>;

/// Storage shape of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One key maps to exactly one record.
    Single,
    /// One key maps to a hash of sub-key to record.
    List,
}

impl Shape {
    /// Returns `true` for the collection shape.
    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::List)
    }
}

/// Outcome of a cache read.
///
/// `Miss` is "nothing cached"; `Nil` is the null marker, a cached statement
/// that the source of truth has nothing for this key. The two must never be
/// conflated: a `Nil` hit short-circuits the source lookup, a `Miss` does
/// not.
#[derive(Debug, Clone, PartialEq)]
pub enum Cached {
    /// Nothing cached under the key.
    Miss,
    /// The null marker is cached.
    Nil,
    /// A single record.
    Single(Record),
    /// A keyed collection of records.
    List(RecordSet),
}

impl Cached {
    /// Returns `true` when nothing is cached.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Returns `true` when the null marker is cached.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns `true` for a usable hit (single record or collection).
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Single(_) | Self::List(_))
    }

    /// Extracts the single record, if that is what is cached.
    #[must_use]
    pub fn into_single(self) -> Option<Record> {
        match self {
            Self::Single(record) => Some(record),
            _ => None,
        }
    }

    /// Extracts the collection, if that is what is cached.
    #[must_use]
    pub fn into_list(self) -> Option<RecordSet> {
        match self {
            Self::List(set) => Some(set),
            _ => None,
        }
    }
}

/// Input to a cache write.
///
/// A bare record targeted at a list-shaped key is treated as a one-element
/// list, so callers never need to wrap single rows themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Write the null marker (negative-cache the key).
    Nil,
    /// One record.
    One(Record),
    /// A list of records.
    Many(Vec<Record>),
}

impl Payload {
    /// Returns `true` when this payload is the null marker.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Normalizes the payload to a list of records.
    ///
    /// Returns `None` for the null marker.
    #[must_use]
    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            Self::Nil => None,
            Self::One(record) => Some(vec![record]),
            Self::Many(records) => Some(records),
        }
    }
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Self::One(record)
    }
}

impl From<Vec<Record>> for Payload {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records)
    }
}

/// An additive field update applied during a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Increment {
    /// Field receiving the increment.
    pub field: String,
    /// Amount added to the current value.
    pub by: i64,
}

impl Increment {
    /// Creates a new increment.
    #[must_use]
    pub fn new<T: Into<String>>(field: T, by: i64) -> Self {
        Self {
            field: field.into(),
            by,
        }
    }
}

/// Renders a scalar value as a key segment or hash field name.
///
/// Strings pass through unquoted; compound values fall back to their JSON
/// text.
#[must_use]
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Derives a record's hash field from its sub-key field.
///
/// A record written to a list-shaped key must carry its identifying value.
pub fn sub_key_of(record: &Record, field: &str) -> RowCacheResult<String> {
    match record.get(field) {
        None | Some(Value::Null) => Err(RowCacheError::missing_argument(field)),
        Some(value) => Ok(scalar_string(value)),
    }
}

/// Field-merges `patch` over `base`; patch fields win.
#[must_use]
pub fn merge_fields(mut base: Record, patch: Record) -> Record {
    for (field, value) in patch {
        base.insert(field, value);
    }
    base
}
