use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

const SENTINEL_KEY: &str = ".sv";
const SENTINEL_VALUE: &str = "timestamp";

/// Sentinel value that asks the store to write its own clock.
///
/// Any top-level field of a created document or update patch holding this
/// value is replaced by the store with the write-time UTC timestamp
/// (RFC 3339, nanosecond precision). Client clocks never reach the store.
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SENTINEL_KEY.to_string(), Value::from(SENTINEL_VALUE));
    Value::Object(sentinel)
}

/// Returns true if `value` is the [`server_timestamp`] sentinel.
pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(obj) => {
            obj.len() == 1 && obj.get(SENTINEL_KEY).and_then(Value::as_str) == Some(SENTINEL_VALUE)
        }
        _ => false,
    }
}

/// Replace every top-level sentinel in `doc` with `now`.
pub(crate) fn resolve_server_timestamps(doc: &mut Document, now: &str) {
    for value in doc.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::from(now);
        }
    }
}

/// Encode a serializable value as a document.
///
/// Fails with [`StoreError::InvalidDocument`] if the value does not
/// serialize to a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(StoreError::InvalidDocument(e.to_string())),
    }
}

/// A document as returned by the store, together with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub collection: String,
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    /// Decode into a typed record. The document id is exposed to the record
    /// as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::from(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|e| StoreError::Decode {
            collection: self.collection.clone(),
            id: self.id.clone(),
            message: e.to_string(),
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// An equality-filter query over one collection.
///
/// All filters must match (conjunction). A document missing a filtered field
/// never matches. Ordering uses [`compare_values`]; documents missing the
/// ordering field sort first in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    /// Filter, order and truncate a set of documents.
    pub fn apply(&self, docs: impl IntoIterator<Item = StoredDocument>) -> Vec<StoredDocument> {
        let mut out: Vec<StoredDocument> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();
        if let Some((field, direction)) = &self.order_by {
            out.sort_by(|a, b| {
                let ord = compare_values(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Total order over optional JSON values used for query ordering.
///
/// Missing < null < bool < number < string < anything else. Numbers compare
/// numerically, strings by bytes. Values of other kinds compare equal.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
