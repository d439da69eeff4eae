//! Row values and primary keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A row as fetched from or delivered by the store.
///
/// Rows are schemaless at this layer: a map from column name to JSON
/// value, in whatever shape the store returns.
pub type Row = serde_json::Map<String, Value>;

/// Primitive value identifying one row through its primary-key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    /// Textual key (UUID, slug, natural key).
    Text(String),
    /// Integer key (serial, bigint).
    Int(i64),
}

impl RowKey {
    /// Returns true if the given column value equals this key.
    ///
    /// Used for equality filters on change events: a text key matches a
    /// JSON string, an integer key matches a JSON integer.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (RowKey::Text(key), Value::String(s)) => key == s,
            (RowKey::Int(key), Value::Number(n)) => n.as_i64() == Some(*key),
            _ => false,
        }
    }

    /// Converts the key to the JSON value stored in the key column.
    pub fn to_value(&self) -> Value {
        match self {
            RowKey::Text(s) => Value::String(s.clone()),
            RowKey::Int(i) => Value::Number((*i).into()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Text(s) => write!(f, "{s}"),
            RowKey::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        RowKey::Text(value.to_string())
    }
}

impl From<String> for RowKey {
    fn from(value: String) -> Self {
        RowKey::Text(value)
    }
}

impl From<i64> for RowKey {
    fn from(value: i64) -> Self {
        RowKey::Int(value)
    }
}
