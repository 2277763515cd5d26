use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Layout used for every timestamp written to or read from storage. Keeps
/// the full nanosecond precision of `DateTime<Utc>`.
pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Digits after the decimal point when a float is rendered as a literal.
pub const FLOAT_PRECISION: usize = 6;

/// Column name to value. Ordered, so generated SQL is deterministic.
pub type FieldMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Timestamp(_) => "timestamp",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Renders the value as an inline SQL literal. Used for logging only;
    /// statements always travel with bound arguments.
    pub fn to_sql_literal(&self) -> Result<String, Error> {
        match self {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format!("{:.*}", FLOAT_PRECISION, f)),
            Value::Timestamp(t) => Ok(quote_literal(&format_timestamp(t))),
            Value::Text(s) => Ok(quote_literal(s)),
            Value::List(_) => Err(Error::UnsupportedValueType {
                column: String::new(),
                found: self.type_name(),
            }),
        }
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format(TIMESTAMP_LAYOUT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, Error> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_LAYOUT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Decode(format!("timestamp {:?}: {}", s, e)))
}

pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

/// Absent and empty references both become NULL.
impl ToValue for Option<String> {
    fn to_value(&self) -> Value {
        match self.as_deref() {
            Some(id) if !id.is_empty() => Value::Text(id.to_string()),
            _ => Value::Null,
        }
    }
}

impl ToValue for Vec<String> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(|s| Value::Text(s.clone())).collect())
    }
}

/// Builds a [`FieldMap`] from `column => value` pairs.
///
/// ```rust,ignore
/// let filters = fields! { "email" => "a@b.c", "is_archived" => false };
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::value::FieldMap::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::value::FieldMap::new();
        $(
            map.insert(
                $column.to_string(),
                $crate::value::ToValue::to_value(&$value),
            );
        )+
        map
    }};
}
