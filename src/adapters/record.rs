use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{
    error::Error,
    schema::Table,
    value::{Value, parse_timestamp},
};

/// One decoded row, keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub table: &'static str,
    values: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn new(table: &'static Table) -> Self {
        Self {
            table: table.name,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &'static str, value: Value) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: &'static str, value: Value) {
        self.values.insert(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    fn required(&self, column: &str) -> Result<&Value, Error> {
        match self.values.get(column) {
            Some(Value::Null) | None => Err(Error::Decode(format!(
                "{}.{} is missing",
                self.table, column
            ))),
            Some(value) => Ok(value),
        }
    }

    fn mismatch(&self, column: &str, expected: &str, found: &Value) -> Error {
        Error::Decode(format!(
            "{}.{}: expected {}, found {}",
            self.table,
            column,
            expected,
            found.type_name()
        ))
    }

    pub fn text(&self, column: &str) -> Result<String, Error> {
        let value = self.required(column)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(column, "text", value))
    }

    pub fn bool(&self, column: &str) -> Result<bool, Error> {
        let value = self.required(column)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(column, "bool", value))
    }

    pub fn float(&self, column: &str) -> Result<f64, Error> {
        let value = self.required(column)?;
        value
            .as_float()
            .ok_or_else(|| self.mismatch(column, "float", value))
    }

    /// Accepts a decoded timestamp or its canonical text form.
    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, Error> {
        match self.required(column)? {
            Value::Timestamp(t) => Ok(*t),
            Value::Text(s) => parse_timestamp(s),
            other => Err(self.mismatch(column, "timestamp", other)),
        }
    }

    /// Nullable reference. NULL and the empty string both mean "absent".
    pub fn reference(&self, column: &str) -> Result<Option<String>, Error> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(id)) if id.is_empty() => Ok(None),
            Some(Value::Text(id)) => Ok(Some(id.clone())),
            Some(other) => Err(self.mismatch(column, "reference", other)),
        }
    }
}
