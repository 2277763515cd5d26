//! Statement builder.
//!
//! Produces parameterized INSERT/SELECT/UPDATE/DELETE statements for any
//! registered [`Table`]. Identifiers come from the registry and are quoted;
//! values never enter the SQL text, they travel as ordered arguments.

use crate::{
    entity::Entity,
    error::Error,
    schema::{ColumnType, ID_COLUMN, Table, quote_ident},
    value::{FieldMap, Value},
};

/// Placeholder style of the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$1, $2, ...`
    Postgres,
    /// `?, ?, ...`
    Sqlite,
}

impl Dialect {
    fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", position),
            Dialect::Sqlite => "?".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    verb: &'static str,
    sql: String,
    args: Vec<Value>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Verb of the statement, for metrics labels.
    pub fn verb(&self) -> &'static str {
        self.verb
    }

    /// SQL text with every placeholder replaced by its literal. Only meant
    /// for logs.
    pub fn to_inline_sql(&self) -> String {
        let literals: Vec<String> = self
            .args
            .iter()
            .map(|v| v.to_sql_literal().unwrap_or_else(|_| "?".to_string()))
            .collect();

        let mut out = String::with_capacity(self.sql.len());
        let mut chars = self.sql.chars().peekable();
        let mut next = 0;
        while let Some(c) = chars.next() {
            match c {
                '?' => {
                    out.push_str(literals.get(next).map(String::as_str).unwrap_or("?"));
                    next += 1;
                }
                '$' if chars.peek().is_some_and(|d| d.is_ascii_digit()) => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(|d| d.is_ascii_digit()) {
                        digits.push(d);
                        chars.next();
                    }
                    let index = digits.parse::<usize>().unwrap_or(0);
                    match index.checked_sub(1).and_then(|i| literals.get(i)) {
                        Some(lit) => out.push_str(lit),
                        None => {
                            out.push('$');
                            out.push_str(&digits);
                        }
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder {
    dialect: Dialect,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `INSERT INTO <table> (<cols>) VALUES (<params>)` with one value per
    /// registered column, in column order.
    pub fn insert(&self, table: &Table, values: Vec<Value>) -> Result<Statement, Error> {
        ensure_columns(table)?;
        if values.len() != table.columns.len() {
            return Err(Error::Validation(format!(
                "{} expects {} values, got {}",
                table.name,
                table.columns.len(),
                values.len()
            )));
        }

        let mut args = Vec::with_capacity(values.len());
        for (column, value) in table.columns.iter().zip(values) {
            args.push(coerce(column.name, column.ty, value)?);
        }

        let columns = table
            .columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let params = (1..=args.len())
            .map(|i| self.dialect.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Statement {
            verb: "insert",
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table.name),
                columns,
                params
            ),
            args,
        })
    }

    pub fn insert_entity<E: Entity>(&self, entity: &E) -> Result<Statement, Error> {
        self.insert(E::KIND.table(), entity.values())
    }

    /// `SELECT * FROM <table> [WHERE ...]`. An empty filter map selects
    /// every row.
    pub fn select(&self, table: &Table, filters: &FieldMap) -> Result<Statement, Error> {
        ensure_columns(table)?;
        let mut args = Vec::new();
        let where_clause = self.where_clause(table, filters, &mut args)?;

        Ok(Statement {
            verb: "select",
            sql: format!("SELECT * FROM {}{}", quote_ident(table.name), where_clause),
            args,
        })
    }

    /// `UPDATE <table> SET ... WHERE _id = <id>`. Returns `None` for an
    /// empty update map; the caller skips execution.
    pub fn update(
        &self,
        table: &Table,
        id: &str,
        updates: &FieldMap,
    ) -> Result<Option<Statement>, Error> {
        ensure_columns(table)?;
        if updates.is_empty() {
            return Ok(None);
        }
        if !table.keyed {
            return Err(Error::Validation(format!(
                "{} has no primary key to update by",
                table.name
            )));
        }

        let mut args = Vec::with_capacity(updates.len() + 1);
        let mut assignments = Vec::with_capacity(updates.len());
        for (name, value) in updates {
            if name == ID_COLUMN {
                return Err(Error::Validation(format!(
                    "{} is immutable on {}",
                    ID_COLUMN, table.name
                )));
            }
            let column = table.column(name).ok_or_else(|| Error::UnknownColumn {
                table: table.name,
                column: name.clone(),
            })?;
            args.push(coerce(column.name, column.ty, value.clone())?);
            assignments.push(format!(
                "{} = {}",
                quote_ident(column.name),
                self.dialect.placeholder(args.len())
            ));
        }
        args.push(Value::Text(id.to_string()));

        Ok(Some(Statement {
            verb: "update",
            sql: format!(
                "UPDATE {} SET {} WHERE {} = {}",
                quote_ident(table.name),
                assignments.join(", "),
                quote_ident(ID_COLUMN),
                self.dialect.placeholder(args.len())
            ),
            args,
        }))
    }

    /// `DELETE FROM <table> [WHERE ...]`, same filter rules as
    /// [`select`](Self::select).
    pub fn delete(&self, table: &Table, filters: &FieldMap) -> Result<Statement, Error> {
        ensure_columns(table)?;
        let mut args = Vec::new();
        let where_clause = self.where_clause(table, filters, &mut args)?;

        Ok(Statement {
            verb: "delete",
            sql: format!("DELETE FROM {}{}", quote_ident(table.name), where_clause),
            args,
        })
    }

    fn where_clause(
        &self,
        table: &Table,
        filters: &FieldMap,
        args: &mut Vec<Value>,
    ) -> Result<String, Error> {
        if filters.is_empty() {
            return Ok(String::new());
        }

        let mut conditions = Vec::with_capacity(filters.len());
        for (name, value) in filters {
            let column = table.column(name).ok_or_else(|| Error::UnknownColumn {
                table: table.name,
                column: name.clone(),
            })?;
            let value = match value {
                Value::Null => Value::Null,
                other => coerce(column.name, column.ty, other.clone())?,
            };
            if value.is_null() {
                conditions.push(format!("{} IS NULL", quote_ident(column.name)));
                continue;
            }
            args.push(value);
            conditions.push(format!(
                "{} = {}",
                quote_ident(column.name),
                self.dialect.placeholder(args.len())
            ));
        }

        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }
}

fn ensure_columns(table: &Table) -> Result<(), Error> {
    if table.columns.is_empty() {
        return Err(Error::UnsupportedEntityKind(table.name.to_string()));
    }
    Ok(())
}

/// Checks a value against its column type, widening ints for float columns.
/// An empty reference id means "no reference" and becomes NULL.
pub(crate) fn coerce(column: &str, ty: ColumnType, value: Value) -> Result<Value, Error> {
    match (ty, value) {
        (ColumnType::Ref(_), Value::Text(id)) if id.is_empty() => Ok(Value::Null),
        (ColumnType::Text, v @ Value::Text(_))
        | (ColumnType::Bool, v @ Value::Bool(_))
        | (ColumnType::Float, v @ Value::Float(_))
        | (ColumnType::Timestamp, v @ Value::Timestamp(_))
        | (ColumnType::Ref(_), v @ (Value::Text(_) | Value::Null)) => Ok(v),
        (ColumnType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (_, other) => Err(Error::UnsupportedValueType {
            column: column.to_string(),
            found: other.type_name(),
        }),
    }
}
