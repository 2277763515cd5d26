use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use sqlx::{
    Row, Sqlite, SqliteConnection, Transaction,
    pool::PoolConnection,
    query::Query,
    sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow},
};

use crate::{
    adapters::{Adapter, Record, Session},
    error::Error,
    schema::{ColumnType, Table, bootstrap_sql},
    statement::{Dialect, Statement},
    value::{Value, format_timestamp, parse_timestamp},
};

/// SQLite adapter with the same table layout as the Postgres one. Floats are
/// `REAL`, timestamps are canonical `TEXT`.
pub struct SqliteAdapter {
    pub(crate) pool: SqlitePool,
}

impl SqliteAdapter {
    /// Create a new SQLite adapter from a `sqlite:` url
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new SQLite adapter with an in-memory database.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// the database lives and dies with it.
    pub async fn new_memory() -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn init_schema(&self) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::Execution(err.to_string()))?;

        for ddl in bootstrap_sql(Dialect::Sqlite) {
            sqlx::query(&ddl)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Execution(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        tracing::info!(dialect = "sqlite", "schema ready");
        Ok(())
    }

    async fn acquire(&self) -> Result<Box<dyn Session>, Error> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;
        Ok(Box::new(SqliteSession::Pooled(conn)))
    }

    async fn begin(&self) -> Result<Box<dyn Session>, Error> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;
        Ok(Box::new(SqliteSession::Tx(tx)))
    }
}

enum SqliteSession {
    Pooled(PoolConnection<Sqlite>),
    Tx(Transaction<'static, Sqlite>),
}

impl SqliteSession {
    fn conn(&mut self) -> &mut SqliteConnection {
        match self {
            SqliteSession::Pooled(conn) => &mut **conn,
            SqliteSession::Tx(tx) => &mut **tx,
        }
    }
}

#[async_trait]
impl Session for SqliteSession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, Error> {
        let start = Instant::now();
        tracing::debug!(sql = %statement.to_inline_sql(), args = statement.args().len(), "execute");

        let query = bind_args(sqlx::query(statement.sql()), statement.args())?;
        let result = query
            .execute(self.conn())
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        histogram!("trackstore.statement.duration_ms",
            "verb" => statement.verb()
        )
        .record(start.elapsed().as_millis() as f64);
        Ok(result.rows_affected())
    }

    async fn fetch_all(
        &mut self,
        statement: &Statement,
        table: &'static Table,
    ) -> Result<Vec<Record>, Error> {
        let start = Instant::now();
        tracing::debug!(sql = %statement.to_inline_sql(), args = statement.args().len(), "fetch");

        let query = bind_args(sqlx::query(statement.sql()), statement.args())?;
        let rows = query
            .fetch_all(self.conn())
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        histogram!("trackstore.statement.duration_ms",
            "verb" => statement.verb()
        )
        .record(start.elapsed().as_millis() as f64);
        rows.iter().map(|row| map_row_to_record(row, table)).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        match *self {
            SqliteSession::Tx(tx) => tx
                .commit()
                .await
                .map_err(|e| Error::Execution(e.to_string())),
            SqliteSession::Pooled(_) => Ok(()),
        }
    }
}

fn bind_args<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &[Value],
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, Error> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Timestamp(t) => query.bind(format_timestamp(t)),
            Value::Text(s) => query.bind(s.clone()),
            Value::List(_) => {
                return Err(Error::UnsupportedValueType {
                    column: String::new(),
                    found: arg.type_name(),
                });
            }
        };
    }
    Ok(query)
}

fn map_row_to_record(row: &SqliteRow, table: &'static Table) -> Result<Record, Error> {
    let mut record = Record::new(table);
    for column in table.columns {
        let value = match column.ty {
            ColumnType::Text | ColumnType::Ref(_) => row
                .try_get::<Option<String>, _>(column.name)
                .map(|v| v.map(Value::Text)),
            ColumnType::Bool => row
                .try_get::<Option<bool>, _>(column.name)
                .map(|v| v.map(Value::Bool)),
            ColumnType::Float => row
                .try_get::<Option<f64>, _>(column.name)
                .map(|v| v.map(Value::Float)),
            ColumnType::Timestamp => match row.try_get::<Option<String>, _>(column.name) {
                Ok(Some(text)) => Ok(Some(Value::Timestamp(parse_timestamp(&text)?))),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
        }
        .map_err(|e| Error::Decode(e.to_string()))?;
        record.push(column.name, value.unwrap_or(Value::Null));
    }
    Ok(record)
}
