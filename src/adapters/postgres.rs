use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use sqlx::{
    PgConnection, PgPool, Postgres, Row, Transaction,
    pool::PoolConnection,
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::Query,
};

use crate::{
    adapters::{Adapter, Record, Session},
    error::Error,
    schema::{ColumnType, Table, bootstrap_sql},
    statement::{Dialect, Statement},
    value::{Value, format_timestamp, parse_timestamp},
};

/// PostgreSQL adapter over one table per entity kind plus the junction
/// tables.
///
/// Schema (excerpt):
/// ```sql
/// CREATE TABLE IF NOT EXISTS "project" (
///     "_id" TEXT PRIMARY KEY,
///     "name" TEXT NOT NULL,
///     ...
///     "client_id" TEXT,
///     "workspace_id" TEXT
/// );
/// CREATE TABLE IF NOT EXISTS "project_team_member" (
///     "project_id" TEXT NOT NULL,
///     "team_member_id" TEXT NOT NULL
/// );
/// ```
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
}

impl PostgresAdapter {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn init_schema(&self) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::Execution(err.to_string()))?;

        for ddl in bootstrap_sql(Dialect::Postgres) {
            sqlx::query(&ddl)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Execution(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        tracing::info!(dialect = "postgres", "schema ready");
        Ok(())
    }

    async fn acquire(&self) -> Result<Box<dyn Session>, Error> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;
        Ok(Box::new(PgSession::Pooled(conn)))
    }

    async fn begin(&self) -> Result<Box<dyn Session>, Error> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;
        Ok(Box::new(PgSession::Tx(tx)))
    }
}

enum PgSession {
    Pooled(PoolConnection<Postgres>),
    Tx(Transaction<'static, Postgres>),
}

impl PgSession {
    fn conn(&mut self) -> &mut PgConnection {
        match self {
            PgSession::Pooled(conn) => &mut **conn,
            PgSession::Tx(tx) => &mut **tx,
        }
    }
}

#[async_trait]
impl Session for PgSession {
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
            PgSession::Tx(tx) => tx
                .commit()
                .await
                .map_err(|e| Error::Execution(e.to_string())),
            PgSession::Pooled(_) => Ok(()),
        }
    }
}

fn bind_args<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[Value],
) -> Result<Query<'q, Postgres, PgArguments>, Error> {
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

fn map_row_to_record(row: &PgRow, table: &'static Table) -> Result<Record, Error> {
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
