#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod record;

use async_trait::async_trait;
pub use record::*;

use crate::{
    error::Error,
    schema::Table,
    statement::{Dialect, Statement, StatementBuilder},
};

/// -----------------------------
/// Adapter contract
/// -----------------------------

/// A connection checked out of an adapter's pool, optionally inside a
/// transaction. Dropping an uncommitted transactional session rolls it back.
#[async_trait]
pub trait Session: Send {
    /// Runs a write statement and returns the number of affected rows.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, Error>;

    /// Runs a select and decodes every row against `table`'s columns.
    async fn fetch_all(
        &mut self,
        statement: &Statement,
        table: &'static Table,
    ) -> Result<Vec<Record>, Error>;

    async fn commit(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    fn dialect(&self) -> Dialect;

    fn builder(&self) -> StatementBuilder {
        StatementBuilder::new(self.dialect())
    }

    /// Creates every base and junction table if missing.
    async fn init_schema(&self) -> Result<(), Error>;

    /// Plain pooled connection, for reads.
    async fn acquire(&self) -> Result<Box<dyn Session>, Error>;

    /// Connection with an open transaction, for writes.
    async fn begin(&self) -> Result<Box<dyn Session>, Error>;
}
