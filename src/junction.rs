//! Junction table manager.
//!
//! Generic link maintenance for the two-column join tables. The store
//! enforces no uniqueness on `(parent, child)`, so every insert is preceded
//! by an existence check.

use crate::{
    adapters::Session,
    error::Error,
    fields,
    schema::JunctionTable,
    statement::StatementBuilder,
    value::Value,
};

#[derive(Debug, Clone, Copy)]
pub struct JunctionManager {
    builder: StatementBuilder,
}

impl JunctionManager {
    pub fn new(builder: StatementBuilder) -> Self {
        Self { builder }
    }

    /// Links `parent_id` to `child_id` unless the pair already exists.
    /// Returns whether a row was written.
    pub async fn add(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        parent_id: &str,
        child_id: &str,
    ) -> Result<bool, Error> {
        let table = junction.table();
        let pair = fields! {
            junction.parent_column() => parent_id,
            junction.child_column() => child_id,
        };

        let existing = session
            .fetch_all(&self.builder.select(table, &pair)?, table)
            .await?;
        if !existing.is_empty() {
            return Ok(false);
        }

        let insert = self.builder.insert(
            table,
            vec![
                Value::Text(parent_id.to_string()),
                Value::Text(child_id.to_string()),
            ],
        )?;
        session.execute(&insert).await?;
        Ok(true)
    }

    /// Drops every child of `parent_id`, then links each of `child_ids`.
    pub async fn replace_all(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        parent_id: &str,
        child_ids: &[String],
    ) -> Result<(), Error> {
        self.remove_parent(session, junction, parent_id).await?;
        for child_id in child_ids {
            self.add(session, junction, parent_id, child_id).await?;
        }
        Ok(())
    }

    /// Same as [`replace_all`](Self::replace_all), seen from the child side.
    pub async fn replace_parents(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        child_id: &str,
        parent_ids: &[String],
    ) -> Result<(), Error> {
        self.remove_child(session, junction, child_id).await?;
        for parent_id in parent_ids {
            self.add(session, junction, parent_id, child_id).await?;
        }
        Ok(())
    }

    /// Child ids linked to `parent_id`, in the store's row order.
    pub async fn list_children(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        parent_id: &str,
    ) -> Result<Vec<String>, Error> {
        self.list(
            session,
            junction,
            junction.parent_column(),
            parent_id,
            junction.child_column(),
        )
        .await
    }

    pub async fn list_parents(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        child_id: &str,
    ) -> Result<Vec<String>, Error> {
        self.list(
            session,
            junction,
            junction.child_column(),
            child_id,
            junction.parent_column(),
        )
        .await
    }

    pub async fn remove_parent(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        parent_id: &str,
    ) -> Result<u64, Error> {
        let filter = fields! { junction.parent_column() => parent_id };
        session
            .execute(&self.builder.delete(junction.table(), &filter)?)
            .await
    }

    pub async fn remove_child(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        child_id: &str,
    ) -> Result<u64, Error> {
        let filter = fields! { junction.child_column() => child_id };
        session
            .execute(&self.builder.delete(junction.table(), &filter)?)
            .await
    }

    async fn list(
        &self,
        session: &mut dyn Session,
        junction: JunctionTable,
        by_column: &'static str,
        id: &str,
        read_column: &'static str,
    ) -> Result<Vec<String>, Error> {
        let table = junction.table();
        let filter = fields! { by_column => id };
        let records = session
            .fetch_all(&self.builder.select(table, &filter)?, table)
            .await?;

        records.iter().map(|r| r.text(read_column)).collect()
    }
}
