//! # Trackstore
//!
//! Relational persistence core of a time-tracking API: users, workspaces,
//! clients, projects, tasks, tags and team groups/members/roles, stored one
//! table per kind with four junction tables for the many-to-many relations.
//!
//! ## Layers
//!
//! - [`schema`]: static table descriptors. Column order there drives insert
//!   order, row decoding and DDL.
//! - [`statement`]: typed builder producing parameterized
//!   INSERT/SELECT/UPDATE/DELETE statements for any registered table.
//! - [`junction`]: idempotent link maintenance on the join tables.
//! - [`repository`]: Add/Get/GetAll/GetWithFilters/Update/Delete per entity,
//!   with relation hydration.
//! - [`manager`]: lazily opened shared pool, schema bootstrapped once.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use trackstore::{Store, entity::{Project, Workspace}, fields};
//!
//! let store = Store::connect(config.database);
//! let workspace = store.repository::<Workspace>().await?
//!     .add(Workspace { name: "W1".into(), ..Default::default() })
//!     .await?;
//!
//! let projects = store.repository::<Project>().await?;
//! let project = projects
//!     .add(Project {
//!         name: "P1".into(),
//!         workspace_id: Some(workspace.id.clone()),
//!         ..Default::default()
//!     })
//!     .await?;
//! projects
//!     .update(&project.id, fields! { "team_members" => "tm_A,tm_B" })
//!     .await?;
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Default | Description                        |
//! |------------|---------|------------------------------------|
//! | `postgres` | ✓       | PostgreSQL adapter via sqlx        |
//! | `sqlite`   | ✓       | SQLite adapter (in-memory or file) |

pub mod adapters;
pub mod config;
pub mod entity;
pub mod error;
pub mod junction;
pub mod manager;
pub mod repository;
pub mod schema;
pub mod statement;
pub mod value;

use std::sync::Arc;

pub use crate::adapters::{Adapter, Record, Session};
pub use crate::config::{Config, DatabaseConfig};
pub use crate::entity::{AnyEntity, Entity};
pub use crate::error::{Error, ResultExt};
pub use crate::junction::JunctionManager;
pub use crate::manager::ConnectionManager;
pub use crate::repository::{Expanded, Repository, UserRepository};
pub use crate::schema::{EntityKind, JunctionTable};
pub use crate::value::{FieldMap, ToValue, Value};

/// Entry point handed to the HTTP and auth layers. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<ConnectionManager>,
}

impl Store {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(manager),
        }
    }

    /// Store over a pool opened lazily from `config`.
    pub fn connect(config: DatabaseConfig) -> Self {
        Self::new(ConnectionManager::new(config))
    }

    pub fn from_adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self::new(ConnectionManager::from_adapter(adapter))
    }

    /// Opens the pool and bootstraps the schema if not done yet.
    pub async fn adapter(&self) -> Result<Arc<dyn Adapter>, Error> {
        self.inner.adapter().await
    }

    pub async fn repository<E: Entity>(&self) -> Result<Repository<E>, Error> {
        Ok(Repository::new(self.adapter().await?))
    }

    pub async fn users(&self) -> Result<UserRepository, Error> {
        Ok(UserRepository::new(self.adapter().await?))
    }

    /// Child ids linked to `parent_id` in `junction`.
    pub async fn list_children(
        &self,
        junction: JunctionTable,
        parent_id: &str,
    ) -> Result<Vec<String>, Error> {
        let adapter = self.adapter().await?;
        let mut session = adapter.acquire().await?;
        JunctionManager::new(adapter.builder())
            .list_children(session.as_mut(), junction, parent_id)
            .await
    }
}
