use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{adapters::Adapter, config::DatabaseConfig, error::Error};

enum Source {
    Url(DatabaseConfig),
    Adapter(Arc<dyn Adapter>),
}

/// Owns the shared adapter. The pool is opened on first use and the schema
/// is bootstrapped exactly once, even under concurrent first calls.
pub struct ConnectionManager {
    source: Source,
    adapter: OnceCell<Arc<dyn Adapter>>,
}

impl ConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            source: Source::Url(config),
            adapter: OnceCell::new(),
        }
    }

    /// Wraps an already connected adapter. Bootstrap still runs lazily.
    pub fn from_adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            source: Source::Adapter(adapter),
            adapter: OnceCell::new(),
        }
    }

    pub async fn adapter(&self) -> Result<Arc<dyn Adapter>, Error> {
        self.adapter
            .get_or_try_init(|| async {
                let adapter = match &self.source {
                    Source::Url(config) => connect(config).await?,
                    Source::Adapter(adapter) => Arc::clone(adapter),
                };
                adapter.init_schema().await?;
                Ok::<_, Error>(adapter)
            })
            .await
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.initialized()
    }
}

/// Picks the adapter from the url scheme.
async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Adapter>, Error> {
    let url = config.url.as_str();

    #[cfg(feature = "postgres")]
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let adapter =
            crate::adapters::postgres::PostgresAdapter::connect(url, config.max_connections)
                .await?;
        tracing::info!(backend = "postgres", "database connected");
        return Ok(Arc::new(adapter));
    }

    #[cfg(feature = "sqlite")]
    if url.starts_with("sqlite:") {
        let adapter =
            crate::adapters::sqlite::SqliteAdapter::connect(url, config.max_connections).await?;
        tracing::info!(backend = "sqlite", "database connected");
        return Ok(Arc::new(adapter));
    }

    let scheme = url.split(':').next().unwrap_or_default();
    Err(Error::Config(format!("DATABASE_URL scheme {:?}", scheme)))
}
