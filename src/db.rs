use anyhow::Context;
use std::sync::Arc;
use tourdesk_config::{StorageBackend, StorageConfig};
use tourdesk_core::DocumentStore;
use tourdesk_db::{MemoryStore, PgStore, TimedStore, init_db_pool};
use tracing::info;

/// Opens the configured backend behind the storage timeout.
pub async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let backend: Arc<dyn DocumentStore> = match config.backend {
        StorageBackend::Memory => {
            info!("using in-memory document store");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres backend")?;
            info!("using PostgreSQL document store");
            Arc::new(PgStore::new(init_db_pool(url).await?))
        }
    };

    Ok(Arc::new(TimedStore::new(backend, config.timeout)))
}
