//! # Tourdesk DB
//!
//! Storage backends for the Tourdesk API.
//!
//! - [`MemoryStore`]: in-process reference store, used by tests and the
//!   `memory` backend
//! - [`PgStore`]: PostgreSQL store keeping documents as JSONB rows
//! - [`TimedStore`]: bounds every call of another store by a timeout
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tourdesk_db::{PgStore, TimedStore, init_db_pool};
//!
//! let pool = init_db_pool(&database_url).await?;
//! let store = TimedStore::new(Arc::new(PgStore::new(pool)), timeout);
//! ```

mod memory;
mod postgres;
mod timed;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use timed::TimedStore;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

/// Connects to PostgreSQL and applies the pending migrations.
///
/// Called once at startup; the returned pool is cheaply cloneable.
pub async fn init_db_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

// Re-export PgPool for convenience
pub use sqlx::PgPool;
