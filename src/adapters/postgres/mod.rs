//! PostgreSQL adapters for the store ports.
//!
//! - `PostgresDeskStore` - conversations, agents, tickets, surveys, audit log
//! - `PostgresDedupStore` - inbound redelivery tracking
//! - `PostgresSettingsStore` - administrator overrides
//!
//! The schema lives in `migrations/` and is applied with [`MIGRATOR`].

mod dedup_store;
mod desk_store;
mod settings_store;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

pub use dedup_store::PostgresDedupStore;
pub use desk_store::PostgresDeskStore;
pub use settings_store::PostgresSettingsStore;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens a connection pool sized by the database configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let url = config
        .url()
        .ok_or_else(|| sqlx::Error::Configuration("database URL is not set".into()))?;
    PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(Some(config.idle_timeout()))
        .max_lifetime(Some(config.max_lifetime()))
        .connect(url)
        .await
}

/// Applies pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
