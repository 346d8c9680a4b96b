//! PostgreSQL implementation of SettingsStore.
//!
//! Settings live in one JSONB row; absent keys mean "use the environment".

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{SettingsStore, StoredSettings};

#[derive(Clone)]
pub struct PostgresSettingsStore {
    pool: PgPool,
}

impl PostgresSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PostgresSettingsStore {
    async fn load(&self) -> Result<StoredSettings, DomainError> {
        let row: Option<(Json<StoredSettings>,)> =
            sqlx::query_as("SELECT settings FROM desk_settings WHERE singleton")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to load settings: {}", e),
                    )
                })?;

        Ok(row.map(|(Json(settings),)| settings).unwrap_or_default())
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO desk_settings (singleton, settings, updated_at)
            VALUES (TRUE, $1, NOW())
            ON CONFLICT (singleton) DO UPDATE SET settings = EXCLUDED.settings, updated_at = NOW()
            "#,
        )
        .bind(Json(settings))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to save settings: {}", e),
            )
        })?;

        Ok(())
    }
}
