//! PostgreSQL implementation of InboundDedupStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::conversation::Channel;
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{InboundDedupStore, SaveResult};

/// Seen inbound message ids, keyed by `(channel, external_message_id)`.
#[derive(Clone)]
pub struct PostgresDedupStore {
    pool: PgPool,
}

impl PostgresDedupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboundDedupStore for PostgresDedupStore {
    async fn record(&self, channel: Channel, external_message_id: &str) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO inbound_dedup (channel, external_message_id, seen_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (channel, external_message_id) DO NOTHING
            "#,
        )
        .bind(channel.as_str())
        .bind(external_message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record inbound message: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn forget(&self, channel: Channel, external_message_id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM inbound_dedup WHERE channel = $1 AND external_message_id = $2")
            .bind(channel.as_str())
            .bind(external_message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to forget inbound message: {}", e),
                )
            })?;

        Ok(())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM inbound_dedup WHERE seen_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to expire inbound records: {}", e),
                )
            })?;

        Ok(result.rows_affected())
    }
}
