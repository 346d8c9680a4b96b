//! PostgreSQL implementation of the desk store.
//!
//! Every [`ChangeSet`] is applied inside one transaction. Compare-and-swap
//! conditions map onto the schema:
//!
//! - conversation updates are `UPDATE ... WHERE version = $expected`
//! - `(channel, external_user_id)` uniqueness is a table constraint
//! - agent rows are locked `FOR UPDATE` in id order before load changes
//! - the one-open-ticket rule is a partial unique index
//!
//! # Audit sequence
//!
//! Audit sequences come from the single-row `audit_sequence` counter. Its
//! row lock is taken by the last statement before `COMMIT` and released by
//! it, so commits on different conversations run in parallel up to that
//! point and then pass the counter one at a time. The price is one short
//! global critical section per commit. In return sequence numbers are gap
//! free and follow commit order: once a reader has seen sequence `n`, every
//! entry below `n` is already visible. A `BIGSERIAL` would not give that,
//! since a transaction holding a lower number can commit after one holding
//! a higher number, and fan-out subscribers resync from the last sequence
//! they saw.
//!
//! Keep `append_audit` as the final write of `commit`; anything placed after
//! it extends the time the counter row stays locked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::agent::{Agent, AgentStatus};
use crate::domain::audit::{AuditAction, AuditLogEntry, AuditRecord, EntityRef, FieldChange};
use crate::domain::conversation::{
    Channel, Conversation, ConversationStatus, CustomerIdentity, Message, SenderKind,
};
use crate::domain::foundation::{
    AgentId, ConversationId, CsatId, DomainError, ErrorCode, ExternalUserId, MessageId, TicketId,
    Timestamp,
};
use crate::domain::ticket::{CsatRating, CsatScore, Ticket, TicketPriority, TicketStatus};
use crate::ports::{
    AgentRepository, AuditLogReader, ChangeSet, CommitReceipt, ConversationFilter,
    ConversationRepository, ConversationWrite, CsatRepository, EntityWrite, TicketRepository,
    TransitionCommitter,
};

const DEFAULT_LIST_LIMIT: i64 = 100;

const CONVERSATION_COLUMNS: &str = "id, channel, external_user_id, customer_name, customer_email, \
     customer_phone, status, assigned_agent_id, escalated_at, escalation_reason, last_message_at, \
     created_at, updated_at, version";

const AGENT_COLUMNS: &str =
    "id, name, email, phone, status, active_conversations, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, conversation_id, title, description, priority, status, \
     tat_minutes, created_at, updated_at, resolved_at";

const CSAT_COLUMNS: &str =
    "id, conversation_id, ticket_id, rating, feedback, requested_at, recorded_at";

const AUDIT_COLUMNS: &str = "sequence, action, entity_type, entity_id, conversation_id, changes, \
     actor, correlation_id, occurred_at";

/// Desk store backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresDeskStore {
    pool: PgPool,
}

impl PostgresDeskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", context, e))
}

/// Translates constraint violations raised inside a commit into the
/// conflict codes the engine understands.
fn write_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| {
        let constraint = e
            .as_database_error()
            .and_then(|d| d.constraint())
            .map(str::to_owned);
        match constraint.as_deref() {
            Some("tickets_one_open_per_conversation") => DomainError::new(
                ErrorCode::OpenTicketExists,
                "Conversation already has an open ticket",
            ),
            Some("conversations_pkey")
            | Some("conversations_channel_user_key")
            | Some("agents_pkey")
            | Some("tickets_pkey")
            | Some("csat_ratings_pkey") => DomainError::new(
                ErrorCode::ConcurrentModification,
                format!("Failed to {}: row already exists", context),
            ),
            Some("messages_conversation_id_fkey")
            | Some("tickets_conversation_id_fkey")
            | Some("csat_ratings_conversation_id_fkey") => DomainError::new(
                ErrorCode::ConversationNotFound,
                format!("Failed to {}: conversation not found", context),
            ),
            Some("conversations_assigned_agent_id_fkey") => DomainError::new(
                ErrorCode::AgentNotFound,
                format!("Failed to {}: agent not found", context),
            ),
            _ => DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", context, e)),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Commit
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl TransitionCommitter for PostgresDeskStore {
    async fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt, DomainError> {
        changes.validate()?;
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        match &changes.conversation {
            Some(ConversationWrite::Insert(conversation)) => {
                insert_conversation(&mut tx, conversation).await?
            }
            Some(ConversationWrite::Update {
                conversation,
                expected_version,
            }) => update_conversation(&mut tx, conversation, *expected_version).await?,
            None => {}
        }

        for message in &changes.messages {
            insert_message(&mut tx, message).await?;
        }

        if let Some(agent) = &changes.new_agent {
            insert_agent(&mut tx, agent).await?;
        }
        apply_agent_changes(&mut tx, &changes).await?;

        match &changes.ticket {
            Some(EntityWrite::Insert(ticket)) => insert_ticket(&mut tx, ticket).await?,
            Some(EntityWrite::Update(ticket)) => update_ticket(&mut tx, ticket).await?,
            None => {}
        }

        match &changes.csat {
            Some(EntityWrite::Insert(csat)) => insert_csat(&mut tx, csat).await?,
            Some(EntityWrite::Update(csat)) => update_csat(&mut tx, csat).await?,
            None => {}
        }

        // Last write: locks the audit_sequence row until commit.
        let entries = append_audit(&mut tx, changes.audit).await?;

        tx.commit().await.map_err(db_error("commit transaction"))?;
        Ok(CommitReceipt { entries })
    }
}

async fn insert_conversation(
    tx: &mut Transaction<'_, Postgres>,
    conversation: &Conversation,
) -> Result<(), DomainError> {
    let customer = conversation.customer();
    sqlx::query(
        r#"
        INSERT INTO conversations (
            id, channel, external_user_id, customer_name, customer_email, customer_phone,
            status, assigned_agent_id, escalated_at, escalation_reason, last_message_at,
            created_at, updated_at, version
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(conversation.id().as_uuid())
    .bind(conversation.channel().as_str())
    .bind(customer.external_user_id.as_str())
    .bind(&customer.name)
    .bind(customer.email.as_deref())
    .bind(customer.phone.as_deref())
    .bind(conversation.status().as_str())
    .bind(conversation.assigned_agent().map(|a| *a.as_uuid()))
    .bind(conversation.escalated_at().map(|t| *t.as_datetime()))
    .bind(conversation.escalation_reason())
    .bind(conversation.last_message_at().as_datetime())
    .bind(conversation.created_at().as_datetime())
    .bind(conversation.updated_at().as_datetime())
    .bind(conversation.version() as i64)
    .execute(&mut **tx)
    .await
    .map_err(write_error("insert conversation"))?;

    Ok(())
}

async fn update_conversation(
    tx: &mut Transaction<'_, Postgres>,
    conversation: &Conversation,
    expected_version: u64,
) -> Result<(), DomainError> {
    let customer = conversation.customer();
    let result = sqlx::query(
        r#"
        UPDATE conversations SET
            customer_name = $3,
            customer_email = $4,
            customer_phone = $5,
            status = $6,
            assigned_agent_id = $7,
            escalated_at = $8,
            escalation_reason = $9,
            last_message_at = $10,
            updated_at = $11,
            version = $12
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(conversation.id().as_uuid())
    .bind(expected_version as i64)
    .bind(&customer.name)
    .bind(customer.email.as_deref())
    .bind(customer.phone.as_deref())
    .bind(conversation.status().as_str())
    .bind(conversation.assigned_agent().map(|a| *a.as_uuid()))
    .bind(conversation.escalated_at().map(|t| *t.as_datetime()))
    .bind(conversation.escalation_reason())
    .bind(conversation.last_message_at().as_datetime())
    .bind(conversation.updated_at().as_datetime())
    .bind(conversation.version() as i64)
    .execute(&mut **tx)
    .await
    .map_err(write_error("update conversation"))?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let stored: Option<(i64,)> = sqlx::query_as("SELECT version FROM conversations WHERE id = $1")
        .bind(conversation.id().as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error("fetch conversation version"))?;

    Err(match stored {
        None => DomainError::new(
            ErrorCode::ConversationNotFound,
            format!("Conversation {} not found", conversation.id()),
        ),
        Some((version,)) => DomainError::new(
            ErrorCode::ConcurrentModification,
            format!(
                "Conversation {} is at version {}, expected {}",
                conversation.id(),
                version,
                expected_version
            ),
        ),
    })
}

async fn insert_message(tx: &mut Transaction<'_, Postgres>, message: &Message) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, sender, sender_name, content, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(message.id.as_uuid())
    .bind(message.conversation_id.as_uuid())
    .bind(message.sender.as_str())
    .bind(message.sender_name.as_deref())
    .bind(&message.content)
    .bind(message.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(write_error("insert message"))?;

    Ok(())
}

async fn insert_agent(tx: &mut Transaction<'_, Postgres>, agent: &Agent) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO agents (id, name, email, phone, status, active_conversations, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(agent.id().as_uuid())
    .bind(agent.name())
    .bind(agent.email())
    .bind(agent.phone())
    .bind(agent.status().as_str())
    .bind(agent.active_conversations() as i32)
    .bind(agent.created_at().as_datetime())
    .bind(agent.updated_at().as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(write_error("insert agent"))?;

    Ok(())
}

/// Locks every touched agent row in id order, applies the status change and
/// load adjustments through the aggregate, then writes the rows back.
async fn apply_agent_changes(
    tx: &mut Transaction<'_, Postgres>,
    changes: &ChangeSet,
) -> Result<(), DomainError> {
    let mut ids: Vec<AgentId> = changes
        .agent_status
        .iter()
        .map(|c| c.agent_id)
        .chain(changes.load_adjustments.iter().map(|a| a.agent_id))
        .collect();
    ids.sort();
    ids.dedup();

    for id in ids {
        let sql = format!("SELECT {} FROM agents WHERE id = $1 FOR UPDATE", AGENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error("lock agent"))?
            .ok_or_else(|| DomainError::new(ErrorCode::AgentNotFound, format!("Agent {} not found", id)))?;
        let mut agent = row_to_agent(row)?;

        if let Some(change) = changes.agent_status.filter(|c| c.agent_id == id) {
            if agent.status() != change.expected {
                return Err(DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!("Agent {} is {}, expected {}", id, agent.status(), change.expected),
                ));
            }
            agent.set_status(change.new_status)?;
        }
        for adjustment in changes.load_adjustments.iter().filter(|a| a.agent_id == id) {
            agent.adjust_load(adjustment.delta, adjustment.require_available)?;
        }

        sqlx::query(
            r#"
            UPDATE agents SET status = $2, active_conversations = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(agent.status().as_str())
        .bind(agent.active_conversations() as i32)
        .bind(agent.updated_at().as_datetime())
        .execute(&mut **tx)
        .await
        .map_err(write_error("update agent"))?;
    }

    Ok(())
}

async fn insert_ticket(tx: &mut Transaction<'_, Postgres>, ticket: &Ticket) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO tickets (
            id, conversation_id, title, description, priority, status, tat_minutes,
            created_at, updated_at, resolved_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(ticket.id().as_uuid())
    .bind(ticket.conversation_id().as_uuid())
    .bind(ticket.title())
    .bind(ticket.description())
    .bind(ticket.priority().as_str())
    .bind(ticket.status().as_str())
    .bind(ticket.tat_minutes() as i32)
    .bind(ticket.created_at().as_datetime())
    .bind(ticket.updated_at().as_datetime())
    .bind(ticket.resolved_at().map(|t| *t.as_datetime()))
    .execute(&mut **tx)
    .await
    .map_err(write_error("insert ticket"))?;

    Ok(())
}

async fn update_ticket(tx: &mut Transaction<'_, Postgres>, ticket: &Ticket) -> Result<(), DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE tickets SET
            title = $2,
            description = $3,
            priority = $4,
            status = $5,
            tat_minutes = $6,
            updated_at = $7,
            resolved_at = $8
        WHERE id = $1
        "#,
    )
    .bind(ticket.id().as_uuid())
    .bind(ticket.title())
    .bind(ticket.description())
    .bind(ticket.priority().as_str())
    .bind(ticket.status().as_str())
    .bind(ticket.tat_minutes() as i32)
    .bind(ticket.updated_at().as_datetime())
    .bind(ticket.resolved_at().map(|t| *t.as_datetime()))
    .execute(&mut **tx)
    .await
    .map_err(write_error("update ticket"))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::new(
            ErrorCode::TicketNotFound,
            format!("Ticket {} not found", ticket.id()),
        ));
    }
    Ok(())
}

async fn insert_csat(tx: &mut Transaction<'_, Postgres>, csat: &CsatRating) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO csat_ratings (id, conversation_id, ticket_id, rating, feedback, requested_at, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(csat.id().as_uuid())
    .bind(csat.conversation_id().as_uuid())
    .bind(csat.ticket_id().map(|t| *t.as_uuid()))
    .bind(csat.rating().map(|r| r.value() as i16))
    .bind(csat.feedback())
    .bind(csat.requested_at().as_datetime())
    .bind(csat.recorded_at().map(|t| *t.as_datetime()))
    .execute(&mut **tx)
    .await
    .map_err(write_error("insert survey"))?;

    Ok(())
}

async fn update_csat(tx: &mut Transaction<'_, Postgres>, csat: &CsatRating) -> Result<(), DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE csat_ratings SET rating = $2, feedback = $3, recorded_at = $4
        WHERE id = $1
        "#,
    )
    .bind(csat.id().as_uuid())
    .bind(csat.rating().map(|r| r.value() as i16))
    .bind(csat.feedback())
    .bind(csat.recorded_at().map(|t| *t.as_datetime()))
    .execute(&mut **tx)
    .await
    .map_err(write_error("update survey"))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::new(
            ErrorCode::CsatNotFound,
            format!("CSAT {} not found", csat.id()),
        ));
    }
    Ok(())
}

async fn append_audit(
    tx: &mut Transaction<'_, Postgres>,
    records: Vec<AuditRecord>,
) -> Result<Vec<AuditLogEntry>, DomainError> {
    let count = records.len() as i64;
    let (last,): (i64,) = sqlx::query_as(
        "UPDATE audit_sequence SET last = last + $1 WHERE singleton RETURNING last",
    )
    .bind(count)
    .fetch_one(&mut **tx)
    .await
    .map_err(db_error("reserve audit sequence"))?;

    let mut entries = Vec::with_capacity(records.len());
    for (offset, record) in records.into_iter().enumerate() {
        let sequence = last - count + 1 + offset as i64;
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                sequence, action, entity_type, entity_id, conversation_id, changes,
                actor, correlation_id, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(sequence)
        .bind(record.action.as_str())
        .bind(record.entity.kind())
        .bind(record.entity.uuid())
        .bind(record.conversation_id.map(|c| *c.as_uuid()))
        .bind(Json(&record.changes))
        .bind(&record.actor)
        .bind(record.correlation_id.as_deref())
        .bind(record.occurred_at.as_datetime())
        .execute(&mut **tx)
        .await
        .map_err(db_error("append audit record"))?;

        entries.push(AuditLogEntry {
            sequence: sequence as u64,
            record,
        });
    }
    Ok(entries)
}

// ════════════════════════════════════════════════════════════════════════════
// Reads
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ConversationRepository for PostgresDeskStore {
    async fn find_by_id(&self, id: ConversationId) -> Result<Option<Conversation>, DomainError> {
        let sql = format!("SELECT {} FROM conversations WHERE id = $1", CONVERSATION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch conversation"))?;

        row.map(row_to_conversation).transpose()
    }

    async fn find_by_external_user(
        &self,
        channel: Channel,
        external_user_id: &ExternalUserId,
    ) -> Result<Option<Conversation>, DomainError> {
        let sql = format!(
            "SELECT {} FROM conversations WHERE channel = $1 AND external_user_id = $2",
            CONVERSATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(channel.as_str())
            .bind(external_user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch conversation by external user"))?;

        row.map(row_to_conversation).transpose()
    }

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM conversations
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR channel = $2)
              AND (NOT $3 OR (status = 'open' AND escalated_at IS NOT NULL))
            ORDER BY last_message_at DESC
            LIMIT $4
            "#,
            CONVERSATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.channel.map(|c| c.as_str()))
            .bind(filter.escalation_pending)
            .bind(filter.limit.map_or(DEFAULT_LIST_LIMIT, i64::from))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list conversations"))?;

        rows.into_iter().map(row_to_conversation).collect()
    }

    async fn list_escalated_before(&self, cutoff: Timestamp) -> Result<Vec<Conversation>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM conversations
            WHERE status = 'open' AND escalated_at IS NOT NULL AND escalated_at < $1
            ORDER BY escalated_at ASC
            "#,
            CONVERSATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list escalated conversations"))?;

        rows.into_iter().map(row_to_conversation).collect()
    }

    async fn messages(&self, id: ConversationId, limit: Option<u32>) -> Result<Vec<Message>, DomainError> {
        // LIMIT NULL is LIMIT ALL.
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, sender_name, content, created_at FROM (
                SELECT position, id, conversation_id, sender, sender_name, content, created_at
                FROM messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC, position DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC, position ASC
            "#,
        )
        .bind(id.as_uuid())
        .bind(limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch messages"))?;

        rows.into_iter().map(row_to_message).collect()
    }
}

#[async_trait]
impl AgentRepository for PostgresDeskStore {
    async fn find_agent(&self, id: AgentId) -> Result<Option<Agent>, DomainError> {
        let sql = format!("SELECT {} FROM agents WHERE id = $1", AGENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch agent"))?;

        row.map(row_to_agent).transpose()
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, DomainError> {
        let sql = format!("SELECT {} FROM agents ORDER BY created_at ASC, id ASC", AGENT_COLUMNS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list agents"))?;

        rows.into_iter().map(row_to_agent).collect()
    }
}

#[async_trait]
impl TicketRepository for PostgresDeskStore {
    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, DomainError> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch ticket"))?;

        row.map(row_to_ticket).transpose()
    }

    async fn find_open_ticket(&self, conversation_id: ConversationId) -> Result<Option<Ticket>, DomainError> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE conversation_id = $1 AND status <> 'resolved'",
            TICKET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(conversation_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch open ticket"))?;

        row.map(row_to_ticket).transpose()
    }

    async fn tickets_for_conversation(&self, conversation_id: ConversationId) -> Result<Vec<Ticket>, DomainError> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE conversation_id = $1 ORDER BY created_at ASC",
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(conversation_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list tickets"))?;

        rows.into_iter().map(row_to_ticket).collect()
    }
}

#[async_trait]
impl CsatRepository for PostgresDeskStore {
    async fn find_csat(&self, id: CsatId) -> Result<Option<CsatRating>, DomainError> {
        let sql = format!("SELECT {} FROM csat_ratings WHERE id = $1", CSAT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch survey"))?;

        row.map(row_to_csat).transpose()
    }

    async fn csat_for_conversation(&self, conversation_id: ConversationId) -> Result<Vec<CsatRating>, DomainError> {
        let sql = format!(
            "SELECT {} FROM csat_ratings WHERE conversation_id = $1 ORDER BY requested_at ASC",
            CSAT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(conversation_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list surveys"))?;

        rows.into_iter().map(row_to_csat).collect()
    }
}

#[async_trait]
impl AuditLogReader for PostgresDeskStore {
    async fn entity_history(&self, entity: EntityRef) -> Result<Vec<AuditLogEntry>, DomainError> {
        let sql = format!(
            "SELECT {} FROM audit_log WHERE entity_type = $1 AND entity_id = $2 ORDER BY sequence ASC",
            AUDIT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(entity.kind())
            .bind(entity.uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("fetch entity history"))?;

        rows.into_iter().map(row_to_audit_entry).collect()
    }

    async fn conversation_history(&self, conversation_id: ConversationId) -> Result<Vec<AuditLogEntry>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM audit_log
            WHERE conversation_id = $1
            ORDER BY sequence ASC
            "#,
            AUDIT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(conversation_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("fetch conversation history"))?;

        rows.into_iter().map(row_to_audit_entry).collect()
    }

    async fn last_sequence(&self) -> Result<u64, DomainError> {
        let (last,): (i64,) = sqlx::query_as("SELECT last FROM audit_sequence WHERE singleton")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("read audit sequence"))?;

        Ok(last as u64)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Row mapping
// ════════════════════════════════════════════════════════════════════════════

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to read column {}: {}", name, e),
        )
    })
}

fn timestamp(row: &PgRow, name: &str) -> Result<Timestamp, DomainError> {
    column::<DateTime<Utc>>(row, name).map(Timestamp::from_datetime)
}

fn optional_timestamp(row: &PgRow, name: &str) -> Result<Option<Timestamp>, DomainError> {
    Ok(column::<Option<DateTime<Utc>>>(row, name)?.map(Timestamp::from_datetime))
}

fn row_to_conversation(row: PgRow) -> Result<Conversation, DomainError> {
    let channel: Channel = column::<String>(&row, "channel")?.parse()?;
    let status: ConversationStatus = column::<String>(&row, "status")?.parse()?;
    let customer = CustomerIdentity {
        name: column(&row, "customer_name")?,
        email: column(&row, "customer_email")?,
        phone: column(&row, "customer_phone")?,
        external_user_id: ExternalUserId::new(column::<String>(&row, "external_user_id")?)?,
    };

    Ok(Conversation::reconstitute(
        ConversationId::from_uuid(column(&row, "id")?),
        channel,
        customer,
        status,
        column::<Option<uuid::Uuid>>(&row, "assigned_agent_id")?.map(AgentId::from_uuid),
        optional_timestamp(&row, "escalated_at")?,
        column(&row, "escalation_reason")?,
        timestamp(&row, "last_message_at")?,
        timestamp(&row, "created_at")?,
        timestamp(&row, "updated_at")?,
        column::<i64>(&row, "version")? as u64,
    ))
}

fn row_to_message(row: PgRow) -> Result<Message, DomainError> {
    let sender: SenderKind = column::<String>(&row, "sender")?.parse()?;
    Ok(Message {
        id: MessageId::from_uuid(column(&row, "id")?),
        conversation_id: ConversationId::from_uuid(column(&row, "conversation_id")?),
        sender,
        sender_name: column(&row, "sender_name")?,
        content: column(&row, "content")?,
        created_at: timestamp(&row, "created_at")?,
    })
}

fn row_to_agent(row: PgRow) -> Result<Agent, DomainError> {
    let status: AgentStatus = column::<String>(&row, "status")?.parse()?;
    Ok(Agent::reconstitute(
        AgentId::from_uuid(column(&row, "id")?),
        column(&row, "name")?,
        column(&row, "email")?,
        column(&row, "phone")?,
        status,
        column::<i32>(&row, "active_conversations")?.max(0) as u32,
        timestamp(&row, "created_at")?,
        timestamp(&row, "updated_at")?,
    ))
}

fn row_to_ticket(row: PgRow) -> Result<Ticket, DomainError> {
    let priority: TicketPriority = column::<String>(&row, "priority")?.parse()?;
    let status: TicketStatus = column::<String>(&row, "status")?.parse()?;
    Ok(Ticket::reconstitute(
        TicketId::from_uuid(column(&row, "id")?),
        ConversationId::from_uuid(column(&row, "conversation_id")?),
        column(&row, "title")?,
        column(&row, "description")?,
        priority,
        status,
        column::<i32>(&row, "tat_minutes")?.max(1) as u32,
        timestamp(&row, "created_at")?,
        timestamp(&row, "updated_at")?,
        optional_timestamp(&row, "resolved_at")?,
    ))
}

fn row_to_csat(row: PgRow) -> Result<CsatRating, DomainError> {
    let rating = column::<Option<i16>>(&row, "rating")?
        .map(|r| CsatScore::new(i32::from(r)))
        .transpose()?;
    Ok(CsatRating::reconstitute(
        CsatId::from_uuid(column(&row, "id")?),
        ConversationId::from_uuid(column(&row, "conversation_id")?),
        column::<Option<uuid::Uuid>>(&row, "ticket_id")?.map(TicketId::from_uuid),
        rating,
        column(&row, "feedback")?,
        timestamp(&row, "requested_at")?,
        optional_timestamp(&row, "recorded_at")?,
    ))
}

fn row_to_audit_entry(row: PgRow) -> Result<AuditLogEntry, DomainError> {
    let action: AuditAction = column::<String>(&row, "action")?.parse()?;
    let entity_type: String = column(&row, "entity_type")?;
    let entity = EntityRef::from_parts(&entity_type, column(&row, "entity_id")?)?;
    let Json(changes): Json<Vec<FieldChange>> = column(&row, "changes")?;

    Ok(AuditLogEntry {
        sequence: column::<i64>(&row, "sequence")? as u64,
        record: AuditRecord {
            action,
            entity,
            conversation_id: column::<Option<uuid::Uuid>>(&row, "conversation_id")?
                .map(ConversationId::from_uuid),
            changes,
            actor: column(&row, "actor")?,
            correlation_id: column(&row, "correlation_id")?,
            occurred_at: timestamp(&row, "occurred_at")?,
        },
    })
}
