//! EscalationSweeper - converts stale escalations into tickets.
//!
//! A conversation that has waited for an agent longer than the configured
//! policy is turned into a high-priority ticket by the system actor. One
//! that already has an open ticket (a customer follow-up) is returned to
//! that ticket instead. The sweeper also expires old inbound dedup records.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between sweeps |
//! | `escalation_ticket_after_minutes` | 30 | Wait before ticketing |
//! | `dedup_retention_hours` | 72 | Age of dedup records to delete |
//!
//! ## Graceful Shutdown
//!
//! The loop stops on the shutdown signal after finishing the sweep in
//! progress.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use super::{DeskEngine, EngineError, OpenTicketCommand};
use crate::domain::foundation::{Actor, Timestamp};
use crate::domain::ticket::{NewTicket, TicketPriority};
use crate::ports::InboundDedupStore;

/// Configuration for the sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub escalation_ticket_after_minutes: u32,
    pub dedup_retention_hours: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            escalation_ticket_after_minutes: 30,
            dedup_retention_hours: 72,
        }
    }
}

impl SweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_escalation_ticket_after(mut self, minutes: u32) -> Self {
        self.escalation_ticket_after_minutes = minutes;
        self
    }
}

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub tickets_opened: usize,
    /// Follow-ups on an open ticket parked back under that ticket.
    pub returned_to_ticket: usize,
    /// Conversations that changed under the sweep (claimed meanwhile).
    pub skipped: usize,
    pub dedup_records_expired: u64,
}

/// Background escalation policy.
pub struct EscalationSweeper {
    engine: Arc<DeskEngine>,
    dedup: Option<Arc<dyn InboundDedupStore>>,
    config: SweeperConfig,
}

impl EscalationSweeper {
    pub fn new(engine: Arc<DeskEngine>, config: SweeperConfig) -> Self {
        Self {
            engine,
            dedup: None,
            config,
        }
    }

    /// Builder: also expire inbound dedup records.
    pub fn with_dedup_store(mut self, dedup: Arc<dyn InboundDedupStore>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Runs sweeps until the shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), EngineError> {
        let mut interval = time::interval(self.config.interval);
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            after_minutes = self.config.escalation_ticket_after_minutes,
            "Escalation sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Escalation sweeper stopped");
                        return Ok(());
                    }
                }
                _ = interval.tick() => {
                    if let Err(err) = self.poll_once().await {
                        tracing::warn!(error = %err, "Escalation sweep failed");
                    }
                }
            }
        }
    }

    /// Runs exactly one sweep.
    pub async fn poll_once(&self) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport::default();
        let now = Timestamp::now();
        let cutoff = now.minus_minutes(i64::from(self.config.escalation_ticket_after_minutes));
        let actor = Actor::system().with_source("sweeper");

        for conversation in self.engine.escalated_before(cutoff).await? {
            match self.engine.return_to_open_ticket(conversation.id(), &actor).await {
                Ok(Some(_)) => {
                    report.returned_to_ticket += 1;
                    continue;
                }
                Ok(None) => {}
                Err(err) if err.is_conflict() => {
                    report.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            }

            let waited = now
                .duration_since(conversation.escalated_at().unwrap_or(conversation.updated_at()))
                .num_minutes();
            let ticket = NewTicket {
                title: format!("Unclaimed escalation from {}", conversation.customer().name),
                description: Some(format!(
                    "No agent accepted this {} conversation within {} minutes. Reason: {}",
                    conversation.channel(),
                    waited,
                    conversation.escalation_reason().unwrap_or("not given"),
                )),
                priority: TicketPriority::High,
                tat_minutes: None,
            };
            let cmd = OpenTicketCommand {
                conversation_id: conversation.id(),
                ticket,
                only_if_unclaimed: true,
            };
            match self.engine.open_ticket(cmd, &actor).await {
                Ok(_) => report.tickets_opened += 1,
                Err(err) if err.is_conflict() => {
                    tracing::debug!(
                        conversation_id = %conversation.id(),
                        error = %err,
                        "Escalation changed during sweep"
                    );
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(dedup) = &self.dedup {
            let cutoff = now.minus_minutes(i64::from(self.config.dedup_retention_hours) * 60);
            report.dedup_records_expired = dedup.delete_before(cutoff).await?;
        }

        if report.tickets_opened > 0 || report.returned_to_ticket > 0 || report.dedup_records_expired > 0 {
            tracing::info!(
                tickets_opened = report.tickets_opened,
                returned_to_ticket = report.returned_to_ticket,
                skipped = report.skipped,
                dedup_expired = report.dedup_records_expired,
                "Escalation sweep finished"
            );
        }
        Ok(report)
    }
}
