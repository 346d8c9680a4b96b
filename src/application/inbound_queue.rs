//! Webhook intake and the ingest worker.
//!
//! Webhook handlers only normalize, deduplicate and enqueue; the worker
//! drains the queue and runs ingests, spawning AI turns so that one
//! conversation's AI latency never delays another's ingest.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use super::{ChannelRegistry, DeskEngine, EngineError, SettingsResolver};
use crate::domain::conversation::{Channel, InboundMessage};
use crate::ports::{InboundDedupStore, SaveResult};

/// Bounded queue between webhook handlers and the ingest worker.
#[derive(Clone)]
pub struct InboundQueue {
    sender: mpsc::Sender<InboundMessage>,
}

impl InboundQueue {
    /// Creates the queue and the receiver the worker drains.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueues without waiting.
    ///
    /// # Errors
    ///
    /// `Infrastructure` when the queue is full or the worker has stopped.
    pub fn try_enqueue(&self, message: InboundMessage) -> Result<(), EngineError> {
        self.sender.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EngineError::infrastructure("Inbound queue is full"),
            mpsc::error::TrySendError::Closed(_) => {
                EngineError::infrastructure("Inbound worker is not running")
            }
        })
    }
}

/// Counts returned to the webhook caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeReport {
    pub accepted: usize,
    pub duplicates: usize,
}

/// Webhook entry point: normalize, dedupe, enqueue.
pub struct WebhookIntake {
    channels: Arc<ChannelRegistry>,
    dedup: Arc<dyn InboundDedupStore>,
    settings: Arc<SettingsResolver>,
    queue: InboundQueue,
}

impl WebhookIntake {
    pub fn new(
        channels: Arc<ChannelRegistry>,
        dedup: Arc<dyn InboundDedupStore>,
        settings: Arc<SettingsResolver>,
        queue: InboundQueue,
    ) -> Self {
        Self {
            channels,
            dedup,
            settings,
            queue,
        }
    }

    /// Accepts a native webhook payload for `channel`.
    ///
    /// # Errors
    ///
    /// - `Validation` for a disabled or unserved channel or a malformed payload
    /// - `Infrastructure` when the queue is full (the caller should answer
    ///   with a retryable status so the channel redelivers)
    pub async fn receive(&self, channel: Channel, payload: &JsonValue) -> Result<IntakeReport, EngineError> {
        let settings = self.settings.resolve().await;
        if !settings.channel_enabled(channel) {
            return Err(EngineError::channel_disabled(channel));
        }
        let adapter = self
            .channels
            .get(channel)
            .ok_or_else(|| EngineError::validation(format!("No adapter serves channel {}", channel)))?;

        let messages = adapter.normalize_inbound(payload)?;
        let mut report = IntakeReport::default();
        for message in messages {
            let dedup_key = message
                .dedup_key()
                .map(|(channel, id)| (channel, id.to_string()));

            if let Some((channel, id)) = &dedup_key {
                if self.dedup.record(*channel, id).await? == SaveResult::AlreadyExists {
                    tracing::debug!(channel = %channel, external_message_id = %id, "Dropping redelivered message");
                    report.duplicates += 1;
                    continue;
                }
            }

            if let Err(err) = self.queue.try_enqueue(message) {
                if let Some((channel, id)) = &dedup_key {
                    if let Err(forget_err) = self.dedup.forget(*channel, id).await {
                        tracing::error!(error = %forget_err, "Failed to release dedup record");
                    }
                }
                tracing::warn!(channel = %channel, error = %err, "Inbound message not queued");
                return Err(err);
            }
            report.accepted += 1;
        }
        Ok(report)
    }
}

/// Drains the inbound queue.
pub struct IngestWorker {
    engine: Arc<DeskEngine>,
    receiver: mpsc::Receiver<InboundMessage>,
}

impl IngestWorker {
    pub fn new(engine: Arc<DeskEngine>, receiver: mpsc::Receiver<InboundMessage>) -> Self {
        Self { engine, receiver }
    }

    /// Processes messages until shutdown, then waits for running AI turns.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ai_turns = JoinSet::new();
        tracing::info!("Ingest worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                next = self.receiver.recv() => {
                    let Some(message) = next else { break };
                    self.process(message, &mut ai_turns).await;
                }
                Some(joined) = ai_turns.join_next(), if !ai_turns.is_empty() => {
                    if let Err(err) = joined {
                        tracing::error!(error = %err, "AI turn task panicked");
                    }
                }
            }
        }

        while ai_turns.join_next().await.is_some() {}
        tracing::info!("Ingest worker stopped");
    }

    /// Processes one message (exposed for tests).
    pub async fn process(&self, message: InboundMessage, ai_turns: &mut JoinSet<()>) {
        let channel = message.channel;
        match self.engine.ingest(message).await {
            Ok(outcome) => {
                if let Some(turn) = outcome.ai_turn {
                    let engine = Arc::clone(&self.engine);
                    ai_turns.spawn(async move {
                        if let Err(err) = engine.run_ai_turn(turn).await {
                            tracing::warn!(
                                conversation_id = %turn.conversation_id,
                                error = %err,
                                "AI turn failed"
                            );
                        }
                    });
                }
            }
            Err(err) => {
                tracing::warn!(channel = %channel, error = %err, "Inbound message rejected");
            }
        }
    }
}
