//! Outbound delivery with bounded retries.
//!
//! Deliveries run after the transition that produced the text has been
//! committed and the conversation lock released. When every attempt fails a
//! `delivery_failed` audit entry is appended; the conversation itself is
//! never blocked or rolled back.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::audit::{AuditAction, AuditRecord, EntityRef, FieldDiff};
use crate::domain::conversation::{Channel, Conversation, OutboundMessage};
use crate::domain::foundation::{Actor, ConversationId};
use crate::domain::ticket::CsatRating;
use crate::ports::{
    ChangeSet, ChannelAdapter, DeliveryError, DeliveryReceipt, SurveyNotifier, TransitionCommitter,
};

/// Channel adapters keyed by channel.
#[derive(Default)]
pub struct ChannelRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register an adapter under the channel it reports.
    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    /// Registered channels, in declaration order.
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .iter()
            .copied()
            .filter(|c| self.adapters.contains_key(c))
            .collect()
    }
}

/// Retry policy for outbound calls.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards.
    pub backoff: Duration,
    /// Bound on each attempt.
    pub timeout: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

/// What happened to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered(DeliveryReceipt),
    Failed { error: String, attempts: u32 },
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered(_))
    }
}

/// Sends replies and survey requests to customers.
pub struct DeliveryService {
    channels: Arc<ChannelRegistry>,
    surveys: Arc<dyn SurveyNotifier>,
    committer: Arc<dyn TransitionCommitter>,
    policy: DeliveryPolicy,
}

impl DeliveryService {
    pub fn new(
        channels: Arc<ChannelRegistry>,
        surveys: Arc<dyn SurveyNotifier>,
        committer: Arc<dyn TransitionCommitter>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            channels,
            surveys,
            committer,
            policy,
        }
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// Delivers `message` to the customer of `conversation`.
    pub async fn deliver(&self, conversation: &Conversation, message: OutboundMessage) -> DeliveryStatus {
        let Some(adapter) = self.channels.get(message.channel) else {
            let error = DeliveryError::NotConfigured(format!("no adapter for {}", message.channel));
            self.record_failure(conversation.id(), "reply", &error, 0).await;
            return DeliveryStatus::Failed {
                error: error.to_string(),
                attempts: 0,
            };
        };

        let result = self
            .with_retries(conversation.id(), "reply", || {
                let adapter = adapter.clone();
                let message = message.clone();
                async move { adapter.deliver(&message).await }
            })
            .await;

        match result {
            Ok(receipt) => DeliveryStatus::Delivered(receipt),
            Err((error, attempts)) => {
                self.record_failure(conversation.id(), "reply", &error, attempts).await;
                DeliveryStatus::Failed {
                    error: error.to_string(),
                    attempts,
                }
            }
        }
    }

    /// Sends the CSAT survey request for a freshly created rating.
    pub async fn request_survey(&self, conversation: &Conversation, csat: &CsatRating) -> DeliveryStatus {
        let result = self
            .with_retries(conversation.id(), "survey", || async move {
                self.surveys.request_survey(conversation, csat).await
            })
            .await;

        match result {
            Ok(()) => DeliveryStatus::Delivered(DeliveryReceipt::default()),
            Err((error, attempts)) => {
                self.record_failure(conversation.id(), "survey", &error, attempts).await;
                DeliveryStatus::Failed {
                    error: error.to_string(),
                    attempts,
                }
            }
        }
    }

    /// Runs `op` up to `max_attempts` times with doubling backoff. Returns
    /// the last error and the number of attempts made.
    async fn with_retries<T, F, Fut>(
        &self,
        conversation_id: ConversationId,
        what: &str,
        op: F,
    ) -> Result<T, (DeliveryError, u32)>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout {
                    timeout_ms: self.policy.timeout.as_millis() as u64,
                }),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::debug!(
                        conversation_id = %conversation_id,
                        attempt,
                        error = %err,
                        "Retrying {} delivery",
                        what
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => {
                    tracing::warn!(
                        conversation_id = %conversation_id,
                        attempt,
                        error = %err,
                        "{} delivery failed",
                        what
                    );
                    return Err((err, attempt));
                }
            }
        }
    }

    /// Appends the `delivery_failed` audit entry. Audit-only, so no lock is
    /// needed; a failure here is logged and swallowed.
    async fn record_failure(
        &self,
        conversation_id: ConversationId,
        what: &str,
        error: &DeliveryError,
        attempts: u32,
    ) {
        let diff = FieldDiff::new()
            .added("delivery", what)
            .added("error", &error.to_string())
            .added("attempts", &attempts);
        let record = AuditRecord::new(
            AuditAction::DeliveryFailed,
            EntityRef::Conversation(conversation_id),
            &Actor::system(),
        )
        .with_changes(diff);

        if let Err(err) = self.committer.commit(ChangeSet::new(record)).await {
            tracing::error!(
                conversation_id = %conversation_id,
                error = %err,
                "Failed to record delivery failure"
            );
        }
    }
}
