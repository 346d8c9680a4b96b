//! Recording channel adapter.
//!
//! Accepts canonical `InboundMessage` JSON (a single object or an array)
//! and records every delivery in memory. Failures can be scripted to
//! exercise the delivery retry policy. Used for local development and by
//! the integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::conversation::{Channel, InboundMessage, OutboundMessage};
use crate::domain::foundation::ValidationError;
use crate::ports::{ChannelAdapter, DeliveryError, DeliveryReceipt};

pub struct RecordingChannelAdapter {
    channel: Channel,
    delivered: Mutex<Vec<OutboundMessage>>,
    failures: Mutex<VecDeque<DeliveryError>>,
}

impl RecordingChannelAdapter {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            delivered: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Builder: fail the next delivery with `error` (queued in order).
    pub fn failing_with(self, error: DeliveryError) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
        self
    }

    /// Messages delivered so far.
    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChannelAdapter for RecordingChannelAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn normalize_inbound(&self, payload: &JsonValue) -> Result<Vec<InboundMessage>, ValidationError> {
        let items: Vec<JsonValue> = match payload {
            JsonValue::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        items
            .into_iter()
            .map(|item| {
                let mut message: InboundMessage = serde_json::from_value(item)
                    .map_err(|e| ValidationError::invalid_format("payload", e.to_string()))?;
                message.channel = self.channel;
                Ok(message)
            })
            .collect()
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let scripted = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(error) = scripted {
            return Err(error);
        }
        let mut delivered = self
            .delivered
            .lock()
            .map_err(|_| DeliveryError::Unavailable("recorder lock poisoned".into()))?;
        delivered.push(message.clone());
        Ok(DeliveryReceipt::with_id(format!("rec-{}", delivered.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::CustomerIdentity;
    use crate::domain::foundation::ExternalUserId;

    fn outbound() -> OutboundMessage {
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("u1").unwrap());
        OutboundMessage::to_customer(Channel::Widget, &customer, "hello")
    }

    #[tokio::test]
    async fn scripted_failures_come_before_successes() {
        let adapter = RecordingChannelAdapter::new(Channel::Widget)
            .failing_with(DeliveryError::Unavailable("down".into()));

        assert!(adapter.deliver(&outbound()).await.is_err());
        let receipt = adapter.deliver(&outbound()).await.unwrap();
        assert_eq!(receipt.external_message_id.as_deref(), Some("rec-1"));
        assert_eq!(adapter.delivered().len(), 1);
    }

    #[test]
    fn canonical_payload_is_bound_to_adapter_channel() {
        let customer = CustomerIdentity::new("Ana", ExternalUserId::new("u1").unwrap());
        let inbound = InboundMessage::new(Channel::Widget, customer, "hi").unwrap();
        let payload = serde_json::to_value(vec![inbound]).unwrap();

        let adapter = RecordingChannelAdapter::new(Channel::SocialB);
        let messages = adapter.normalize_inbound(&payload).unwrap();
        assert_eq!(messages[0].channel, Channel::SocialB);
    }
}
