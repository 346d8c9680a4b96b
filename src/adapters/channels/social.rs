//! Social channels (page messaging style webhooks).
//!
//! One adapter type serves both social platforms; the instance is bound to
//! `social-a` or `social-b` at construction. Echoes of the page's own
//! messages and events without text (reads, deliveries, reactions) are
//! skipped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value as JsonValue};

use super::{array_at, http_client, optional_str, required_str, send_json};
use crate::domain::conversation::{Channel, CustomerIdentity, InboundMessage, OutboundMessage};
use crate::domain::foundation::{ExternalUserId, ValidationError};
use crate::ports::{ChannelAdapter, DeliveryError, DeliveryReceipt};

#[derive(Debug, Clone)]
pub struct SocialConfig {
    page_access_token: Secret<String>,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl SocialConfig {
    pub fn new(page_access_token: impl Into<String>) -> Self {
        Self {
            page_access_token: Secret::new(page_access_token.into()),
            api_base_url: "https://graph.facebook.com/v19.0".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct SocialAdapter {
    channel: Channel,
    config: SocialConfig,
    client: Client,
}

impl SocialAdapter {
    /// # Errors
    ///
    /// `NotConfigured` if `channel` is not a social channel or the HTTP
    /// client cannot be built.
    pub fn new(channel: Channel, config: SocialConfig) -> Result<Self, DeliveryError> {
        if !matches!(channel, Channel::SocialA | Channel::SocialB) {
            return Err(DeliveryError::NotConfigured(format!(
                "{} is not a social channel",
                channel
            )));
        }
        let client = http_client(config.timeout)?;
        Ok(Self {
            channel,
            config,
            client,
        })
    }

    fn send_url(&self) -> String {
        format!("{}/me/messages", self.config.api_base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChannelAdapter for SocialAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn normalize_inbound(&self, payload: &JsonValue) -> Result<Vec<InboundMessage>, ValidationError> {
        if payload.get("entry").is_none() {
            return Err(ValidationError::empty_field("entry"));
        }

        let mut normalized = Vec::new();
        for entry in array_at(payload, "/entry") {
            for event in array_at(entry, "/messaging") {
                let Some(message) = event.get("message") else { continue };
                if message.get("is_echo").and_then(JsonValue::as_bool) == Some(true) {
                    continue;
                }
                let Some(text) = optional_str(message, "/text") else { continue };

                let sender = required_str(event, "/sender/id")?;
                let customer = CustomerIdentity::new(
                    optional_str(event, "/sender/name").unwrap_or_default(),
                    ExternalUserId::new(sender)?,
                );
                let mut inbound = InboundMessage::new(self.channel, customer, text)?;
                if let Some(mid) = optional_str(message, "/mid") {
                    inbound = inbound.with_external_message_id(mid);
                }
                normalized.push(inbound);
            }
        }
        Ok(normalized)
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let body = json!({
            "recipient": { "id": message.recipient.as_str() },
            "messaging_type": "RESPONSE",
            "message": { "text": message.text },
        });
        let request = self
            .client
            .post(self.send_url())
            .bearer_auth(self.config.page_access_token.expose_secret())
            .json(&body);

        let response = send_json(request, self.config.timeout).await?;
        Ok(match optional_str(&response, "/message_id") {
            Some(id) => DeliveryReceipt::with_id(id),
            None => DeliveryReceipt::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(channel: Channel) -> SocialAdapter {
        SocialAdapter::new(channel, SocialConfig::new("page-token")).unwrap()
    }

    #[test]
    fn adapter_reports_its_bound_channel() {
        assert_eq!(adapter(Channel::SocialB).channel(), Channel::SocialB);
        assert!(SocialAdapter::new(Channel::Widget, SocialConfig::new("t")).is_err());
    }

    #[test]
    fn text_events_are_normalized_and_echoes_skipped() {
        let payload = json!({
            "object": "page",
            "entry": [{
                "id": "page-1",
                "messaging": [
                    {"sender": {"id": "psid-9"}, "recipient": {"id": "page-1"},
                     "message": {"mid": "m_1", "text": "Is the store open?"}},
                    {"sender": {"id": "page-1"}, "recipient": {"id": "psid-9"},
                     "message": {"mid": "m_2", "text": "Yes", "is_echo": true}},
                    {"sender": {"id": "psid-9"}, "read": {"watermark": 1}}
                ]
            }]
        });
        let messages = adapter(Channel::SocialA).normalize_inbound(&payload).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel, Channel::SocialA);
        assert_eq!(messages[0].customer.external_user_id.as_str(), "psid-9");
        assert_eq!(messages[0].dedup_key(), Some((Channel::SocialA, "m_1")));
    }

    #[test]
    fn attachment_only_message_is_skipped() {
        let payload = json!({"entry": [{"messaging": [
            {"sender": {"id": "psid-9"}, "message": {"mid": "m_3", "attachments": []}}
        ]}]});
        assert!(adapter(Channel::SocialB).normalize_inbound(&payload).unwrap().is_empty());
    }
}
