//! Messaging-app channel (Cloud API style business webhooks).
//!
//! Inbound payloads nest messages under `entry[].changes[].value`; contact
//! names come from the sibling `contacts` array. Status callbacks and
//! non-text messages carry no customer text and are skipped.

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
pub struct MessagingAppConfig {
    pub phone_number_id: String,
    access_token: Secret<String>,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl MessagingAppConfig {
    pub fn new(phone_number_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            phone_number_id: phone_number_id.into(),
            access_token: Secret::new(access_token.into()),
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

pub struct MessagingAppAdapter {
    config: MessagingAppConfig,
    client: Client,
}

impl MessagingAppAdapter {
    /// # Errors
    ///
    /// `NotConfigured` if the HTTP client cannot be built.
    pub fn new(config: MessagingAppConfig) -> Result<Self, DeliveryError> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }
}

fn contact_name(value: &JsonValue, wa_id: &str) -> String {
    array_at(value, "/contacts")
        .iter()
        .find(|c| c.get("wa_id").and_then(JsonValue::as_str) == Some(wa_id))
        .and_then(|c| optional_str(c, "/profile/name"))
        .unwrap_or_default()
}

#[async_trait]
impl ChannelAdapter for MessagingAppAdapter {
    fn channel(&self) -> Channel {
        Channel::MessagingApp
    }

    fn normalize_inbound(&self, payload: &JsonValue) -> Result<Vec<InboundMessage>, ValidationError> {
        if payload.get("entry").is_none() {
            return Err(ValidationError::empty_field("entry"));
        }

        let mut normalized = Vec::new();
        for entry in array_at(payload, "/entry") {
            for change in array_at(entry, "/changes") {
                let Some(value) = change.get("value") else { continue };
                for message in array_at(value, "/messages") {
                    if message.get("type").and_then(JsonValue::as_str) != Some("text") {
                        continue;
                    }
                    let from = required_str(message, "/from")?;
                    let customer = CustomerIdentity::new(contact_name(value, from), ExternalUserId::new(from)?)
                        .with_phone(Some(from.to_string()));
                    let mut inbound =
                        InboundMessage::new(Channel::MessagingApp, customer, required_str(message, "/text/body")?)?;
                    if let Some(id) = optional_str(message, "/id") {
                        inbound = inbound.with_external_message_id(id);
                    }
                    normalized.push(inbound);
                }
            }
        }
        Ok(normalized)
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": message.recipient.as_str(),
            "type": "text",
            "text": { "body": message.text },
        });
        let request = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.config.access_token.expose_secret())
            .json(&body);

        let response = send_json(request, self.config.timeout).await?;
        Ok(match optional_str(&response, "/messages/0/id") {
            Some(id) => DeliveryReceipt::with_id(id),
            None => DeliveryReceipt::default(),
        })
    }
}
