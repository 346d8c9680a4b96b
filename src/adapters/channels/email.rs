//! Email-like channel.
//!
//! An inbound mail relay posts parsed messages as JSON:
//!
//! ```json
//! {"from": "ana@example.com", "from_name": "Ana", "subject": "Refund",
//!  "text": "Any news?", "message_id": "<CAF1@mail.example.com>"}
//! ```
//!
//! The sender address is the channel-native user id. Replies go out
//! through an HTTP mail relay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value as JsonValue};

use super::{http_client, optional_str, required_str, send_json};
use crate::domain::conversation::{Channel, CustomerIdentity, InboundMessage, OutboundMessage};
use crate::domain::foundation::{ExternalUserId, ValidationError};
use crate::ports::{ChannelAdapter, DeliveryError, DeliveryReceipt};

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub relay_url: String,
    api_key: Secret<String>,
    pub from_address: String,
    pub default_subject: String,
    pub timeout: Duration,
}

impl EmailConfig {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: impl Into<String>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            relay_url: relay_url.into(),
            api_key: Secret::new(api_key.into()),
            from_address: from_address.into(),
            default_subject: "Re: your support request".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct EmailAdapter {
    config: EmailConfig,
    client: Client,
}

impl EmailAdapter {
    /// # Errors
    ///
    /// `NotConfigured` if the HTTP client cannot be built.
    pub fn new(config: EmailConfig) -> Result<Self, DeliveryError> {
        let client = http_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

/// Keeps the address part of `Name <addr>`.
fn bare_address(from: &str) -> &str {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim(),
        _ => from.trim(),
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::EmailLike
    }

    fn normalize_inbound(&self, payload: &JsonValue) -> Result<Vec<InboundMessage>, ValidationError> {
        let address = bare_address(required_str(payload, "/from")?).to_ascii_lowercase();
        if !address.contains('@') {
            return Err(ValidationError::invalid_format("from", "not an email address"));
        }
        let customer = CustomerIdentity::new(
            optional_str(payload, "/from_name").unwrap_or_default(),
            ExternalUserId::new(address.clone())?,
        )
        .with_email(Some(address));

        let mut message = InboundMessage::new(Channel::EmailLike, customer, required_str(payload, "/text")?)?
            .with_subject(optional_str(payload, "/subject"));
        if let Some(id) = optional_str(payload, "/message_id") {
            message = message.with_external_message_id(id);
        }
        Ok(vec![message])
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let to = message
            .recipient_email
            .as_deref()
            .unwrap_or_else(|| message.recipient.as_str());
        let body = json!({
            "from": self.config.from_address,
            "to": to,
            "subject": message.subject.as_deref().unwrap_or(&self.config.default_subject),
            "text": message.text,
        });
        let request = self
            .client
            .post(&self.config.relay_url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body);

        let response = send_json(request, self.config.timeout).await?;
        Ok(match optional_str(&response, "/id") {
            Some(id) => DeliveryReceipt::with_id(id),
            None => DeliveryReceipt::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> EmailAdapter {
        EmailAdapter::new(EmailConfig::new("http://relay.local/send", "k", "desk@example.com")).unwrap()
    }

    #[test]
    fn sender_address_becomes_customer_id() {
        let payload = json!({
            "from": "Ana Lima <Ana@Example.com>",
            "from_name": "Ana Lima",
            "subject": "Refund",
            "text": "Any news?",
            "message_id": "<CAF1@mail.example.com>"
        });
        let messages = adapter().normalize_inbound(&payload).unwrap();
        let m = &messages[0];

        assert_eq!(m.customer.external_user_id.as_str(), "ana@example.com");
        assert_eq!(m.customer.email.as_deref(), Some("ana@example.com"));
        assert_eq!(m.subject.as_deref(), Some("Refund"));
        assert_eq!(m.dedup_key(), Some((Channel::EmailLike, "<CAF1@mail.example.com>")));
    }

    #[test]
    fn sender_without_address_is_rejected() {
        let err = adapter()
            .normalize_inbound(&json!({"from": "nobody", "text": "hi"}))
            .unwrap_err();
        assert_eq!(err.field(), "from");
    }
}
