//! Normalized channel message shapes.
//!
//! Channel adapters translate native webhook payloads into [`InboundMessage`]
//! and the engine hands [`OutboundMessage`] back to them for delivery.

use serde::{Deserialize, Serialize};

use super::Channel;
use crate::domain::foundation::{ExternalUserId, Timestamp, ValidationError};

/// Customer identity as known to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub external_user_id: ExternalUserId,
}

impl CustomerIdentity {
    /// Creates an identity; a blank name falls back to the external id.
    pub fn new(name: impl Into<String>, external_user_id: ExternalUserId) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            external_user_id.as_str().to_string()
        } else {
            name.trim().to_string()
        };
        Self {
            name,
            email: None,
            phone: None,
            external_user_id,
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Canonical inbound message produced by a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: Channel,
    pub customer: CustomerIdentity,
    /// Channel-native message id; used to drop webhook redeliveries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,
    /// Subject line for email-like messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub content: String,
    pub received_at: Timestamp,
}

impl InboundMessage {
    /// Creates an inbound message.
    ///
    /// # Errors
    ///
    /// `EmptyField` if content is blank.
    pub fn new(
        channel: Channel,
        customer: CustomerIdentity,
        content: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ValidationError::empty_field("content"));
        }
        Ok(Self {
            channel,
            customer,
            external_message_id: None,
            subject: None,
            content,
            received_at: Timestamp::now(),
        })
    }

    pub fn with_external_message_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.trim().is_empty() {
            self.external_message_id = Some(id);
        }
        self
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn received_at(mut self, at: Timestamp) -> Self {
        self.received_at = at;
        self
    }

    /// Key used for redelivery detection, when the channel supplies one.
    pub fn dedup_key(&self) -> Option<(Channel, &str)> {
        self.external_message_id
            .as_deref()
            .map(|id| (self.channel, id))
    }
}

/// Text the engine wants delivered to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub recipient: ExternalUserId,
    /// Email address for email-like delivery, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub text: String,
}

impl OutboundMessage {
    /// Addresses a message to the customer of a conversation.
    pub fn to_customer(channel: Channel, customer: &CustomerIdentity, text: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: customer.external_user_id.clone(),
            recipient_email: customer.email.clone(),
            subject: None,
            text: text.into(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> CustomerIdentity {
        CustomerIdentity::new("  ", ExternalUserId::new("wa-5511").unwrap())
    }

    #[test]
    fn blank_name_falls_back_to_external_id() {
        assert_eq!(customer().name, "wa-5511");
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(InboundMessage::new(Channel::Widget, customer(), "\n").is_err());
    }

    #[test]
    fn dedup_key_requires_message_id() {
        let msg = InboundMessage::new(Channel::MessagingApp, customer(), "hi").unwrap();
        assert!(msg.dedup_key().is_none());

        let msg = msg.with_external_message_id("wamid.1");
        assert_eq!(msg.dedup_key(), Some((Channel::MessagingApp, "wamid.1")));
    }

    #[test]
    fn outbound_copies_customer_email() {
        let c = customer().with_email(Some("a@b.io".into()));
        let out = OutboundMessage::to_customer(Channel::EmailLike, &c, "hello");
        assert_eq!(out.recipient_email.as_deref(), Some("a@b.io"));
        assert_eq!(out.recipient.as_str(), "wa-5511");
    }
}
