//! Chat widget channel.
//!
//! The widget posts JSON straight from the customer's browser:
//!
//! ```json
//! {"session_id": "w-81f2", "name": "Ana", "email": "ana@example.com",
//!  "message": "Where is my order?", "message_id": "c-17"}
//! ```
//!
//! Replies are not pushed; the widget reads them through the message API,
//! so delivery always succeeds.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{optional_str, required_str};
use crate::domain::conversation::{Channel, CustomerIdentity, InboundMessage, OutboundMessage};
use crate::domain::foundation::{ExternalUserId, ValidationError};
use crate::ports::{ChannelAdapter, DeliveryError, DeliveryReceipt};

#[derive(Debug, Default, Clone, Copy)]
pub struct WidgetAdapter;

impl WidgetAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelAdapter for WidgetAdapter {
    fn channel(&self) -> Channel {
        Channel::Widget
    }

    fn normalize_inbound(&self, payload: &JsonValue) -> Result<Vec<InboundMessage>, ValidationError> {
        let session = ExternalUserId::new(required_str(payload, "/session_id")?)?;
        let name = optional_str(payload, "/name").unwrap_or_default();
        let customer = CustomerIdentity::new(name, session)
            .with_email(optional_str(payload, "/email"))
            .with_phone(optional_str(payload, "/phone"));

        let mut message = InboundMessage::new(Channel::Widget, customer, required_str(payload, "/message")?)?;
        if let Some(id) = optional_str(payload, "/message_id") {
            message = message.with_external_message_id(id);
        }
        Ok(vec![message])
    }

    async fn deliver(&self, _message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        Ok(DeliveryReceipt::default())
    }
}
