//! Channel adapter port.
//!
//! One implementation per external channel, selected by a registry keyed on
//! [`Channel`]. The engine only ever calls `normalize_inbound` and `deliver`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::conversation::{Channel, InboundMessage, OutboundMessage};
use crate::domain::foundation::ValidationError;

/// Capability set of one customer channel.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> Channel;

    /// Translates a native webhook payload into canonical messages.
    ///
    /// Payloads that carry no customer text (delivery receipts, echoes of
    /// our own messages) yield an empty vector.
    ///
    /// # Errors
    ///
    /// `ValidationError` when the payload is malformed.
    fn normalize_inbound(&self, payload: &JsonValue) -> Result<Vec<InboundMessage>, ValidationError>;

    /// Sends text to the customer in the channel's wire format.
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError>;
}

/// Proof of a successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Channel-native id of the sent message, when the channel returns one.
    pub external_message_id: Option<String>,
}

impl DeliveryReceipt {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            external_message_id: Some(id.into()),
        }
    }
}

/// Outbound delivery failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    /// The channel rejected the request; retrying will not help.
    #[error("rejected by channel ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Channel API is temporarily unavailable (5xx, rate limit).
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Delivery exceeded its timeout.
    #[error("delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Missing credentials or disabled channel.
    #[error("channel not configured: {0}")]
    NotConfigured(String),
}

impl DeliveryError {
    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::Unavailable(_) | DeliveryError::Network(_) | DeliveryError::Timeout { .. }
        )
    }

    /// Classifies an HTTP error status from a channel API.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 || status >= 500 {
            DeliveryError::Unavailable(format!("HTTP {}: {}", status, body))
        } else {
            DeliveryError::Rejected {
                status,
                message: body,
            }
        }
    }
}
