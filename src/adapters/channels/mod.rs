//! Channel adapters - one per customer channel.
//!
//! Each adapter turns its channel's native webhook payload into canonical
//! `InboundMessage`s and delivers `OutboundMessage`s through the channel's
//! send API.
//!
//! | Adapter | Channel | Outbound |
//! |---------|---------|----------|
//! | `WidgetAdapter` | widget | read by the widget via the message API |
//! | `MessagingAppAdapter` | messaging-app | Cloud API `/{phone_id}/messages` |
//! | `SocialAdapter` | social-a, social-b | Send API `/me/messages` |
//! | `EmailAdapter` | email-like | HTTP mail relay |
//! | `RecordingChannelAdapter` | any | recorded in memory |
//!
//! `HubVerifier` implements the subscription handshake and body signature
//! check shared by the hub-style webhooks.

mod email;
mod messaging_app;
mod recording;
mod signature;
mod social;
mod survey;
mod widget;

pub use email::{EmailAdapter, EmailConfig};
pub use messaging_app::{MessagingAppAdapter, MessagingAppConfig};
pub use recording::RecordingChannelAdapter;
pub use signature::{HubVerifier, SignatureError, SIGNATURE_HEADER};
pub use social::{SocialAdapter, SocialConfig};
pub use survey::ChannelSurveyNotifier;
pub use widget::WidgetAdapter;

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::Value as JsonValue;

use crate::domain::foundation::ValidationError;
use crate::ports::DeliveryError;

/// Builds the HTTP client of a delivering adapter.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, DeliveryError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DeliveryError::NotConfigured(format!("HTTP client: {}", e)))
}

/// Sends a prepared request and returns the JSON body of a 2xx response.
pub(crate) async fn send_json(request: RequestBuilder, timeout: Duration) -> Result<JsonValue, DeliveryError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            DeliveryError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else {
            DeliveryError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| DeliveryError::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(DeliveryError::from_status(status.as_u16(), body));
    }
    if body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| DeliveryError::Network(format!("unreadable channel response: {}", e)))
}

/// Required string at a JSON pointer.
pub(crate) fn required_str<'a>(value: &'a JsonValue, pointer: &str) -> Result<&'a str, ValidationError> {
    value
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ValidationError::empty_field(pointer.trim_start_matches('/').replace('/', ".")))
}

/// Optional string at a JSON pointer.
pub(crate) fn optional_str(value: &JsonValue, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

/// Array at a JSON pointer; absent means empty.
pub(crate) fn array_at<'a>(value: &'a JsonValue, pointer: &str) -> &'a [JsonValue] {
    value
        .pointer(pointer)
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_str_names_the_missing_field() {
        let payload = json!({"message": {"text": "  "}});
        let err = required_str(&payload, "/message/text").unwrap_err();
        assert_eq!(err.field(), "message.text");
    }

    #[test]
    fn array_at_treats_missing_as_empty() {
        assert!(array_at(&json!({}), "/entry").is_empty());
        assert_eq!(array_at(&json!({"entry": [1, 2]}), "/entry").len(), 2);
    }
}
