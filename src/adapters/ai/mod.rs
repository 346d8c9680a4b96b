//! AI provider adapters.
//!
//! - `OpenAICompatibleProvider` - OpenAI and OpenRouter-style aggregators
//! - `GeminiProvider` - Google Gemini
//! - `MockAIProvider` - scripted replies

mod gemini_provider;
mod mock_provider;
mod openai_compatible;

pub use gemini_provider::{GeminiConfig, GeminiProvider};
pub use mock_provider::{MockAIProvider, MockError, MockResponse};
pub use openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};

use std::time::Duration;

use crate::ports::AIError;

/// Maps a transport failure to an `AIError`.
pub(crate) fn classify_send_error(err: reqwest::Error, timeout: Duration) -> AIError {
    if err.is_timeout() {
        AIError::Timeout {
            timeout_secs: timeout.as_secs() as u32,
        }
    } else if err.is_connect() {
        AIError::network(format!("Connection failed: {}", err))
    } else {
        AIError::network(err.to_string())
    }
}

/// Maps a non-success HTTP status to an `AIError`.
pub(crate) fn error_for_status(status: u16, body: String) -> AIError {
    match status {
        401 | 403 => AIError::AuthenticationFailed,
        429 => AIError::rate_limited(parse_retry_after(&body)),
        400 | 404 | 422 => AIError::InvalidRequest(body),
        500..=599 => AIError::unavailable(format!("Server error {}: {}", status, body)),
        _ => AIError::network(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Extracts "try again in Ns" from a rate-limit message; 30s otherwise.
fn parse_retry_after(body: &str) -> u32 {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string());

    message
        .find("try again in ")
        .map(|idx| &message[idx + 13..])
        .and_then(|rest| {
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(30)
}
