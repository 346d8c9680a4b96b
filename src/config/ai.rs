//! AI provider configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::ports::AiProviderKind;

/// AI provider configuration
///
/// `provider`, `model`, `knowledge_base`, `system_prompt` and `paused` are
/// defaults only; values stored through the settings endpoint win.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Default provider family
    #[serde(default)]
    pub provider: AiProviderKind,

    /// Model override for the default provider
    pub model: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<Secret<String>>,

    /// Gemini API key
    pub gemini_api_key: Option<Secret<String>>,

    /// OpenRouter API key
    pub openrouter_api_key: Option<Secret<String>>,

    pub openai_base_url: Option<String>,
    pub gemini_base_url: Option<String>,
    pub openrouter_base_url: Option<String>,

    /// Sent to aggregators for attribution
    pub app_url: Option<String>,

    /// Bound on one provider call, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Delay before the single retry, in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// AI replies allowed since the last human reply
    #[serde(default = "default_max_turns")]
    pub max_ai_turns: u32,

    /// Minutes of AI handling allowed since the last human reply
    #[serde(default = "default_max_minutes")]
    pub max_ai_minutes: u32,

    /// Token the model emits when it cannot help
    #[serde(default = "default_escalation_marker")]
    pub escalation_marker: String,

    #[serde(default)]
    pub knowledge_base: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Start with AI replies paused
    #[serde(default)]
    pub paused: bool,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// API key for a provider family, if configured and non-empty.
    pub fn api_key(&self, kind: AiProviderKind) -> Option<&str> {
        let key = match kind {
            AiProviderKind::OpenAI => self.openai_api_key.as_ref(),
            AiProviderKind::Gemini => self.gemini_api_key.as_ref(),
            AiProviderKind::OpenRouter => self.openrouter_api_key.as_ref(),
            AiProviderKind::Mock => None,
        };
        key.map(|k| k.expose_secret().as_str())
            .filter(|k| !k.trim().is_empty())
    }

    /// Validate AI configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        // The default provider must be usable
        if self.provider != AiProviderKind::Mock && self.api_key(self.provider).is_none() {
            return Err(ValidationError::MissingProviderKey(self.provider.as_str()));
        }
        if self.max_ai_turns == 0 || self.max_ai_minutes == 0 {
            return Err(ValidationError::InvalidTurnBudget);
        }
        if self.escalation_marker.trim().is_empty() {
            return Err(ValidationError::EmptyEscalationMarker);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::default(),
            model: None,
            openai_api_key: None,
            gemini_api_key: None,
            openrouter_api_key: None,
            openai_base_url: None,
            gemini_base_url: None,
            openrouter_base_url: None,
            app_url: None,
            timeout_secs: default_timeout(),
            retry_backoff_ms: default_retry_backoff(),
            max_ai_turns: default_max_turns(),
            max_ai_minutes: default_max_minutes(),
            escalation_marker: default_escalation_marker(),
            knowledge_base: String::new(),
            system_prompt: default_system_prompt(),
            paused: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_max_turns() -> u32 {
    8
}

fn default_max_minutes() -> u32 {
    60
}

fn default_escalation_marker() -> String {
    "HANDOFF_TO_HUMAN".to_string()
}

fn default_system_prompt() -> String {
    "You are a friendly customer support assistant. Answer briefly using the knowledge base. \
     If you cannot help, reply with HANDOFF_TO_HUMAN."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_config_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, AiProviderKind::OpenAI);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_backoff(), Duration::from_millis(500));
        assert_eq!(config.max_ai_turns, 8);
        assert!(!config.paused);
    }

    #[test]
    fn test_validation_default_provider_needs_key() {
        let config = AiConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingProviderKey("openai"))
        ));
    }

    #[test]
    fn test_mock_provider_needs_no_key() {
        let config = AiConfig {
            provider: AiProviderKind::Mock,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_lookup_ignores_blank_keys() {
        let config = AiConfig {
            provider: AiProviderKind::Gemini,
            gemini_api_key: Some(Secret::new("g-key".to_string())),
            openai_api_key: Some(Secret::new("  ".to_string())),
            ..Default::default()
        };
        assert_eq!(config.api_key(AiProviderKind::Gemini), Some("g-key"));
        assert_eq!(config.api_key(AiProviderKind::OpenAI), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_budget() {
        let config = AiConfig {
            provider: AiProviderKind::Mock,
            max_ai_turns: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
