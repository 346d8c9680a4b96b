//! OpenAI-compatible provider - chat completions for OpenAI and for
//! aggregators that speak the same API (OpenRouter style).
//!
//! # Configuration
//!
//! ```ignore
//! let openai = OpenAICompatibleProvider::new(
//!     OpenAICompatibleConfig::openai(api_key).with_model("gpt-4o-mini"),
//! )?;
//! let router = OpenAICompatibleProvider::new(
//!     OpenAICompatibleConfig::openrouter(api_key).with_model("anthropic/claude-3.5-sonnet"),
//! )?;
//! ```
//!
//! One HTTP call per `complete`; retries belong to the AI responder.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{classify_send_error, error_for_status};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, FinishReason, MessageRole,
    ProviderInfo, TokenUsage,
};

/// Configuration for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    api_key: Secret<String>,
    /// Name reported in `ProviderInfo` and logs.
    pub name: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Sent as `HTTP-Referer` / `X-Title` when set (aggregator attribution).
    pub app_url: Option<String>,
    pub app_title: Option<String>,
}

impl OpenAICompatibleConfig {
    /// OpenAI defaults.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            name: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
            app_url: None,
            app_title: None,
        }
    }

    /// OpenRouter defaults.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            name: "openrouter".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            app_title: Some("Support Desk".to_string()),
            ..Self::openai(api_key)
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Provider for OpenAI-compatible chat completions.
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    /// # Errors
    ///
    /// `InvalidRequest` if the HTTP client cannot be built.
    pub fn new(config: OpenAICompatibleConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::InvalidRequest(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn to_chat_request(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }
        for msg in &request.messages {
            messages.push(ChatMessage {
                role: match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: msg.content.clone(),
            });
        }

        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.config.model.clone()),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Response, AIError> {
        let mut builder = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key())
            .json(&self.to_chat_request(request));
        if let Some(url) = &self.config.app_url {
            builder = builder.header("HTTP-Referer", url);
        }
        if let Some(title) = &self.config.app_title {
            builder = builder.header("X-Title", title);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.config.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status.as_u16(), body))
    }
}

#[async_trait]
impl AIProvider for OpenAICompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let response = self.send(&request).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse response: {}", e)))?;
        let completion = body.into_completion()?;

        tracing::debug!(
            provider = %self.config.name,
            model = %completion.model,
            total_tokens = completion.usage.total_tokens,
            conversation_id = %request.metadata.conversation_id,
            "Completion received"
        );
        Ok(completion)
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new(&self.config.name, &self.config.model)
    }
}

// ----- Wire Types -----

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_completion(self) -> Result<CompletionResponse, AIError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AIError::parse("No choices in response"))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some("error") => FinishReason::Error,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content: choice.message.content,
            usage: self
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default(),
            model: self.model,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConversationId;
    use crate::ports::RequestMetadata;

    fn provider(config: OpenAICompatibleConfig) -> OpenAICompatibleProvider {
        OpenAICompatibleProvider::new(config).unwrap()
    }

    #[test]
    fn openrouter_preset_overrides_endpoint_and_name() {
        let config = OpenAICompatibleConfig::openrouter("key").with_model("meta/llama");
        assert_eq!(config.name, "openrouter");
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.model, "meta/llama");
        assert_eq!(config.api_key(), "key");
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let p = provider(OpenAICompatibleConfig::openai("k").with_base_url("http://localhost:9000/v1/"));
        assert_eq!(p.completions_url(), "http://localhost:9000/v1/chat/completions");
    }

    #[test]
    fn request_puts_system_prompt_first_and_honours_model_override() {
        let p = provider(OpenAICompatibleConfig::openai("k"));
        let request = CompletionRequest::new(RequestMetadata::new(ConversationId::new(), "t"))
            .with_system_prompt("You are the desk assistant")
            .with_message(MessageRole::User, "hi")
            .with_message(MessageRole::Assistant, "hello")
            .with_model("gpt-4o");

        let wire = p.to_chat_request(&request);
        let roles: Vec<&str> = wire.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(wire.model, "gpt-4o");
    }

    #[test]
    fn response_maps_finish_reason_and_usage() {
        let body = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "Sure"}, "finish_reason": "content_filter"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let completion = parsed.into_completion().unwrap();

        assert_eq!(completion.content, "Sure");
        assert_eq!(completion.finish_reason, FinishReason::ContentFilter);
        assert_eq!(completion.usage.total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_a_parse_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        assert!(matches!(parsed.into_completion(), Err(AIError::Parse(_))));
    }
}
