//! AI responder - turns conversation history into a reply or an
//! unresolved signal.
//!
//! The responder is provider-agnostic: the provider is picked from the
//! resolved [`DeskSettings`] and every provider receives the same
//! [`CompletionRequest`] shape. Budgets are checked before calling out.
//!
//! # Failure policy
//!
//! A retryable provider failure (timeout, rate limit, network) is retried
//! once after `retry_backoff`. A second failure, or any non-retryable
//! failure, yields [`UnresolvedReason::ProviderFailed`] so that the caller
//! escalates instead of leaving the customer without an answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::DeskSettings;
use crate::domain::conversation::{Conversation, Message, SenderKind};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    AIError, AIProvider, AiProviderKind, CompletionRequest, FinishReason, MessageRole,
    RequestMetadata,
};

/// Responder tuning.
#[derive(Debug, Clone)]
pub struct AiResponderConfig {
    /// Bound on a single provider call.
    pub timeout: Duration,
    /// Delay before the single retry.
    pub retry_backoff: Duration,
    /// AI replies allowed since the last human reply.
    pub max_ai_turns: u32,
    /// Minutes of AI handling allowed since the last human reply.
    pub max_ai_minutes: u32,
    /// Token the model emits when it cannot help.
    pub escalation_marker: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AiResponderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(500),
            max_ai_turns: 8,
            max_ai_minutes: 60,
            escalation_marker: "HANDOFF_TO_HUMAN".to_string(),
            max_tokens: 800,
            temperature: 0.3,
        }
    }
}

impl AiResponderConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_turn_budget(mut self, turns: u32, minutes: u32) -> Self {
        self.max_ai_turns = turns;
        self.max_ai_minutes = minutes;
        self
    }

    pub fn with_escalation_marker(mut self, marker: impl Into<String>) -> Self {
        self.escalation_marker = marker.into();
        self
    }
}

/// Why the AI could not answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The model signalled it cannot help, or replied with nothing.
    ProviderDeclined,
    TurnBudgetExceeded { turns: u32 },
    TimeBudgetExceeded { minutes: i64 },
    /// The provider failed after the retry.
    ProviderFailed { error: String },
    ProviderNotConfigured { provider: AiProviderKind },
    /// An administrator paused the AI.
    Paused,
}

impl UnresolvedReason {
    /// Text stored as the escalation reason.
    pub fn describe(&self) -> String {
        match self {
            UnresolvedReason::ProviderDeclined => "AI could not resolve the request".to_string(),
            UnresolvedReason::TurnBudgetExceeded { turns } => {
                format!("AI turn budget exceeded after {} replies", turns)
            }
            UnresolvedReason::TimeBudgetExceeded { minutes } => {
                format!("AI time budget exceeded after {} minutes", minutes)
            }
            UnresolvedReason::ProviderFailed { error } => format!("AI provider failed: {}", error),
            UnresolvedReason::ProviderNotConfigured { provider } => {
                format!("AI provider {} is not configured", provider)
            }
            UnresolvedReason::Paused => "AI responder paused".to_string(),
        }
    }
}

/// Outcome of one responder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiOutcome {
    Reply { text: String, model: String },
    Unresolved(UnresolvedReason),
}

/// Produces AI replies for conversations.
pub struct AiResponder {
    providers: HashMap<AiProviderKind, Arc<dyn AIProvider>>,
    config: AiResponderConfig,
}

impl AiResponder {
    pub fn new(config: AiResponderConfig) -> Self {
        Self {
            providers: HashMap::new(),
            config,
        }
    }

    /// Builder: register a provider under its kind.
    pub fn with_provider(mut self, kind: AiProviderKind, provider: Arc<dyn AIProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    pub fn config(&self) -> &AiResponderConfig {
        &self.config
    }

    pub fn has_provider(&self, kind: AiProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Attempts a reply for `conversation` given its ordered `history`.
    pub async fn respond(
        &self,
        conversation: &Conversation,
        history: &[Message],
        settings: &DeskSettings,
    ) -> AiOutcome {
        if settings.ai_paused {
            return AiOutcome::Unresolved(UnresolvedReason::Paused);
        }
        if let Some(reason) = self.budget_exceeded(history, Timestamp::now()) {
            return AiOutcome::Unresolved(reason);
        }
        let provider = match self.providers.get(&settings.ai_provider) {
            Some(provider) => provider.clone(),
            None => {
                return AiOutcome::Unresolved(UnresolvedReason::ProviderNotConfigured {
                    provider: settings.ai_provider,
                })
            }
        };

        let request = self.build_request(conversation, history, settings);
        let response = match self.call_with_retry(provider.as_ref(), request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    conversation_id = %conversation.id(),
                    provider = %settings.ai_provider,
                    error = %err,
                    "AI provider failed after retry"
                );
                return AiOutcome::Unresolved(UnresolvedReason::ProviderFailed {
                    error: err.to_string(),
                });
            }
        };

        let text = response.content.trim();
        if text.is_empty()
            || text.contains(&self.config.escalation_marker)
            || response.finish_reason == FinishReason::ContentFilter
        {
            return AiOutcome::Unresolved(UnresolvedReason::ProviderDeclined);
        }
        AiOutcome::Reply {
            text: text.to_string(),
            model: response.model,
        }
    }

    async fn call_with_retry(
        &self,
        provider: &dyn AIProvider,
        request: CompletionRequest,
    ) -> Result<crate::ports::CompletionResponse, AIError> {
        match self.call_once(provider, request.clone()).await {
            Ok(response) => Ok(response),
            Err(err) if err.is_retryable() => {
                tracing::debug!(
                    conversation_id = %request.metadata.conversation_id,
                    attempt = 1,
                    error = %err,
                    "Retrying AI provider call"
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                self.call_once(provider, request).await
            }
            Err(err) => Err(err),
        }
    }

    async fn call_once(
        &self,
        provider: &dyn AIProvider,
        request: CompletionRequest,
    ) -> Result<crate::ports::CompletionResponse, AIError> {
        match tokio::time::timeout(self.config.timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(AIError::Timeout {
                timeout_secs: self.config.timeout.as_secs().max(1) as u32,
            }),
        }
    }

    /// Checks the turn and time budgets of the current AI window, which
    /// starts after the last agent message.
    fn budget_exceeded(&self, history: &[Message], now: Timestamp) -> Option<UnresolvedReason> {
        let window_start = history
            .iter()
            .rposition(|m| m.sender == SenderKind::Agent)
            .map(|i| i + 1)
            .unwrap_or(0);
        let window = &history[window_start..];

        let ai_turns = window.iter().filter(|m| m.sender == SenderKind::Ai).count() as u32;
        if ai_turns >= self.config.max_ai_turns {
            return Some(UnresolvedReason::TurnBudgetExceeded { turns: ai_turns });
        }

        if let Some(first) = window.first() {
            let minutes = now.duration_since(&first.created_at).num_minutes();
            if minutes >= i64::from(self.config.max_ai_minutes) {
                return Some(UnresolvedReason::TimeBudgetExceeded { minutes });
            }
        }
        None
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        history: &[Message],
        settings: &DeskSettings,
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new(RequestMetadata::new(
            conversation.id(),
            format!("{}-v{}", conversation.id(), conversation.version()),
        ))
        .with_system_prompt(self.system_prompt(settings))
        .with_max_tokens(self.config.max_tokens)
        .with_temperature(self.config.temperature);

        if let Some(model) = &settings.ai_model {
            request = request.with_model(model.clone());
        }
        for message in history {
            let role = match message.sender {
                SenderKind::Customer => MessageRole::User,
                SenderKind::Ai | SenderKind::Agent => MessageRole::Assistant,
            };
            request = request.with_message(role, message.content.clone());
        }
        request
    }

    fn system_prompt(&self, settings: &DeskSettings) -> String {
        let mut prompt = settings.system_prompt.trim().to_string();
        if !settings.knowledge_base.trim().is_empty() {
            prompt.push_str("\n\nKnowledge base:\n");
            prompt.push_str(settings.knowledge_base.trim());
        }
        prompt.push_str(&format!(
            "\n\nIf you cannot answer from the knowledge base, or the customer asks for a human, reply with exactly {}.",
            self.config.escalation_marker
        ));
        prompt
    }
}
