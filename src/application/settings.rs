//! Runtime settings resolution.
//!
//! Settings are resolved once per request: stored administrator values win,
//! environment configuration fills the gaps. The resolved snapshot is passed
//! explicitly into every AI turn and webhook intake.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::EngineError;
use crate::domain::conversation::Channel;
use crate::ports::{AiProviderKind, SettingsStore, StoredSettings};

/// Effective runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeskSettings {
    pub ai_provider: AiProviderKind,
    pub ai_model: Option<String>,
    pub knowledge_base: String,
    pub system_prompt: String,
    pub ai_paused: bool,
    pub channels_enabled: BTreeMap<Channel, bool>,
}

impl DeskSettings {
    /// Whether a channel may ingest and deliver. Unlisted channels are enabled.
    pub fn channel_enabled(&self, channel: Channel) -> bool {
        self.channels_enabled.get(&channel).copied().unwrap_or(true)
    }

    /// Applies stored overrides on top of `self`.
    fn overlay(mut self, stored: StoredSettings) -> Self {
        if let Some(provider) = stored.ai_provider {
            self.ai_provider = provider;
        }
        if stored.ai_model.is_some() {
            self.ai_model = stored.ai_model;
        }
        if let Some(kb) = stored.knowledge_base {
            self.knowledge_base = kb;
        }
        if let Some(prompt) = stored.system_prompt {
            self.system_prompt = prompt;
        }
        if let Some(paused) = stored.ai_paused {
            self.ai_paused = paused;
        }
        self.channels_enabled.extend(stored.channels_enabled);
        self
    }
}

/// Database-first, environment-fallback settings resolution.
pub struct SettingsResolver {
    store: Arc<dyn SettingsStore>,
    defaults: DeskSettings,
}

impl SettingsResolver {
    pub fn new(store: Arc<dyn SettingsStore>, defaults: DeskSettings) -> Self {
        Self { store, defaults }
    }

    /// The environment-supplied defaults.
    pub fn defaults(&self) -> &DeskSettings {
        &self.defaults
    }

    /// Resolves the effective settings.
    ///
    /// A store failure degrades to the defaults rather than failing the
    /// request.
    pub async fn resolve(&self) -> DeskSettings {
        match self.store.load().await {
            Ok(stored) => self.defaults.clone().overlay(stored),
            Err(err) => {
                tracing::warn!(error = %err, "Settings store unavailable, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// Stores an administrator patch and returns the new effective settings.
    pub async fn update(&self, patch: StoredSettings) -> Result<DeskSettings, EngineError> {
        let stored = self.store.load().await?.merge(patch);
        self.store.save(&stored).await?;
        tracing::info!(
            ai_paused = ?stored.ai_paused,
            provider = ?stored.ai_provider,
            "Runtime settings updated"
        );
        Ok(self.defaults.clone().overlay(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::DomainError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockSettingsStore {
        stored: Mutex<StoredSettings>,
        fail: bool,
    }

    impl MockSettingsStore {
        fn new(stored: StoredSettings) -> Self {
            Self {
                stored: Mutex::new(stored),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                stored: Mutex::new(StoredSettings::default()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl SettingsStore for MockSettingsStore {
        async fn load(&self) -> Result<StoredSettings, DomainError> {
            if self.fail {
                return Err(DomainError::database("connection refused"));
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn save(&self, settings: &StoredSettings) -> Result<(), DomainError> {
            *self.stored.lock().unwrap() = settings.clone();
            Ok(())
        }
    }

    fn defaults() -> DeskSettings {
        DeskSettings {
            ai_provider: AiProviderKind::OpenAI,
            ai_model: Some("gpt-4o-mini".into()),
            knowledge_base: "env kb".into(),
            system_prompt: "env prompt".into(),
            ai_paused: false,
            channels_enabled: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn stored_values_override_environment() {
        let store = Arc::new(MockSettingsStore::new(StoredSettings {
            ai_provider: Some(AiProviderKind::Gemini),
            ai_paused: Some(true),
            ..StoredSettings::default()
        }));
        let resolver = SettingsResolver::new(store, defaults());

        let settings = resolver.resolve().await;
        assert_eq!(settings.ai_provider, AiProviderKind::Gemini);
        assert!(settings.ai_paused);
        assert_eq!(settings.system_prompt, "env prompt");
    }

    #[tokio::test]
    async fn store_failure_falls_back_to_defaults() {
        let resolver = SettingsResolver::new(Arc::new(MockSettingsStore::failing()), defaults());
        assert_eq!(resolver.resolve().await, defaults());
    }

    #[tokio::test]
    async fn update_persists_patch() {
        let store = Arc::new(MockSettingsStore::new(StoredSettings::default()));
        let resolver = SettingsResolver::new(store.clone(), defaults());

        let mut channels = BTreeMap::new();
        channels.insert(Channel::SocialB, false);
        let updated = resolver
            .update(StoredSettings {
                channels_enabled: channels,
                ..StoredSettings::default()
            })
            .await
            .unwrap();

        assert!(!updated.channel_enabled(Channel::SocialB));
        assert!(updated.channel_enabled(Channel::Widget));
        assert!(!resolver.resolve().await.channel_enabled(Channel::SocialB));
    }
}
