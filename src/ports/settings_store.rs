//! Settings store port - administrator overrides persisted in the database.
//!
//! Every field is optional: `None` means "not set, use the environment
//! default". Once a value is stored it wins over the environment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::AiProviderKind;
use crate::domain::conversation::Channel;
use crate::domain::foundation::DomainError;

/// Stored runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<AiProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels_enabled: BTreeMap<Channel, bool>,
}

impl StoredSettings {
    /// Overlays `patch` onto `self`: every value set in `patch` replaces the
    /// stored one.
    pub fn merge(mut self, patch: StoredSettings) -> Self {
        if patch.ai_provider.is_some() {
            self.ai_provider = patch.ai_provider;
        }
        if patch.ai_model.is_some() {
            self.ai_model = patch.ai_model;
        }
        if patch.knowledge_base.is_some() {
            self.knowledge_base = patch.knowledge_base;
        }
        if patch.system_prompt.is_some() {
            self.system_prompt = patch.system_prompt;
        }
        if patch.ai_paused.is_some() {
            self.ai_paused = patch.ai_paused;
        }
        self.channels_enabled.extend(patch.channels_enabled);
        self
    }
}

/// Persistence of administrator settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Loads stored settings; an empty store yields the default.
    async fn load(&self) -> Result<StoredSettings, DomainError>;

    /// Replaces stored settings.
    async fn save(&self, settings: &StoredSettings) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SettingsStore) {}
    }

    #[test]
    fn merge_keeps_unset_values() {
        let stored = StoredSettings {
            ai_model: Some("gpt-4o".into()),
            ai_paused: Some(true),
            ..StoredSettings::default()
        };
        let mut channels = BTreeMap::new();
        channels.insert(Channel::SocialA, false);
        let patch = StoredSettings {
            ai_paused: Some(false),
            channels_enabled: channels,
            ..StoredSettings::default()
        };

        let merged = stored.merge(patch);
        assert_eq!(merged.ai_model.as_deref(), Some("gpt-4o"));
        assert_eq!(merged.ai_paused, Some(false));
        assert_eq!(merged.channels_enabled.get(&Channel::SocialA), Some(&false));
    }
}
