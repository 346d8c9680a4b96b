//! Channel configuration
//!
//! One section per channel. A channel without credentials still ingests
//! webhooks; outbound delivery to it fails and is audited.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::error::ValidationError;
use crate::domain::conversation::Channel;

/// All channel sections
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub widget: WidgetChannelConfig,

    #[serde(default)]
    pub messaging_app: MessagingAppChannelConfig,

    #[serde(default)]
    pub social_a: SocialChannelConfig,

    #[serde(default)]
    pub social_b: SocialChannelConfig,

    #[serde(default)]
    pub email: EmailChannelConfig,

    /// Base URL of the hosted survey page; surveys ask for a 1-5 reply when unset
    pub survey_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetChannelConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl Default for WidgetChannelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Hub-style webhook credentials of messaging-app and social channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubCredentials {
    /// Token echoed back during the subscription handshake
    pub verify_token: Option<String>,
    /// Secret for `X-Hub-Signature-256` body signatures
    pub app_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingAppChannelConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub phone_number_id: Option<String>,
    pub access_token: Option<Secret<String>>,
    pub api_base_url: Option<String>,
    pub verify_token: Option<Secret<String>>,
    pub app_secret: Option<Secret<String>>,
}

impl Default for MessagingAppChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phone_number_id: None,
            access_token: None,
            api_base_url: None,
            verify_token: None,
            app_secret: None,
        }
    }
}

impl MessagingAppChannelConfig {
    /// `(phone_number_id, access_token)` when both are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        let phone = self.phone_number_id.clone().filter(|p| !p.trim().is_empty())?;
        Some((phone, exposed(&self.access_token)?))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialChannelConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub page_access_token: Option<Secret<String>>,
    pub api_base_url: Option<String>,
    pub verify_token: Option<Secret<String>>,
    pub app_secret: Option<Secret<String>>,
}

impl Default for SocialChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_access_token: None,
            api_base_url: None,
            verify_token: None,
            app_secret: None,
        }
    }
}

impl SocialChannelConfig {
    pub fn page_access_token(&self) -> Option<String> {
        exposed(&self.page_access_token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailChannelConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// HTTP mail relay endpoint
    pub relay_url: Option<String>,
    pub api_key: Option<Secret<String>>,
    pub from_address: Option<String>,
}

impl Default for EmailChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            relay_url: None,
            api_key: None,
            from_address: None,
        }
    }
}

impl EmailChannelConfig {
    /// `(relay_url, api_key, from_address)` when all are set.
    pub fn credentials(&self) -> Option<(String, String, String)> {
        let relay = self.relay_url.clone().filter(|u| !u.trim().is_empty())?;
        let from = self.from_address.clone().filter(|a| !a.trim().is_empty())?;
        Some((relay, exposed(&self.api_key)?, from))
    }
}

impl ChannelsConfig {
    /// Environment default of the per-channel enable flags.
    pub fn enabled_flags(&self) -> BTreeMap<Channel, bool> {
        Channel::ALL
            .into_iter()
            .map(|channel| (channel, self.is_enabled(channel)))
            .collect()
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Widget => self.widget.enabled,
            Channel::MessagingApp => self.messaging_app.enabled,
            Channel::SocialA => self.social_a.enabled,
            Channel::SocialB => self.social_b.enabled,
            Channel::EmailLike => self.email.enabled,
        }
    }

    /// Hub credentials of a hub-verified channel.
    pub fn hub(&self, channel: Channel) -> Option<HubCredentials> {
        let (verify_token, app_secret) = match channel {
            Channel::MessagingApp => (&self.messaging_app.verify_token, &self.messaging_app.app_secret),
            Channel::SocialA => (&self.social_a.verify_token, &self.social_a.app_secret),
            Channel::SocialB => (&self.social_b.verify_token, &self.social_b.app_secret),
            Channel::Widget | Channel::EmailLike => return None,
        };
        Some(HubCredentials {
            verify_token: exposed(verify_token),
            app_secret: exposed(app_secret),
        })
    }

    /// Validate channel configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.messaging_app.phone_number_id.is_some() && self.messaging_app.access_token.is_none() {
            return Err(ValidationError::MissingRequired("CHANNELS__MESSAGING_APP__ACCESS_TOKEN"));
        }
        if self.email.relay_url.is_some() && self.email.from_address.is_none() {
            return Err(ValidationError::MissingRequired("CHANNELS__EMAIL__FROM_ADDRESS"));
        }
        Ok(())
    }
}

fn enabled() -> bool {
    true
}

fn exposed(secret: &Option<Secret<String>>) -> Option<String> {
    secret
        .as_ref()
        .map(|s| s.expose_secret().clone())
        .filter(|s| !s.trim().is_empty())
}
