//! Customer-facing channels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// External surface a conversation arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Embedded chat widget on the customer's site.
    Widget,
    /// Messaging-app business webhook (WhatsApp Cloud style).
    MessagingApp,
    /// First social platform (page messaging).
    SocialA,
    /// Second social platform (direct messages).
    SocialB,
    /// Inbound email relay.
    EmailLike,
}

impl Channel {
    /// Every channel, in registry order.
    pub const ALL: [Channel; 5] = [
        Channel::Widget,
        Channel::MessagingApp,
        Channel::SocialA,
        Channel::SocialB,
        Channel::EmailLike,
    ];

    /// Path/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Widget => "widget",
            Channel::MessagingApp => "messaging-app",
            Channel::SocialA => "social-a",
            Channel::SocialB => "social-b",
            Channel::EmailLike => "email-like",
        }
    }

    /// Channels whose webhooks use the hub challenge handshake and
    /// `X-Hub-Signature-256` body signatures.
    pub fn uses_hub_verification(&self) -> bool {
        matches!(
            self,
            Channel::MessagingApp | Channel::SocialA | Channel::SocialB
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::invalid_format("channel", format!("unknown channel '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn unknown_channel_is_validation_error() {
        let err = "fax".parse::<Channel>().unwrap_err();
        assert_eq!(err.field(), "channel");
    }

    #[test]
    fn serde_uses_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Channel::MessagingApp).unwrap(),
            "\"messaging-app\""
        );
    }

    #[test]
    fn widget_and_email_skip_hub_verification() {
        assert!(!Channel::Widget.uses_hub_verification());
        assert!(!Channel::EmailLike.uses_hub_verification());
        assert!(Channel::SocialB.uses_hub_verification());
    }
}
