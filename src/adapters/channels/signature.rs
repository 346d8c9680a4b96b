//! Hub-style webhook verification.
//!
//! Two checks protect the messaging-app and social webhooks:
//!
//! 1. Subscription handshake: the platform sends
//!    `GET ?hub.mode=subscribe&hub.verify_token=..&hub.challenge=..`; the
//!    challenge is echoed back only when the token matches.
//! 2. Body signature: every POST carries
//!    `X-Hub-Signature-256: sha256=<hex hmac of the raw body>` keyed with the
//!    app secret. Without a configured secret the check is skipped.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,

    #[error("malformed signature header")]
    Malformed,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verifier for one channel's webhook.
#[derive(Debug, Clone)]
pub struct HubVerifier {
    verify_token: Option<Secret<String>>,
    app_secret: Option<Secret<String>>,
}

impl HubVerifier {
    pub fn new(verify_token: Option<String>, app_secret: Option<String>) -> Self {
        Self {
            verify_token: verify_token.filter(|t| !t.is_empty()).map(Secret::new),
            app_secret: app_secret.filter(|s| !s.is_empty()).map(Secret::new),
        }
    }

    /// Answers the subscription handshake. Returns the challenge to echo,
    /// or `None` when the request must be refused.
    pub fn verify_subscription(&self, mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> Option<String> {
        let expected = self.verify_token.as_ref()?;
        if mode != Some("subscribe") {
            return None;
        }
        let token = token?;
        let matches: bool = token
            .as_bytes()
            .ct_eq(expected.expose_secret().as_bytes())
            .into();
        if matches {
            challenge.map(String::from)
        } else {
            None
        }
    }

    /// Checks the body signature.
    ///
    /// # Errors
    ///
    /// - `Missing` when a secret is configured but no header was sent
    /// - `Malformed` when the header is not `sha256=<hex>`
    /// - `Mismatch` when the HMAC differs
    pub fn verify_body(&self, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let Some(secret) = &self.app_secret else {
            return Ok(());
        };
        let header = header.ok_or(SignatureError::Missing)?;
        let hex_digest = header
            .trim()
            .strip_prefix("sha256=")
            .ok_or(SignatureError::Malformed)?;
        let provided = hex::decode(hex_digest).map_err(|_| SignatureError::Malformed)?;

        let expected = sign(secret.expose_secret(), body).ok_or(SignatureError::Malformed)?;
        if expected.len() == provided.len() && bool::from(expected.ct_eq(&provided)) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Whether POST bodies are signature-checked.
    pub fn checks_signatures(&self) -> bool {
        self.app_secret.is_some()
    }
}

fn sign(secret: &str, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Header value for `body` signed with `secret` (test fixtures).
#[cfg(test)]
pub fn signature_header(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", hex::encode(sign(secret, body).unwrap_or_default()))
}
