//! Shared state handed to every HTTP handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::channels::HubVerifier;
use crate::application::{DeskEngine, WebhookIntake};
use crate::domain::conversation::Channel;

/// Application state for the desk API. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DeskEngine>,
    pub intake: Arc<WebhookIntake>,
    /// Hub verifiers keyed by channel; channels without an entry accept
    /// unsigned webhooks.
    pub verifiers: Arc<HashMap<Channel, HubVerifier>>,
}

impl AppState {
    pub fn new(engine: Arc<DeskEngine>, intake: Arc<WebhookIntake>) -> Self {
        Self {
            engine,
            intake,
            verifiers: Arc::new(HashMap::new()),
        }
    }

    pub fn with_verifier(mut self, channel: Channel, verifier: HubVerifier) -> Self {
        Arc::make_mut(&mut self.verifiers).insert(channel, verifier);
        self
    }

    pub fn verifier(&self, channel: Channel) -> Option<&HubVerifier> {
        self.verifiers.get(&channel)
    }
}
