//! Engine configuration: delivery retries, background workers and ticket
//! defaults.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Outbound delivery attempts per message
    #[serde(default = "default_delivery_attempts")]
    pub delivery_max_attempts: u32,

    /// Delay before the second delivery attempt, doubled afterwards (ms)
    #[serde(default = "default_delivery_backoff")]
    pub delivery_backoff_ms: u64,

    /// Bound on one delivery attempt (seconds)
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Unclaimed escalations older than this become tickets
    #[serde(default = "default_escalation_ticket_after")]
    pub escalation_ticket_after_minutes: u32,

    /// Sweeper interval (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Inbound dedup records are kept this long
    #[serde(default = "default_dedup_retention")]
    pub dedup_retention_hours: u32,

    /// Webhook messages buffered ahead of the ingest worker
    #[serde(default = "default_inbound_queue_capacity")]
    pub inbound_queue_capacity: usize,

    /// Events buffered per operator session before it must resync
    #[serde(default = "default_fanout_capacity")]
    pub fanout_capacity: usize,

    /// Messages handed to the AI responder
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    #[serde(default = "default_tat_high")]
    pub tat_high_minutes: u32,

    #[serde(default = "default_tat_medium")]
    pub tat_medium_minutes: u32,

    #[serde(default = "default_tat_low")]
    pub tat_low_minutes: u32,
}

impl EngineConfig {
    pub fn delivery_backoff(&self) -> Duration {
        Duration::from_millis(self.delivery_backoff_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.delivery_max_attempts == 0 {
            return Err(ValidationError::InvalidEngineSetting("delivery_max_attempts"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidEngineSetting("sweep_interval_secs"));
        }
        if self.inbound_queue_capacity == 0 {
            return Err(ValidationError::InvalidEngineSetting("inbound_queue_capacity"));
        }
        if self.fanout_capacity == 0 {
            return Err(ValidationError::InvalidEngineSetting("fanout_capacity"));
        }
        if self.tat_high_minutes == 0 || self.tat_medium_minutes == 0 || self.tat_low_minutes == 0 {
            return Err(ValidationError::InvalidEngineSetting("tat_minutes"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delivery_max_attempts: default_delivery_attempts(),
            delivery_backoff_ms: default_delivery_backoff(),
            delivery_timeout_secs: default_delivery_timeout(),
            escalation_ticket_after_minutes: default_escalation_ticket_after(),
            sweep_interval_secs: default_sweep_interval(),
            dedup_retention_hours: default_dedup_retention(),
            inbound_queue_capacity: default_inbound_queue_capacity(),
            fanout_capacity: default_fanout_capacity(),
            history_limit: default_history_limit(),
            tat_high_minutes: default_tat_high(),
            tat_medium_minutes: default_tat_medium(),
            tat_low_minutes: default_tat_low(),
        }
    }
}

fn default_delivery_attempts() -> u32 {
    3
}

fn default_delivery_backoff() -> u64 {
    500
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_escalation_ticket_after() -> u32 {
    30
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_dedup_retention() -> u32 {
    72
}

fn default_inbound_queue_capacity() -> usize {
    1024
}

fn default_fanout_capacity() -> usize {
    256
}

fn default_history_limit() -> u32 {
    50
}

fn default_tat_high() -> u32 {
    240
}

fn default_tat_medium() -> u32 {
    1440
}

fn default_tat_low() -> u32 {
    4320
}
