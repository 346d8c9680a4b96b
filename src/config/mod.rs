//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `SUPPORT_DESK` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use support_desk::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}:{}", config.server.host, config.server.port);
//! ```

mod ai;
mod channels;
mod database;
mod engine;
mod error;
mod server;

pub use ai::AiConfig;
pub use channels::{
    ChannelsConfig, EmailChannelConfig, HubCredentials, MessagingAppChannelConfig,
    SocialChannelConfig, WidgetChannelConfig,
};
pub use database::DatabaseConfig;
pub use engine::EngineConfig;
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields an in-memory
/// desk that only lacks AI credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, logging, timeouts)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (optional PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// AI provider configuration and runtime-setting defaults
    #[serde(default)]
    pub ai: AiConfig,

    /// Per-channel credentials and enable flags
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Delivery, worker and ticket policy
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SUPPORT_DESK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SUPPORT_DESK__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUPPORT_DESK__DATABASE__URL=...` -> `database.url = ...`
    /// - `SUPPORT_DESK__CHANNELS__SOCIAL_A__APP_SECRET=...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUPPORT_DESK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.ai.validate()?;
        self.channels.validate()?;
        self.engine.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::AiProviderKind;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUPPORT_DESK__AI__PROVIDER",
        "SUPPORT_DESK__AI__OPENAI_API_KEY",
        "SUPPORT_DESK__DATABASE__URL",
        "SUPPORT_DESK__SERVER__PORT",
        "SUPPORT_DESK__SERVER__ENVIRONMENT",
        "SUPPORT_DESK__SERVER__LOG_FORMAT",
        "SUPPORT_DESK__CHANNELS__SOCIAL_A__VERIFY_TOKEN",
        "SUPPORT_DESK__ENGINE__ESCALATION_TICKET_AFTER_MINUTES",
    ];

    fn set_minimal_env() {
        env::set_var("SUPPORT_DESK__AI__PROVIDER", "openai");
        env::set_var("SUPPORT_DESK__AI__OPENAI_API_KEY", "sk-xxx");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUPPORT_DESK__DATABASE__URL", "postgresql://test@localhost/test");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url(), Some("postgresql://test@localhost/test"));
        assert_eq!(config.ai.provider, AiProviderKind::OpenAI);
        assert_eq!(config.ai.api_key(AiProviderKind::OpenAI), Some("sk-xxx"));
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.database.is_configured());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_nested_sections_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUPPORT_DESK__SERVER__PORT", "3000");
        env::set_var("SUPPORT_DESK__SERVER__ENVIRONMENT", "production");
        env::set_var("SUPPORT_DESK__SERVER__LOG_FORMAT", "json");
        env::set_var("SUPPORT_DESK__CHANNELS__SOCIAL_A__VERIFY_TOKEN", "verify-me");
        env::set_var("SUPPORT_DESK__ENGINE__ESCALATION_TICKET_AFTER_MINUTES", "15");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.engine.escalation_ticket_after_minutes, 15);
        let hub = config.channels.hub(crate::domain::conversation::Channel::SocialA).unwrap();
        assert_eq!(hub.verify_token.as_deref(), Some("verify-me"));
    }
}
