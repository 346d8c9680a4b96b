//! Support desk server.
//!
//! Loads configuration from the environment, wires the stores, providers
//! and channel adapters into a `DeskEngine`, starts the ingest worker and
//! the escalation sweeper, and serves the HTTP/WebSocket API until Ctrl-C.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use support_desk::adapters::ai::{
    GeminiConfig, GeminiProvider, MockAIProvider, OpenAICompatibleConfig, OpenAICompatibleProvider,
};
use support_desk::adapters::channels::{
    ChannelSurveyNotifier, EmailAdapter, EmailConfig, HubVerifier, MessagingAppAdapter,
    MessagingAppConfig, SocialAdapter, SocialConfig, WidgetAdapter,
};
use support_desk::adapters::fanout::BroadcastFanout;
use support_desk::adapters::http::{router, AppState};
use support_desk::adapters::memory::{MemoryDedupStore, MemoryDeskStore, MemorySettingsStore};
use support_desk::adapters::postgres::{
    self, PostgresDedupStore, PostgresDeskStore, PostgresSettingsStore,
};
use support_desk::application::{
    AiResponder, AiResponderConfig, ChannelRegistry, DeliveryPolicy, DeliveryService, DeskEngine,
    DeskSettings, EnginePolicy, EscalationSweeper, InboundQueue, IngestWorker, SettingsResolver,
    SweeperConfig, WebhookIntake,
};
use support_desk::config::{AppConfig, ChannelsConfig, LogFormat};
use support_desk::domain::conversation::Channel;
use support_desk::ports::{
    AIError, AiProviderKind, DeliveryError, DeskStore, InboundDedupStore, SettingsStore,
    TransitionCommitter,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Store handles shared by the engine and the background workers.
struct Stores {
    desk: Arc<dyn DeskStore>,
    committer: Arc<dyn TransitionCommitter>,
    dedup: Arc<dyn InboundDedupStore>,
    settings: Arc<dyn SettingsStore>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let stores = open_stores(&config).await?;

    let fanout = Arc::new(BroadcastFanout::new(config.engine.fanout_capacity));
    let channels = Arc::new(build_channels(&config)?);
    let surveys = Arc::new(ChannelSurveyNotifier::new(
        Arc::clone(&channels),
        config.channels.survey_base_url.clone(),
    ));
    let delivery = Arc::new(DeliveryService::new(
        Arc::clone(&channels),
        surveys,
        Arc::clone(&stores.committer),
        DeliveryPolicy {
            max_attempts: config.engine.delivery_max_attempts,
            backoff: config.engine.delivery_backoff(),
            timeout: config.engine.delivery_timeout(),
        },
    ));
    let settings = Arc::new(SettingsResolver::new(
        Arc::clone(&stores.settings),
        default_settings(&config),
    ));
    let responder = Arc::new(build_responder(&config)?);

    let engine = Arc::new(DeskEngine::new(
        Arc::clone(&stores.desk),
        fanout,
        Arc::clone(&settings),
        responder,
        delivery,
        EnginePolicy {
            tat_high_minutes: config.engine.tat_high_minutes,
            tat_medium_minutes: config.engine.tat_medium_minutes,
            tat_low_minutes: config.engine.tat_low_minutes,
            history_limit: config.engine.history_limit,
        },
    ));

    let (queue, inbound) = InboundQueue::bounded(config.engine.inbound_queue_capacity);
    let intake = Arc::new(WebhookIntake::new(
        Arc::clone(&channels),
        Arc::clone(&stores.dedup),
        settings,
        queue,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = IngestWorker::new(Arc::clone(&engine), inbound);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let mut sweeper_config = SweeperConfig::default()
        .with_interval(config.engine.sweep_interval())
        .with_escalation_ticket_after(config.engine.escalation_ticket_after_minutes);
    sweeper_config.dedup_retention_hours = config.engine.dedup_retention_hours;
    let sweeper = EscalationSweeper::new(Arc::clone(&engine), sweeper_config)
        .with_dedup_store(Arc::clone(&stores.dedup));
    let sweeper_shutdown = shutdown_rx.clone();
    let sweeper_handle = tokio::spawn(async move {
        if let Err(e) = sweeper.run(sweeper_shutdown).await {
            tracing::error!(error = %e, "Escalation sweeper stopped");
        }
    });

    let state = with_verifiers(AppState::new(engine, intake), &config.channels);
    let app = router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        ai_provider = %config.ai.provider,
        postgres = config.database.is_configured(),
        "Support desk listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down background workers");
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        tracing::warn!(error = %e, "Ingest worker task failed");
    }
    if let Err(e) = sweeper_handle.await {
        tracing::warn!(error = %e, "Sweeper task failed");
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_stores(config: &AppConfig) -> Result<Stores, BoxError> {
    if !config.database.is_configured() {
        tracing::warn!("No database URL configured; state is kept in memory");
        let desk = Arc::new(MemoryDeskStore::new());
        return Ok(Stores {
            desk: desk.clone(),
            committer: desk,
            dedup: Arc::new(MemoryDedupStore::new()),
            settings: Arc::new(MemorySettingsStore::new()),
        });
    }

    let pool = postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        postgres::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }
    let desk = Arc::new(PostgresDeskStore::new(pool.clone()));
    Ok(Stores {
        desk: desk.clone(),
        committer: desk,
        dedup: Arc::new(PostgresDedupStore::new(pool.clone())),
        settings: Arc::new(PostgresSettingsStore::new(pool)),
    })
}

fn default_settings(config: &AppConfig) -> DeskSettings {
    DeskSettings {
        ai_provider: config.ai.provider,
        ai_model: config.ai.model.clone(),
        knowledge_base: config.ai.knowledge_base.clone(),
        system_prompt: config.ai.system_prompt.clone(),
        ai_paused: config.ai.paused,
        channels_enabled: config.channels.enabled_flags(),
    }
}

/// Registers every provider that has a key; the mock provider is always
/// available so settings can switch to it at runtime.
fn build_responder(config: &AppConfig) -> Result<AiResponder, AIError> {
    let ai = &config.ai;
    let responder_config = AiResponderConfig::default()
        .with_timeout(ai.timeout())
        .with_retry_backoff(ai.retry_backoff())
        .with_turn_budget(ai.max_ai_turns, ai.max_ai_minutes)
        .with_escalation_marker(ai.escalation_marker.clone());

    let mut responder = AiResponder::new(responder_config)
        .with_provider(AiProviderKind::Mock, Arc::new(MockAIProvider::new()));

    if let Some(key) = ai.api_key(AiProviderKind::OpenAI) {
        let mut cfg = OpenAICompatibleConfig::openai(key).with_timeout(ai.timeout());
        if let Some(url) = &ai.openai_base_url {
            cfg = cfg.with_base_url(url.clone());
        }
        responder = responder.with_provider(
            AiProviderKind::OpenAI,
            Arc::new(OpenAICompatibleProvider::new(cfg)?),
        );
    }
    if let Some(key) = ai.api_key(AiProviderKind::OpenRouter) {
        let mut cfg = OpenAICompatibleConfig::openrouter(key).with_timeout(ai.timeout());
        if let Some(url) = &ai.openrouter_base_url {
            cfg = cfg.with_base_url(url.clone());
        }
        if let Some(app_url) = &ai.app_url {
            cfg = cfg.with_app_url(app_url.clone());
        }
        responder = responder.with_provider(
            AiProviderKind::OpenRouter,
            Arc::new(OpenAICompatibleProvider::new(cfg)?),
        );
    }
    if let Some(key) = ai.api_key(AiProviderKind::Gemini) {
        let mut cfg = GeminiConfig::new(key).with_timeout(ai.timeout());
        if let Some(url) = &ai.gemini_base_url {
            cfg = cfg.with_base_url(url.clone());
        }
        responder = responder.with_provider(AiProviderKind::Gemini, Arc::new(GeminiProvider::new(cfg)?));
    }
    Ok(responder)
}

/// Registers an adapter for every channel with credentials. A channel
/// without an adapter rejects webhooks and cannot be delivered to.
fn build_channels(config: &AppConfig) -> Result<ChannelRegistry, DeliveryError> {
    let channels = &config.channels;
    let timeout = config.engine.delivery_timeout();
    let mut registry = ChannelRegistry::new().with_adapter(Arc::new(WidgetAdapter::new()));

    match channels.messaging_app.credentials() {
        Some((phone_number_id, token)) => {
            let mut cfg = MessagingAppConfig::new(phone_number_id, token).with_timeout(timeout);
            if let Some(url) = &channels.messaging_app.api_base_url {
                cfg = cfg.with_api_base_url(url.clone());
            }
            registry = registry.with_adapter(Arc::new(MessagingAppAdapter::new(cfg)?));
        }
        None => tracing::warn!(channel = %Channel::MessagingApp, "Channel has no credentials; not served"),
    }

    for (channel, social) in [(Channel::SocialA, &channels.social_a), (Channel::SocialB, &channels.social_b)] {
        match social.page_access_token() {
            Some(token) => {
                let mut cfg = SocialConfig::new(token).with_timeout(timeout);
                if let Some(url) = &social.api_base_url {
                    cfg = cfg.with_api_base_url(url.clone());
                }
                registry = registry.with_adapter(Arc::new(SocialAdapter::new(channel, cfg)?));
            }
            None => tracing::warn!(channel = %channel, "Channel has no credentials; not served"),
        }
    }

    match channels.email.credentials() {
        Some((relay_url, api_key, from_address)) => {
            let cfg = EmailConfig::new(relay_url, api_key, from_address).with_timeout(timeout);
            registry = registry.with_adapter(Arc::new(EmailAdapter::new(cfg)?));
        }
        None => tracing::warn!(channel = %Channel::EmailLike, "Channel has no credentials; not served"),
    }

    Ok(registry)
}

fn with_verifiers(mut state: AppState, channels: &ChannelsConfig) -> AppState {
    for channel in [Channel::MessagingApp, Channel::SocialA, Channel::SocialB] {
        if let Some(hub) = channels.hub(channel) {
            if hub.app_secret.is_none() {
                tracing::warn!(channel = %channel, "Webhook signatures are not checked");
            }
            state = state.with_verifier(channel, HubVerifier::new(hub.verify_token, hub.app_secret));
        }
    }
    state
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
