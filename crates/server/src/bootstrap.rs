use std::sync::Arc;

use fixquote_agent::{ImageDescriber, LlmClient, LlmError, OpenAiCompatibleClient, PriceEstimator, RequestParser};
use fixquote_calls::{
    LiveCallStrategy, MockCallStrategy, QuoteDispatcher, QuoteStrategy, RetellClient, StatusReconciler,
    TracingAuditSink, VoiceError, VoiceProvider,
};
use fixquote_core::config::AppConfig;
use fixquote_db::repositories::{SqlQuoteRepository, SqlRequestRepository, SqlUserRepository};
use fixquote_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;
use crate::intake::IntakeService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("voice client setup failed: {0}")]
    Voice(#[from] VoiceError),
    #[error("language model client setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("live dispatch needs voice.{0}; set it or enable voice.mock_mode")]
    LiveDispatch(&'static str),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let state = build_state(&config, db_pool.clone())?;
    Ok(Application { config, db_pool, state })
}

fn build_state(config: &AppConfig, db_pool: DbPool) -> Result<AppState, BootstrapError> {
    let users = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let requests = Arc::new(SqlRequestRepository::new(db_pool.clone()));
    let quotes = Arc::new(SqlQuoteRepository::new(db_pool));

    let voice: Option<Arc<dyn VoiceProvider>> = match config.voice.api_key {
        Some(_) => Some(Arc::new(RetellClient::from_config(&config.voice)?)),
        None => None,
    };

    let strategy: Arc<dyn QuoteStrategy> = if config.voice.mock_mode {
        Arc::new(MockCallStrategy::default())
    } else {
        let voice = voice.as_ref().map(Arc::clone).ok_or(BootstrapError::LiveDispatch("api_key"))?;
        Arc::new(LiveCallStrategy::new(
            voice,
            required(config.voice.from_number.as_deref(), "from_number")?,
            required(config.voice.agent_id.as_deref(), "agent_id")?,
            config.voice.callback_number.clone(),
        ))
    };
    info!(
        event_name = "system.bootstrap.dispatch_strategy",
        strategy = strategy.name(),
        providers = config.providers.len(),
        "quote dispatch strategy selected"
    );

    let llm: Option<Arc<dyn LlmClient>> = match OpenAiCompatibleClient::from_config(&config.llm)? {
        Some(client) => Some(Arc::new(client)),
        None => None,
    };
    info!(
        event_name = "system.bootstrap.llm",
        configured = llm.is_some(),
        model = %config.llm.model,
        "request intake model configured"
    );

    let dispatcher = Arc::new(QuoteDispatcher::new(strategy, quotes.clone(), config.providers.clone()));
    let reconciler =
        Arc::new(StatusReconciler::new(quotes.clone(), voice, Arc::new(TracingAuditSink)));

    Ok(AppState {
        intake: Arc::new(IntakeService::new(users, requests.clone(), dispatcher)),
        reconciler,
        requests,
        quotes,
        parser: Arc::new(RequestParser::new(llm.clone(), config.llm.model.clone())),
        estimator: Arc::new(PriceEstimator::new(llm.clone(), config.llm.model.clone())),
        describer: Arc::new(ImageDescriber::new(llm, config.llm.vision_model.clone())),
        webhook_secret: config.webhook.secret.clone(),
    })
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, BootstrapError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(BootstrapError::LiveDispatch(field)),
    }
}
