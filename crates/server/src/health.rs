use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use fixquote_core::config::AppConfig;
use fixquote_db::DbPool;
use secrecy::ExposeSecret;
use serde::Serialize;

/// What the process was started with. Only the database decides readiness; the rest tells an
/// operator which paths run on fallbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub live_dispatch: bool,
    pub provider_lookups: bool,
    pub llm_model: Option<String>,
    pub webhook_secret: bool,
}

impl Capabilities {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            live_dispatch: !config.voice.mock_mode,
            provider_lookups: config
                .voice
                .api_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().trim().is_empty()),
            llm_model: config.llm.is_configured().then(|| config.llm.model.clone()),
            webhook_secret: config.webhook.secret.is_some(),
        }
    }
}

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    capabilities: Capabilities,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: "ready", detail: detail.into() }
    }

    fn limited(detail: impl Into<String>) -> Self {
        Self { status: "limited", detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub dispatch: HealthCheck,
    pub status_refresh: HealthCheck,
    pub intake: HealthCheck,
    pub webhook: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, capabilities: Capabilities) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, capabilities })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";
    let capabilities = &state.capabilities;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        dispatch: if capabilities.live_dispatch {
            HealthCheck::ready("quotes are requested by outbound calls")
        } else {
            HealthCheck::limited("mock mode: quotes are synthesized locally")
        },
        status_refresh: if capabilities.provider_lookups {
            HealthCheck::ready("call status lookups enabled")
        } else {
            HealthCheck::limited("no voice api key: refresh skips every quote")
        },
        intake: match &capabilities.llm_model {
            Some(model) => HealthCheck::ready(format!("parsing with model `{model}`")),
            None => HealthCheck::limited("no language model: heuristic parsing only"),
        },
        webhook: if capabilities.webhook_secret {
            HealthCheck::ready("shared secret required")
        } else {
            HealthCheck::limited("webhook accepts unauthenticated deliveries")
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes").fetch_one(pool).await {
        Ok(count) => HealthCheck::ready(format!("{count} quotes stored")),
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("quote store unreachable: {error}") }
        }
    }
}
