use std::sync::Arc;

use fixquote_calls::{RefreshReport, RetellClient, StatusReconciler, TracingAuditSink, VoiceProvider};
use fixquote_core::config::AppConfig;
use fixquote_core::domain::request::RequestId;
use fixquote_db::repositories::{RequestRepository, SqlQuoteRepository, SqlRequestRepository};
use fixquote_db::{connect_with_settings, DbPool};

use crate::commands::{load_config, runtime, CommandResult, Failure};

pub fn run(request_id: &str) -> CommandResult {
    let config = match load_config() {
        Ok(config) => config,
        Err(failure) => return failure.into_result("refresh"),
    };
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return failure.into_result("refresh"),
    };

    let request_id = RequestId(request_id.trim().to_string());
    let result = runtime.block_on(async {
        let session = RefreshSession::open(&config).await?;
        let report = session.refresh(&request_id).await;
        session.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success("refresh", summarize(&report)),
        Err(failure) => failure.into_result("refresh"),
    }
}

/// The pull path wired against the configured database and voice provider.
pub(crate) struct RefreshSession {
    pool: DbPool,
    requests: SqlRequestRepository,
    reconciler: StatusReconciler,
}

impl RefreshSession {
    pub(crate) async fn open(config: &AppConfig) -> Result<Self, Failure> {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| Failure::new("db_connectivity", error.to_string(), Failure::DATABASE))?;

        let voice: Option<Arc<dyn VoiceProvider>> = match config.voice.api_key {
            Some(_) => Some(Arc::new(RetellClient::from_config(&config.voice).map_err(|error| {
                Failure::new("voice_client", error.to_string(), Failure::RUNTIME)
            })?)),
            None => None,
        };
        let reconciler = StatusReconciler::new(
            Arc::new(SqlQuoteRepository::new(pool.clone())),
            voice,
            Arc::new(TracingAuditSink),
        );

        Ok(Self { requests: SqlRequestRepository::new(pool.clone()), pool, reconciler })
    }

    pub(crate) async fn refresh(&self, request_id: &RequestId) -> Result<RefreshReport, Failure> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await
            .map_err(|error| Failure::new("db_query", error.to_string(), Failure::DATABASE))?;
        if request.is_none() {
            return Err(Failure::new(
                "not_found",
                format!("request `{}` not found", request_id.0),
                Failure::NOT_FOUND,
            ));
        }

        self.reconciler
            .refresh_request(request_id)
            .await
            .map_err(|error| Failure::new("reconcile", error.to_string(), Failure::DATABASE))
    }

    pub(crate) async fn close(self) {
        self.pool.close().await;
    }
}

pub(crate) fn summarize(report: &RefreshReport) -> String {
    let statuses = report
        .quotes
        .iter()
        .map(|quote| format!("{}={}", quote.provider.name, quote.call.status.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "refreshed={} skipped={} failed={}; calls: {}",
        report.refreshed,
        report.skipped,
        report.failed,
        if statuses.is_empty() { "none" } else { statuses.as_str() }
    )
}
