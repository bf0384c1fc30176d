use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use fixquote_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use fixquote_core::calls::{CallUpdate, UpdateRejection};
use fixquote_core::domain::quote::{CallId, Quote};
use fixquote_core::domain::request::RequestId;
use fixquote_db::repositories::{ExpectedCallState, QuoteRepository, RepositoryError};

use crate::client::VoiceProvider;

/// Conditional-write attempts per update: the first plan plus one recompute after a
/// concurrent writer moved the row.
const WRITE_ATTEMPTS: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    Applied { quote: Quote },
    Unchanged { quote: Quote },
    Rejected { reason: UpdateRejection, quote: Quote },
    NotFound,
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged { .. } => "unchanged",
            Self::Rejected { .. } => "rejected",
            Self::NotFound => "not_found",
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Applied { quote } | Self::Unchanged { quote } | Self::Rejected { quote, .. } => Some(quote),
            Self::NotFound => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("call `{0}` kept changing underneath the update; giving up")]
    Contended(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub refreshed: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip)]
    pub quotes: Vec<Quote>,
}

impl RefreshReport {
    pub fn all_terminal(&self) -> bool {
        self.quotes.iter().all(|quote| quote.call.status.is_terminal())
    }
}

/// Per-call_id async locks. Entries are pruned once no task holds or waits on them.
#[derive(Default)]
struct CallLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CallLocks {
    async fn acquire(&self, call_id: &CallId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(call_id.0.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

/// The single write path for call status: webhook pushes, provider polls, and operator
/// edits all funnel through [`StatusReconciler::apply`].
pub struct StatusReconciler {
    quotes: Arc<dyn QuoteRepository>,
    voice: Option<Arc<dyn VoiceProvider>>,
    audit: Arc<dyn AuditSink>,
    locks: CallLocks,
}

impl StatusReconciler {
    pub fn new(
        quotes: Arc<dyn QuoteRepository>,
        voice: Option<Arc<dyn VoiceProvider>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { quotes, voice, audit, locks: CallLocks::default() }
    }

    pub async fn apply(
        &self,
        call_id: &CallId,
        update: &CallUpdate,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let _guard = self.locks.acquire(call_id).await;

        for attempt in 1..=WRITE_ATTEMPTS {
            let Some(mut quote) = self.quotes.find_by_call_id(call_id).await? else {
                warn!(
                    event_name = "reconcile.not_found",
                    call_id = %call_id.0,
                    origin = update.origin.as_str(),
                    "no quote for call id"
                );
                self.audit.emit(
                    self.event(call_id, update, AuditOutcome::Rejected).with_metadata("reason", "not_found"),
                );
                return Ok(ReconcileOutcome::NotFound);
            };

            let plan = match quote.plan_update(update) {
                Ok(plan) => plan,
                Err(reason) => {
                    info!(
                        event_name = "reconcile.rejected",
                        call_id = %call_id.0,
                        quote_id = %quote.id.0,
                        origin = update.origin.as_str(),
                        reason = %reason,
                        "out-of-order call update rejected"
                    );
                    self.audit.emit(
                        self.event(call_id, update, AuditOutcome::Rejected)
                            .for_request(quote.request_id.clone())
                            .for_quote(quote.id.clone())
                            .with_metadata("reason", reason.to_string()),
                    );
                    return Ok(ReconcileOutcome::Rejected { reason, quote });
                }
            };

            if plan.is_noop() {
                debug!(event_name = "reconcile.unchanged", call_id = %call_id.0, "call update changed nothing");
                self.audit.emit(
                    self.event(call_id, update, AuditOutcome::Unchanged)
                        .for_request(quote.request_id.clone())
                        .for_quote(quote.id.clone()),
                );
                return Ok(ReconcileOutcome::Unchanged { quote });
            }

            let expected = ExpectedCallState::of(&quote);
            quote.apply_plan(&plan);
            // Stored timestamps have microsecond precision; the new version must differ there.
            let floor = expected.updated_at + chrono::Duration::microseconds(1);
            if quote.updated_at < floor {
                quote.updated_at = floor;
            }

            if self.quotes.update_call_state(&quote, expected).await? {
                info!(
                    event_name = "reconcile.applied",
                    call_id = %call_id.0,
                    quote_id = %quote.id.0,
                    origin = update.origin.as_str(),
                    from = plan.from.as_str(),
                    to = plan.to.as_str(),
                    "call update applied"
                );
                self.audit.emit(
                    self.event(call_id, update, AuditOutcome::Success)
                        .for_request(quote.request_id.clone())
                        .for_quote(quote.id.clone())
                        .with_metadata("from", plan.from.as_str())
                        .with_metadata("to", plan.to.as_str()),
                );
                return Ok(ReconcileOutcome::Applied { quote });
            }

            warn!(
                event_name = "reconcile.conflict",
                call_id = %call_id.0,
                attempt,
                "quote changed concurrently; recomputing update"
            );
        }

        self.audit.emit(self.event(call_id, update, AuditOutcome::Failed).with_metadata("reason", "contended"));
        Err(ReconcileError::Contended(call_id.0.clone()))
    }

    /// One pull pass over a request's quotes. Lookup or write failures are logged and
    /// counted; the pass always finishes.
    pub async fn refresh_request(&self, request_id: &RequestId) -> Result<RefreshReport, ReconcileError> {
        let quotes = self.quotes.list_for_request(request_id).await?;
        let mut report = RefreshReport::default();

        for quote in &quotes {
            let (Some(voice), Some(call_id)) = (&self.voice, quote.call.call_id.as_ref()) else {
                report.skipped += 1;
                continue;
            };
            if !quote.call.is_refreshable() {
                report.skipped += 1;
                continue;
            }

            let details = match voice.get_call(call_id).await {
                Ok(details) => details,
                Err(error) => {
                    warn!(
                        event_name = "reconcile.lookup_failed",
                        request_id = %request_id.0,
                        call_id = %call_id.0,
                        error = %error,
                        "call lookup failed; continuing"
                    );
                    report.failed += 1;
                    continue;
                }
            };

            match self.apply(call_id, &details.to_update()).await {
                Ok(ReconcileOutcome::NotFound) => report.failed += 1,
                Ok(_) => report.refreshed += 1,
                Err(error) => {
                    warn!(
                        event_name = "reconcile.refresh_write_failed",
                        request_id = %request_id.0,
                        call_id = %call_id.0,
                        error = %error,
                        "refresh write failed; continuing"
                    );
                    report.failed += 1;
                }
            }
        }

        report.quotes = self.quotes.list_for_request(request_id).await?;
        info!(
            event_name = "reconcile.refresh_completed",
            request_id = %request_id.0,
            refreshed = report.refreshed,
            skipped = report.skipped,
            failed = report.failed,
            "refresh pass finished"
        );
        Ok(report)
    }

    fn event(&self, call_id: &CallId, update: &CallUpdate, outcome: AuditOutcome) -> AuditEvent {
        let requested = update.status.map(|status| status.as_str()).unwrap_or("none");
        AuditEvent::new("call_update", AuditCategory::Reconciliation, update.origin.as_str(), outcome)
            .for_call(call_id.clone())
            .with_metadata("requested_status", requested)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use fixquote_core::audit::{AuditOutcome, InMemoryAuditSink};
    use fixquote_core::calls::{CallStatus, CallUpdate, UpdateOrigin, UpdateRejection};
    use fixquote_core::domain::provider::default_roster;
    use fixquote_core::domain::quote::{CallId, CallTracking, Quote, QuoteDecision, QuoteId};
    use fixquote_core::domain::request::RequestId;
    use fixquote_db::repositories::{
        ExpectedCallState, InMemoryQuoteRepository, QuoteRepository, RepositoryError,
    };

    use super::{ReconcileError, ReconcileOutcome, StatusReconciler};
    use crate::client::tests::StubVoice;
    use crate::client::{CallAnalysis, CallDetails};

    fn quote(id: &str, call_id: Option<&str>, status: CallStatus) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId(id.to_string()),
            request_id: RequestId("req-1".to_string()),
            provider: default_roster()[0].snapshot(),
            quote_price: None,
            estimated_price: None,
            available_time: None,
            duration: None,
            included_in_quote: None,
            call: CallTracking { status, ..CallTracking::pending(call_id.map(|id| CallId(id.to_string()))) },
            decision: QuoteDecision::Open,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded(quotes: Vec<Quote>) -> Arc<InMemoryQuoteRepository> {
        let repository = Arc::new(InMemoryQuoteRepository::default());
        for quote in quotes {
            repository.insert(quote).await.expect("insert");
        }
        repository
    }

    fn webhook(status: CallStatus) -> CallUpdate {
        CallUpdate::new(UpdateOrigin::Webhook).with_status(status)
    }

    #[tokio::test]
    async fn terminal_status_never_regresses() {
        let repository = seeded(vec![quote("q1", Some("call_1"), CallStatus::Pending)]).await;
        let audit = Arc::new(InMemoryAuditSink::default());
        let reconciler = StatusReconciler::new(repository.clone(), None, audit.clone());
        let call_id = CallId("call_1".to_string());

        let outcome = reconciler.apply(&call_id, &webhook(CallStatus::Completed)).await.expect("apply");
        assert_eq!(outcome.label(), "applied");

        let late = reconciler.apply(&call_id, &webhook(CallStatus::InProgress)).await.expect("apply");
        assert!(matches!(
            late,
            ReconcileOutcome::Rejected { reason: UpdateRejection::Terminal { .. }, .. }
        ));
        let stored = repository.find_by_call_id(&call_id).await.expect("find").expect("quote");
        assert_eq!(stored.call.status, CallStatus::Completed);

        let outcomes: Vec<AuditOutcome> = audit.events().into_iter().map(|event| event.outcome).collect();
        assert_eq!(outcomes, vec![AuditOutcome::Success, AuditOutcome::Rejected]);
    }

    #[tokio::test]
    async fn unknown_call_is_a_soft_not_found() {
        let repository = seeded(Vec::new()).await;
        let reconciler = StatusReconciler::new(repository, None, Arc::new(InMemoryAuditSink::default()));
        let outcome = reconciler
            .apply(&CallId("missing".to_string()), &webhook(CallStatus::Completed))
            .await
            .expect("apply");
        assert_eq!(outcome, ReconcileOutcome::NotFound);
    }

    #[tokio::test]
    async fn analysis_after_completion_enriches_without_status_change() {
        let repository = seeded(vec![quote("q1", Some("call_1"), CallStatus::Completed)]).await;
        let reconciler = StatusReconciler::new(repository, None, Arc::new(InMemoryAuditSink::default()));
        let update = webhook(CallStatus::Analyzed).with_summary("Quoted $90").with_quote_price("$90");

        let outcome = reconciler.apply(&CallId("call_1".to_string()), &update).await.expect("apply");

        let ReconcileOutcome::Applied { quote } = outcome else {
            panic!("expected applied outcome");
        };
        assert_eq!(quote.call.status, CallStatus::Completed);
        assert_eq!(quote.quote_price.as_deref(), Some("$90"));

        let repeat = reconciler.apply(&CallId("call_1".to_string()), &update).await.expect("apply");
        assert_eq!(repeat.label(), "unchanged");
    }

    #[tokio::test]
    async fn concurrent_pushes_for_one_call_serialize() {
        let repository = seeded(vec![quote("q1", Some("call_1"), CallStatus::Pending)]).await;
        let reconciler = Arc::new(StatusReconciler::new(
            repository.clone(),
            None,
            Arc::new(InMemoryAuditSink::default()),
        ));

        let mut handles = Vec::new();
        for status in [CallStatus::InProgress, CallStatus::Completed, CallStatus::InProgress] {
            let reconciler = Arc::clone(&reconciler);
            handles.push(tokio::spawn(async move {
                reconciler.apply(&CallId("call_1".to_string()), &webhook(status)).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("apply");
        }

        let stored =
            repository.find_by_call_id(&CallId("call_1".to_string())).await.expect("find").expect("quote");
        assert_eq!(stored.call.status, CallStatus::Completed);
    }

    /// Repository whose first conditional write always loses, as if another process wrote
    /// in between.
    struct RacingRepository {
        inner: InMemoryQuoteRepository,
        losses: std::sync::Mutex<u32>,
    }

    #[async_trait]
    impl QuoteRepository for RacingRepository {
        async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_call_id(&self, call_id: &CallId) -> Result<Option<Quote>, RepositoryError> {
            self.inner.find_by_call_id(call_id).await
        }
        async fn list_for_request(&self, request_id: &RequestId) -> Result<Vec<Quote>, RepositoryError> {
            self.inner.list_for_request(request_id).await
        }
        async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
            self.inner.insert(quote).await
        }
        async fn update_call_state(
            &self,
            quote: &Quote,
            expected: ExpectedCallState,
        ) -> Result<bool, RepositoryError> {
            let lose = {
                let mut losses = self.losses.lock().expect("losses lock");
                if *losses > 0 {
                    *losses -= 1;
                    true
                } else {
                    false
                }
            };
            if lose {
                return Ok(false);
            }
            self.inner.update_call_state(quote, expected).await
        }
        async fn set_decision(
            &self,
            id: &QuoteId,
            expected: QuoteDecision,
            decision: QuoteDecision,
            updated_at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            self.inner.set_decision(id, expected, decision, updated_at).await
        }
    }

    async fn racing(losses: u32) -> Arc<RacingRepository> {
        let inner = InMemoryQuoteRepository::default();
        inner.insert(quote("q1", Some("call_1"), CallStatus::Pending)).await.expect("insert");
        Arc::new(RacingRepository { inner, losses: std::sync::Mutex::new(losses) })
    }

    #[tokio::test]
    async fn lost_conditional_write_is_recomputed_once() {
        let reconciler =
            StatusReconciler::new(racing(1).await, None, Arc::new(InMemoryAuditSink::default()));
        let outcome =
            reconciler.apply(&CallId("call_1".to_string()), &webhook(CallStatus::Completed)).await.expect("apply");
        assert_eq!(outcome.label(), "applied");

        let reconciler =
            StatusReconciler::new(racing(2).await, None, Arc::new(InMemoryAuditSink::default()));
        let error = reconciler
            .apply(&CallId("call_1".to_string()), &webhook(CallStatus::Completed))
            .await
            .expect_err("contended");
        assert!(matches!(error, ReconcileError::Contended(_)));
    }

    #[tokio::test]
    async fn refresh_skips_synthetic_and_terminal_and_survives_lookup_failures() {
        let repository = seeded(vec![
            quote("q1", Some("call_live"), CallStatus::Pending),
            quote("q2", Some("mock_1700000000000_h2"), CallStatus::Pending),
            quote("q3", Some("failed-1234"), CallStatus::Failed),
            quote("q4", Some("call_done"), CallStatus::Completed),
            quote("q5", Some("call_broken"), CallStatus::InProgress),
            quote("q6", None, CallStatus::Pending),
        ])
        .await;
        let voice = Arc::new(
            StubVoice::default()
                .on_get(
                    "call_live",
                    Ok(CallDetails {
                        call_status: Some("ended".to_string()),
                        call_analysis: Some(CallAnalysis {
                            call_summary: Some("Joe can come Friday".to_string()),
                            user_sentiment: Some("Positive".to_string()),
                            call_successful: Some(true),
                        }),
                        ..CallDetails::default()
                    }),
                )
                .on_get("call_broken", Err("upstream timeout".to_string())),
        );
        let reconciler =
            StatusReconciler::new(repository, Some(voice.clone()), Arc::new(InMemoryAuditSink::default()));

        let report = reconciler.refresh_request(&RequestId("req-1".to_string())).await.expect("refresh");

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.quotes.len(), 6);
        let live = report.quotes.iter().find(|quote| quote.id.0 == "q1").expect("q1");
        assert_eq!(live.call.status, CallStatus::Completed);
        assert!(live.call.successful);
        assert!(!report.all_terminal());

        let mut lookups = voice.lookups.lock().expect("lookups lock").clone();
        lookups.sort();
        assert_eq!(lookups, vec!["call_broken".to_string(), "call_live".to_string()]);
    }

    #[tokio::test]
    async fn refresh_without_voice_provider_skips_everything() {
        let repository = seeded(vec![quote("q1", Some("call_live"), CallStatus::Pending)]).await;
        let reconciler = StatusReconciler::new(repository, None, Arc::new(InMemoryAuditSink::default()));
        let report = reconciler.refresh_request(&RequestId("req-1".to_string())).await.expect("refresh");
        assert_eq!((report.refreshed, report.skipped, report.failed), (0, 1, 0));
    }
}
