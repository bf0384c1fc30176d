//! The SQL and in-memory stores must agree on every constraint the reconciler and intake
//! rely on. Each contract runs against both.

use std::sync::Arc;

use chrono::{Duration, Utc};
use fixquote_core::calls::CallStatus;
use fixquote_core::domain::provider::default_roster;
use fixquote_core::domain::quote::{CallId, CallTracking, Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::{RequestId, RequestSource, ServiceRequest};
use fixquote_core::domain::user::{User, UserId};
use fixquote_db::repositories::{
    ExpectedCallState, InMemoryQuoteRepository, InMemoryRequestRepository, InMemoryUserRepository,
    QuoteRepository, RepositoryError, RequestRepository, SqlQuoteRepository, SqlRequestRepository,
    SqlUserRepository, UserRepository,
};
use fixquote_db::{connect_with_settings, migrations};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left, right) => {
                if left != right {
                    return Err(format!(
                        "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                        left, right
                    ));
                }
            }
        }
    };
}

struct Stores {
    label: &'static str,
    users: Arc<dyn UserRepository>,
    requests: Arc<dyn RequestRepository>,
    quotes: Arc<dyn QuoteRepository>,
}

async fn sql_stores() -> Stores {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    Stores {
        label: "sql",
        users: Arc::new(SqlUserRepository::new(pool.clone())),
        requests: Arc::new(SqlRequestRepository::new(pool.clone())),
        quotes: Arc::new(SqlQuoteRepository::new(pool)),
    }
}

fn memory_stores() -> Stores {
    Stores {
        label: "memory",
        users: Arc::new(InMemoryUserRepository::default()),
        requests: Arc::new(InMemoryRequestRepository::default()),
        quotes: Arc::new(InMemoryQuoteRepository::default()),
    }
}

async fn seed(stores: &Stores) -> ContractResult<RequestId> {
    let now = Utc::now();
    let user = User {
        id: UserId("u-1".to_string()),
        name: "Dana".to_string(),
        email: "dana@example.com".to_string(),
        phone: None,
        created_at: now,
    };
    stores.users.insert(user).await.map_err(|error| error.to_string())?;

    let request = ServiceRequest {
        id: RequestId("r-1".to_string()),
        user_id: UserId("u-1".to_string()),
        issue: "Leaking faucet".to_string(),
        description: "Leaking faucet".to_string(),
        address: "Plano".to_string(),
        times_available: vec![],
        desired_price_range: None,
        source: RequestSource::Text,
        source_text: Some("faucet leaks, in Plano".to_string()),
        image_url: None,
        created_at: now,
    };
    stores.requests.insert(request).await.map_err(|error| error.to_string())?;

    for (offset, provider) in default_roster().iter().enumerate() {
        let created_at = now + Duration::milliseconds(offset as i64);
        let quote = Quote {
            id: QuoteId(format!("q-{}", provider.id.0)),
            request_id: RequestId("r-1".to_string()),
            provider: provider.snapshot(),
            quote_price: None,
            estimated_price: None,
            available_time: None,
            duration: None,
            included_in_quote: None,
            call: CallTracking::pending(Some(CallId(format!("call_{}", provider.id.0)))),
            decision: QuoteDecision::Open,
            created_at,
            updated_at: created_at,
        };
        stores.quotes.insert(quote).await.map_err(|error| error.to_string())?;
    }
    Ok(RequestId("r-1".to_string()))
}

async fn duplicate_email_and_call_id_conflict(stores: &Stores) -> ContractResult {
    let request_id = seed(stores).await?;

    let twin = User {
        id: UserId("u-2".to_string()),
        name: "Other".to_string(),
        email: "dana@example.com".to_string(),
        phone: None,
        created_at: Utc::now(),
    };
    let outcome = stores.users.insert(twin).await;
    require!(matches!(outcome, Err(RepositoryError::Conflict(_))), "{}: duplicate email stored", stores.label);

    let mut copy = stores.quotes.list_for_request(&request_id).await.map_err(|e| e.to_string())?.remove(0);
    copy.id = QuoteId("q-copy".to_string());
    let outcome = stores.quotes.insert(copy).await;
    require!(matches!(outcome, Err(RepositoryError::Conflict(_))), "{}: duplicate call id stored", stores.label);
    Ok(())
}

async fn listing_is_ordered_by_creation(stores: &Stores) -> ContractResult {
    let request_id = seed(stores).await?;
    let quotes = stores.quotes.list_for_request(&request_id).await.map_err(|e| e.to_string())?;
    let providers: Vec<&str> = quotes.iter().map(|quote| quote.provider.provider_id.0.as_str()).collect();
    require_eq!(providers, vec!["h1", "h2", "h3"]);
    Ok(())
}

async fn stale_call_state_write_is_refused(stores: &Stores) -> ContractResult {
    seed(stores).await?;
    let call_id = CallId("call_h1".to_string());
    let stored = stores
        .quotes
        .find_by_call_id(&call_id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("{}: seeded quote missing", stores.label))?;
    let expected = ExpectedCallState::of(&stored);

    let mut first = stored.clone();
    first.call.status = CallStatus::InProgress;
    first.updated_at = stored.updated_at + Duration::seconds(1);
    let landed = stores.quotes.update_call_state(&first, expected).await.map_err(|e| e.to_string())?;
    require!(landed, "{}: first write should land", stores.label);

    let mut stale = stored.clone();
    stale.call.status = CallStatus::Completed;
    stale.updated_at = stored.updated_at + Duration::seconds(2);
    let landed = stores.quotes.update_call_state(&stale, expected).await.map_err(|e| e.to_string())?;
    require!(!landed, "{}: write planned against old state should be refused", stores.label);

    let current = stores.quotes.find_by_call_id(&call_id).await.map_err(|e| e.to_string())?;
    require_eq!(current.map(|quote| quote.call.status), Some(CallStatus::InProgress));
    Ok(())
}

async fn second_acceptance_conflicts(stores: &Stores) -> ContractResult {
    seed(stores).await?;
    let now = Utc::now();
    stores
        .quotes
        .set_decision(&QuoteId("q-h1".to_string()), QuoteDecision::Open, QuoteDecision::Accepted, now)
        .await
        .map_err(|e| e.to_string())?;

    let outcome = stores
        .quotes
        .set_decision(&QuoteId("q-h2".to_string()), QuoteDecision::Open, QuoteDecision::Accepted, now)
        .await;
    require!(matches!(outcome, Err(RepositoryError::Conflict(_))), "{}: two quotes accepted", stores.label);

    stores
        .quotes
        .set_decision(&QuoteId("q-h2".to_string()), QuoteDecision::Open, QuoteDecision::Declined, now)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn decision_written_against_stale_read_conflicts(stores: &Stores) -> ContractResult {
    seed(stores).await?;
    let id = QuoteId("q-h1".to_string());
    let now = Utc::now();
    stores
        .quotes
        .set_decision(&id, QuoteDecision::Open, QuoteDecision::Accepted, now)
        .await
        .map_err(|e| e.to_string())?;

    let outcome = stores
        .quotes
        .set_decision(&id, QuoteDecision::Open, QuoteDecision::Declined, now + Duration::seconds(1))
        .await;
    require!(
        matches!(outcome, Err(RepositoryError::Conflict(_))),
        "{}: decline read before the accept overwrote it",
        stores.label
    );

    let current = stores.quotes.find_by_id(&id).await.map_err(|e| e.to_string())?;
    require_eq!(current.map(|quote| quote.decision), Some(QuoteDecision::Accepted));
    Ok(())
}

async fn run_everywhere<F, Fut>(contract: F)
where
    F: Fn(Stores) -> Fut,
    Fut: std::future::Future<Output = ContractResult>,
{
    for stores in [sql_stores().await, memory_stores()] {
        if let Err(message) = contract(stores).await {
            panic!("{message}");
        }
    }
}

#[tokio::test]
async fn stores_reject_duplicate_emails_and_call_ids() {
    run_everywhere(|stores| async move { duplicate_email_and_call_id_conflict(&stores).await }).await;
}

#[tokio::test]
async fn stores_list_quotes_in_creation_order() {
    run_everywhere(|stores| async move { listing_is_ordered_by_creation(&stores).await }).await;
}

#[tokio::test]
async fn stores_refuse_stale_call_state_writes() {
    run_everywhere(|stores| async move { stale_call_state_write_is_refused(&stores).await }).await;
}

#[tokio::test]
async fn stores_allow_only_one_accepted_quote_per_request() {
    run_everywhere(|stores| async move { second_acceptance_conflicts(&stores).await }).await;
}

#[tokio::test]
async fn stores_refuse_decisions_written_against_a_stale_read() {
    run_everywhere(|stores| async move { decision_written_against_stale_read_conflicts(&stores).await }).await;
}
