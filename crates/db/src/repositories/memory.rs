use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use fixquote_core::domain::quote::{CallId, Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::{RequestId, ServiceRequest};
use fixquote_core::domain::user::{User, UserId};

use super::{
    ExpectedCallState, QuoteRepository, RepositoryError, RequestRepository, UserRepository,
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let email = email.trim().to_ascii_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn insert(&self, mut user: User) -> Result<(), RepositoryError> {
        user.email = user.email.trim().to_ascii_lowercase();
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict(format!("email `{}` already exists", user.email)));
        }
        users.insert(user.id.0.clone(), user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, ServiceRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut found: Vec<ServiceRequest> =
            requests.values().filter(|request| &request.user_id == user_id).cloned().collect();
        found.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(found)
    }

    async fn insert(&self, request: ServiceRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }
}

/// Mirrors the SQL constraints: unique call ids, one accepted quote per request, and
/// conditional call-state writes.
#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn find_by_call_id(&self, call_id: &CallId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.values().find(|quote| quote.call.call_id.as_ref() == Some(call_id)).cloned())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        let mut found: Vec<Quote> =
            quotes.values().filter(|quote| &quote.request_id == request_id).cloned().collect();
        found.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.provider.provider_id.0.cmp(&right.provider.provider_id.0))
        });
        Ok(found)
    }

    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        if let Some(call_id) = &quote.call.call_id {
            if quotes.values().any(|existing| existing.call.call_id.as_ref() == Some(call_id)) {
                return Err(RepositoryError::Conflict(format!(
                    "call id `{}` already stored",
                    call_id.0
                )));
            }
        }
        quotes.insert(quote.id.0.clone(), quote);
        Ok(())
    }

    async fn update_call_state(
        &self,
        quote: &Quote,
        expected: ExpectedCallState,
    ) -> Result<bool, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let Some(stored) = quotes.get_mut(&quote.id.0) else {
            return Ok(false);
        };
        if stored.call.status != expected.status || stored.updated_at != expected.updated_at {
            return Ok(false);
        }

        stored.call.status = quote.call.status;
        stored.call.summary = quote.call.summary.clone();
        stored.call.sentiment = quote.call.sentiment.clone();
        stored.call.successful = quote.call.successful;
        stored.call.error = quote.call.error.clone();
        stored.quote_price = quote.quote_price.clone();
        stored.available_time = quote.available_time.clone();
        stored.updated_at = quote.updated_at;
        Ok(true)
    }

    async fn set_decision(
        &self,
        id: &QuoteId,
        expected: QuoteDecision,
        decision: QuoteDecision,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let request_id = match quotes.get(&id.0) {
            Some(quote) if quote.decision == expected => quote.request_id.clone(),
            _ => {
                return Err(RepositoryError::Conflict(format!(
                    "quote `{}` is no longer {}",
                    id.0,
                    expected.as_str()
                )))
            }
        };

        if decision == QuoteDecision::Accepted {
            let already_accepted = quotes.values().any(|quote| {
                quote.request_id == request_id
                    && quote.id != *id
                    && quote.decision == QuoteDecision::Accepted
            });
            if already_accepted {
                return Err(RepositoryError::Conflict(format!(
                    "request `{}` already has an accepted quote",
                    request_id.0
                )));
            }
        }

        if let Some(quote) = quotes.get_mut(&id.0) {
            quote.decision = decision;
            quote.updated_at = updated_at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fixquote_core::calls::CallStatus;
    use fixquote_core::domain::quote::{CallId, QuoteDecision, QuoteId};
    use fixquote_core::domain::request::RequestId;

    use crate::repositories::fixtures::{quote, request, ts, user};
    use crate::repositories::{
        ExpectedCallState, InMemoryQuoteRepository, InMemoryRequestRepository,
        InMemoryUserRepository, QuoteRepository, RepositoryError, RequestRepository,
        UserRepository,
    };

    #[tokio::test]
    async fn in_memory_user_repo_enforces_unique_email() {
        let repo = InMemoryUserRepository::default();
        repo.insert(user("u-1", "Dana@Example.com")).await.expect("insert");

        let found = repo.find_by_email("dana@example.com").await.expect("find");
        assert_eq!(found.map(|user| user.id.0), Some("u-1".to_string()));

        let error = repo.insert(user("u-2", "dana@example.com")).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn in_memory_request_repo_round_trip() {
        let repo = InMemoryRequestRepository::default();
        let stored = request("r-1", "u-1");
        repo.insert(stored.clone()).await.expect("insert");

        assert_eq!(repo.find_by_id(&RequestId("r-1".into())).await.expect("find"), Some(stored));
    }

    #[tokio::test]
    async fn in_memory_quote_repo_matches_sql_constraints() {
        let repo = InMemoryQuoteRepository::default();
        let original = quote("q-1", "r-1", Some("call_1"));
        repo.insert(original.clone()).await.expect("insert");
        repo.insert(quote("q-2", "r-1", Some("call_2"))).await.expect("insert");

        assert!(matches!(
            repo.insert(quote("q-3", "r-1", Some("call_1"))).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(repo.find_by_call_id(&CallId("call_2".into())).await.expect("find").is_some());

        let expected = ExpectedCallState::of(&original);
        let mut updated = original.clone();
        updated.call.status = CallStatus::Completed;
        updated.updated_at = ts("2026-10-19T09:30:00Z");
        assert!(repo.update_call_state(&updated, expected).await.expect("first write"));
        assert!(!repo.update_call_state(&updated, expected).await.expect("stale write"));

        let now = ts("2026-10-19T10:00:00Z");
        repo.set_decision(&QuoteId("q-1".into()), QuoteDecision::Open, QuoteDecision::Accepted, now)
            .await
            .expect("accept");
        assert!(matches!(
            repo.set_decision(&QuoteId("q-2".into()), QuoteDecision::Open, QuoteDecision::Accepted, now)
                .await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_decision_write_refuses_a_stale_read() {
        let repo = InMemoryQuoteRepository::default();
        repo.insert(quote("q-1", "r-1", Some("call_1"))).await.expect("insert");
        let id = QuoteId("q-1".into());

        repo.set_decision(&id, QuoteDecision::Open, QuoteDecision::Accepted, ts("2026-10-19T10:00:00Z"))
            .await
            .expect("accept");
        assert!(matches!(
            repo.set_decision(&id, QuoteDecision::Open, QuoteDecision::Declined, ts("2026-10-19T10:00:01Z"))
                .await,
            Err(RepositoryError::Conflict(_))
        ));

        let stored = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.decision, QuoteDecision::Accepted);
    }
}
