use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use fixquote_core::calls::CallStatus;
use fixquote_core::domain::quote::{CallId, Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::{RequestId, ServiceRequest};
use fixquote_core::domain::user::{User, UserId};

pub mod memory;
pub mod quote;
pub mod request;
pub mod user;

pub use memory::{InMemoryQuoteRepository, InMemoryRequestRepository, InMemoryUserRepository};
pub use quote::SqlQuoteRepository;
pub use request::SqlRequestRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("constraint conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                Self::Conflict(db_error.message().to_string())
            }
            _ => Self::Database(error),
        }
    }
}

/// Version of a quote's call state a writer planned against. A conditional write only
/// lands when the stored row still matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpectedCallState {
    pub status: CallStatus,
    pub updated_at: DateTime<Utc>,
}

impl ExpectedCallState {
    pub fn of(quote: &Quote) -> Self {
        Self { status: quote.call.status, updated_at: quote.updated_at }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the email is already taken.
    async fn insert(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<ServiceRequest>, RepositoryError>;
    async fn list_for_user(&self, user_id: &UserId)
        -> Result<Vec<ServiceRequest>, RepositoryError>;
    async fn insert(&self, request: ServiceRequest) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn find_by_call_id(&self, call_id: &CallId) -> Result<Option<Quote>, RepositoryError>;
    async fn list_for_request(&self, request_id: &RequestId)
        -> Result<Vec<Quote>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the call id is already stored.
    async fn insert(&self, quote: Quote) -> Result<(), RepositoryError>;
    /// Writes call status and call-derived fields. Returns `false` when the stored row no
    /// longer matches `expected`.
    async fn update_call_state(
        &self,
        quote: &Quote,
        expected: ExpectedCallState,
    ) -> Result<bool, RepositoryError>;
    /// Moves the quote from `expected` to `decision`. Fails with [`RepositoryError::Conflict`]
    /// when the stored decision is no longer `expected`, or when another quote on the same
    /// request is already accepted.
    async fn set_decision(
        &self,
        id: &QuoteId,
        expected: QuoteDecision,
        decision: QuoteDecision,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Fixed microsecond precision keeps stored timestamps lexically ordered and comparable.
pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
