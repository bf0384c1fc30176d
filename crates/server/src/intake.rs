use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use fixquote_calls::QuoteDispatcher;
use fixquote_core::domain::price::PriceRange;
use fixquote_core::domain::quote::{Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::{RequestId, RequestSource, ServiceRequest};
use fixquote_core::domain::user::{NewUser, User, UserId};
use fixquote_core::errors::{ApplicationError, DomainError};
use fixquote_core::intake::DEFAULT_ADDRESS;
use fixquote_db::repositories::{QuoteRepository, RepositoryError, RequestRepository, UserRepository};

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitForm {
    pub customer: NewUser,
    pub issue: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub times_available: Vec<String>,
    pub desired_price_range: Option<String>,
    pub source: RequestSource,
    pub source_text: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub user: User,
    pub request: ServiceRequest,
    pub quotes: Vec<Quote>,
}

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

/// Turns a submitted form into a stored request and one quote per roster provider.
pub struct IntakeService {
    users: Arc<dyn UserRepository>,
    requests: Arc<dyn RequestRepository>,
    dispatcher: Arc<QuoteDispatcher>,
}

impl IntakeService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        requests: Arc<dyn RequestRepository>,
        dispatcher: Arc<QuoteDispatcher>,
    ) -> Self {
        Self { users, requests, dispatcher }
    }

    pub fn dispatch_strategy(&self) -> &'static str {
        self.dispatcher.strategy_name()
    }

    pub async fn submit(&self, form: SubmitForm) -> Result<Submission, ApplicationError> {
        let issue = form.issue.trim().to_string();
        if issue.is_empty() {
            return Err(ApplicationError::Validation("issue must not be empty".to_string()));
        }
        let desired_price_range = non_empty(form.desired_price_range)
            .map(|raw| raw.parse::<PriceRange>())
            .transpose()
            .map_err(ApplicationError::Domain)?;

        let user = self.resolve_user(&form.customer).await?;
        let request = ServiceRequest {
            id: RequestId(Uuid::new_v4().to_string()),
            user_id: user.id.clone(),
            description: non_empty(form.description).unwrap_or_else(|| issue.clone()),
            issue,
            address: non_empty(form.address).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            times_available: form
                .times_available
                .into_iter()
                .map(|slot| slot.trim().to_string())
                .filter(|slot| !slot.is_empty())
                .collect(),
            desired_price_range,
            source: form.source,
            source_text: non_empty(form.source_text),
            image_url: non_empty(form.image_url),
            created_at: Utc::now(),
        };
        self.requests.insert(request.clone()).await.map_err(persistence)?;
        info!(
            event_name = "intake.request_stored",
            request_id = %request.id.0,
            user_id = %user.id.0,
            source = request.source.as_str(),
            "service request stored"
        );

        let quotes = self.dispatcher.dispatch(&request, &user).await;
        Ok(Submission { user, request, quotes })
    }

    /// Get-or-create keyed by email. A concurrent insert of the same email resolves to the
    /// row that won.
    async fn resolve_user(&self, customer: &NewUser) -> Result<User, ApplicationError> {
        let email = customer.resolved_email();
        if let Some(existing) = self.users.find_by_email(&email).await.map_err(persistence)? {
            return Ok(existing);
        }

        let user = User {
            id: UserId(Uuid::new_v4().to_string()),
            name: customer.display_name(),
            email: email.clone(),
            phone: non_empty(customer.phone.clone()),
            created_at: Utc::now(),
        };
        match self.users.insert(user.clone()).await {
            Ok(()) => Ok(user),
            Err(RepositoryError::Conflict(_)) => self
                .users
                .find_by_email(&email)
                .await
                .map_err(persistence)?
                .ok_or_else(|| ApplicationError::Conflict(format!("user `{email}` vanished during insert"))),
            Err(error) => Err(persistence(error)),
        }
    }
}

/// Records a customer's accept/decline. At most one quote per request may be accepted.
pub async fn decide_quote(
    quotes: &dyn QuoteRepository,
    quote_id: &QuoteId,
    decision: QuoteDecision,
) -> Result<Quote, ApplicationError> {
    let mut quote = quotes
        .find_by_id(quote_id)
        .await
        .map_err(persistence)?
        .ok_or_else(|| ApplicationError::not_found("quote", quote_id.0.clone()))?;
    let read_decision = quote.decision;

    match decision {
        QuoteDecision::Accepted => quote.accept()?,
        QuoteDecision::Declined => quote.decline()?,
        QuoteDecision::Open => {
            return Err(ApplicationError::Domain(DomainError::InvalidDecision {
                from: quote.decision,
                to: QuoteDecision::Open,
            }))
        }
    }

    match quotes.set_decision(&quote.id, read_decision, quote.decision, quote.updated_at).await {
        Ok(()) => {
            info!(
                event_name = "intake.quote_decided",
                quote_id = %quote.id.0,
                request_id = %quote.request_id.0,
                decision = quote.decision.as_str(),
                "quote decision recorded"
            );
            Ok(quote)
        }
        Err(RepositoryError::Conflict(reason)) => Err(ApplicationError::Conflict(format!(
            "decision on request `{}` refused: {reason}",
            quote.request_id.0
        ))),
        Err(error) => Err(persistence(error)),
    }
}
