use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use uuid::Uuid;

use fixquote_core::calls::CallStatus;
use fixquote_core::domain::provider::Provider;
use fixquote_core::domain::quote::{CallId, CallTracking, Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::ServiceRequest;
use fixquote_core::domain::user::User;
use fixquote_core::estimate::{synthesize_quote, QuoteDetails};

use crate::client::{CreateCallRequest, VoiceProvider};

const DEFAULT_SPOKEN_RANGE: &str = "$50 to $200";

/// How a single provider is asked for a quote. Implementations never fail: every error
/// becomes a quote carrying `Failed` status and the error text.
#[async_trait]
pub trait QuoteStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn request_quote(&self, provider: &Provider, request: &ServiceRequest, user: &User) -> Quote;
}

struct SharedRng(Mutex<StdRng>);

impl SharedRng {
    fn from_entropy() -> Self {
        Self(Mutex::new(StdRng::from_entropy()))
    }

    fn seeded(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }

    fn details(&self, provider: &Provider, issue: &str) -> QuoteDetails {
        let mut rng = match self.0.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        synthesize_quote(provider, issue, &mut *rng)
    }
}

fn blank_quote(provider: &Provider, request: &ServiceRequest, call: CallTracking) -> Quote {
    let now = Utc::now();
    Quote {
        id: QuoteId(Uuid::new_v4().to_string()),
        request_id: request.id.clone(),
        provider: provider.snapshot(),
        quote_price: None,
        estimated_price: None,
        available_time: None,
        duration: None,
        included_in_quote: None,
        call,
        decision: QuoteDecision::Open,
        created_at: now,
        updated_at: now,
    }
}

fn with_details(mut quote: Quote, details: QuoteDetails) -> Quote {
    quote.quote_price = Some(details.quote_price);
    quote.estimated_price = Some(details.estimated_price);
    quote.available_time = Some(details.available_time);
    quote.duration = Some(details.duration);
    quote.included_in_quote = Some(details.included_in_quote);
    quote
}

/// Locally estimated quote recorded when the provider could not be reached.
pub(crate) fn fallback_quote(
    provider: &Provider,
    request: &ServiceRequest,
    details: QuoteDetails,
    error: impl Into<String>,
) -> Quote {
    let call = CallTracking {
        call_id: Some(CallId(format!("failed-{}", Uuid::new_v4()))),
        status: CallStatus::Failed,
        summary: None,
        sentiment: None,
        successful: false,
        error: Some(error.into()),
    };
    with_details(blank_quote(provider, request, call), details)
}

/// Places a real outbound call through the voice provider.
pub struct LiveCallStrategy {
    voice: Arc<dyn VoiceProvider>,
    from_number: String,
    agent_id: String,
    callback_number: Option<String>,
    rng: SharedRng,
}

impl LiveCallStrategy {
    pub fn new(
        voice: Arc<dyn VoiceProvider>,
        from_number: impl Into<String>,
        agent_id: impl Into<String>,
        callback_number: Option<String>,
    ) -> Self {
        Self {
            voice,
            from_number: from_number.into(),
            agent_id: agent_id.into(),
            callback_number,
            rng: SharedRng::from_entropy(),
        }
    }

    pub fn build_call(&self, provider: &Provider, request: &ServiceRequest, user: &User) -> CreateCallRequest {
        let or = |value: &str, fallback: &str| {
            let value = value.trim();
            if value.is_empty() { fallback.to_string() } else { value.to_string() }
        };
        let customer_phone = user.phone.clone().unwrap_or_default();
        let callback = self.callback_number.clone().unwrap_or_else(|| customer_phone.clone());
        let times = request.times_available_text();

        let variables = BTreeMap::from([
            ("handyman_name".to_string(), provider.name.clone()),
            ("handyman_company".to_string(), provider.company.clone()),
            ("customer_name".to_string(), or(&user.name, "Customer")),
            ("phone_number".to_string(), or(&customer_phone, &callback)),
            ("callback_number".to_string(), callback.clone()),
            ("problem".to_string(), or(&request.issue, "home repair")),
            ("description".to_string(), request.description.clone()),
            ("location".to_string(), or(&request.address, "your home")),
            (
                "price_range".to_string(),
                request
                    .desired_price_range
                    .as_ref()
                    .map(|range| range.spoken())
                    .unwrap_or_else(|| DEFAULT_SPOKEN_RANGE.to_string()),
            ),
            ("time_available".to_string(), or(&times, "flexible")),
            ("service_type".to_string(), provider.service_type_for(&request.issue)),
        ]);
        let metadata = BTreeMap::from([
            ("request_type".to_string(), "handyman_quote".to_string()),
            ("customer_name".to_string(), or(&user.name, "Customer")),
            ("handyman_name".to_string(), provider.name.clone()),
            ("request_id".to_string(), request.id.0.clone()),
        ]);

        CreateCallRequest {
            from_number: self.from_number.clone(),
            to_number: provider.phone.clone(),
            agent_id: self.agent_id.clone(),
            retell_llm_dynamic_variables: variables,
            metadata,
        }
    }
}

#[async_trait]
impl QuoteStrategy for LiveCallStrategy {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn request_quote(&self, provider: &Provider, request: &ServiceRequest, user: &User) -> Quote {
        let details = self.rng.details(provider, &request.issue);
        let call = self.build_call(provider, request, user);

        match self.voice.create_phone_call(&call).await {
            Ok(created) => {
                info!(
                    event_name = "dispatch.call_created",
                    request_id = %request.id.0,
                    provider_id = %provider.id.0,
                    call_id = %created.call_id,
                    "outbound quote call placed"
                );
                let mut quote =
                    blank_quote(provider, request, CallTracking::pending(Some(CallId(created.call_id))));
                quote.estimated_price = Some(details.estimated_price);
                quote
            }
            Err(error) => {
                warn!(
                    event_name = "dispatch.call_failed",
                    request_id = %request.id.0,
                    provider_id = %provider.id.0,
                    error = %error,
                    "outbound quote call failed; recording local estimate"
                );
                fallback_quote(provider, request, details, error.to_string())
            }
        }
    }
}

/// Fabricates an immediately completed quote without contacting anyone.
pub struct MockCallStrategy {
    rng: SharedRng,
}

impl Default for MockCallStrategy {
    fn default() -> Self {
        Self { rng: SharedRng::from_entropy() }
    }
}

impl MockCallStrategy {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: SharedRng::seeded(seed) }
    }
}

#[async_trait]
impl QuoteStrategy for MockCallStrategy {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn request_quote(&self, provider: &Provider, request: &ServiceRequest, _user: &User) -> Quote {
        let details = self.rng.details(provider, &request.issue);
        let issue = if request.issue.trim().is_empty() { "issue" } else { request.issue.trim() };
        let summary = format!(
            "Quote for {} from {}: The {} will be fixed for {}. They can start work {}.",
            provider.name, provider.company, issue, details.quote_price, details.available_time
        );
        // Suffix keeps ids unique when two requests dispatch in the same millisecond.
        let suffix = Uuid::new_v4().simple().to_string();
        let call = CallTracking {
            call_id: Some(CallId(format!(
                "mock_{}_{}_{}",
                Utc::now().timestamp_millis(),
                provider.id.0,
                &suffix[..8]
            ))),
            status: CallStatus::Completed,
            summary: Some(summary),
            sentiment: Some("positive".to_string()),
            successful: true,
            error: None,
        };
        with_details(blank_quote(provider, request, call), details)
    }
}
