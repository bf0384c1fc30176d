use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use fixquote_agent::{ImageDescriber, LlmError, PriceEstimator, RequestParser};
use fixquote_calls::{
    ReconcileError, ReconcileOutcome, RefreshReport, StatusReconciler, WebhookDisposition,
    WebhookEnvelope,
};
use fixquote_core::calls::{CallStatus, CallUpdate, UpdateOrigin};
use fixquote_core::domain::quote::{CallId, Quote, QuoteDecision, QuoteId};
use fixquote_core::domain::request::{RequestId, RequestSource, ServiceRequest};
use fixquote_core::domain::user::NewUser;
use fixquote_core::errors::{ApplicationError, InterfaceError};
use fixquote_core::estimate::PriceEstimate;
use fixquote_db::repositories::{QuoteRepository, RequestRepository};

use crate::intake::{decide_quote, persistence, IntakeService, SubmitForm};

pub const WEBHOOK_SECRET_HEADER: &str = "x-fixquote-webhook-secret";

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<IntakeService>,
    pub reconciler: Arc<StatusReconciler>,
    pub requests: Arc<dyn RequestRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub parser: Arc<RequestParser>,
    pub estimator: Arc<PriceEstimator>,
    pub describer: Arc<ImageDescriber>,
    pub webhook_secret: Option<SecretString>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/parse", post(parse_request))
        .route("/api/price-estimate", post(price_estimate))
        .route("/api/describe-image", post(describe_image))
        .route("/api/submit", post(submit))
        .route("/api/fetch-quotes", post(fetch_quotes))
        .route("/api/requests/{id}", get(get_request))
        .route("/api/update-quote", post(update_quote))
        .route("/api/webhooks/voice", post(voice_webhook))
        .route("/api/quotes/{id}/accept", post(accept_quote))
        .route("/api/quotes/{id}/decline", post(decline_quote))
        .with_state(state)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub message: &'static str,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<Json<T>, ApiFailure>;

fn failure(error: ApplicationError) -> ApiFailure {
    let interface = error.into_interface(Uuid::new_v4().to_string());
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(
            event_name = "api.request_failed",
            correlation_id = %interface.correlation_id(),
            error = %interface.message(),
            "request failed"
        );
    }
    (
        status,
        Json(ApiError {
            error: interface.message().to_string(),
            message: interface.user_message(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiFailure {
    failure(ApplicationError::Validation(message.into()))
}

fn reconcile_failure(error: ReconcileError) -> ApiFailure {
    failure(ApplicationError::Persistence(error.to_string()))
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiFailure> {
    serde_json::from_slice(body).map_err(|error| bad_request(format!("malformed JSON body: {error}")))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: String,
    pub user_id: String,
    pub issue: String,
    pub description: String,
    pub address: String,
    pub times_available: Vec<String>,
    pub desired_price_range: Option<String>,
    pub source: &'static str,
    pub source_text: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ServiceRequest> for RequestView {
    fn from(request: &ServiceRequest) -> Self {
        Self {
            id: request.id.0.clone(),
            user_id: request.user_id.0.clone(),
            issue: request.issue.clone(),
            description: request.description.clone(),
            address: request.address.clone(),
            times_available: request.times_available.clone(),
            desired_price_range: request.desired_price_range.as_ref().map(ToString::to_string),
            source: request.source.as_str(),
            source_text: request.source_text.clone(),
            image_url: request.image_url.clone(),
            created_at: request.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteView {
    pub id: String,
    pub request_id: String,
    pub provider_id: String,
    pub provider_name: String,
    pub provider_company: String,
    pub provider_phone: String,
    pub provider_rating: f32,
    pub quote_price: Option<String>,
    pub estimated_price: Option<Decimal>,
    pub available_time: Option<String>,
    pub duration: Option<String>,
    pub included_in_quote: Option<String>,
    pub call_id: Option<String>,
    pub call_status: &'static str,
    pub call_summary: Option<String>,
    pub user_sentiment: Option<String>,
    pub call_successful: bool,
    pub call_error: Option<String>,
    pub decision: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Quote> for QuoteView {
    fn from(quote: &Quote) -> Self {
        Self {
            id: quote.id.0.clone(),
            request_id: quote.request_id.0.clone(),
            provider_id: quote.provider.provider_id.0.clone(),
            provider_name: quote.provider.name.clone(),
            provider_company: quote.provider.company.clone(),
            provider_phone: quote.provider.phone.clone(),
            provider_rating: quote.provider.rating,
            quote_price: quote.quote_price.clone(),
            estimated_price: quote.estimated_price,
            available_time: quote.available_time.clone(),
            duration: quote.duration.clone(),
            included_in_quote: quote.included_in_quote.clone(),
            call_id: quote.call.call_id.as_ref().map(|id| id.0.clone()),
            call_status: quote.call.status.as_str(),
            call_summary: quote.call.summary.clone(),
            user_sentiment: quote.call.sentiment.clone(),
            call_successful: quote.call.successful,
            call_error: quote.call.error.clone(),
            decision: quote.decision.as_str(),
            created_at: quote.created_at,
            updated_at: quote.updated_at,
        }
    }
}

fn quote_views(quotes: &[Quote]) -> Vec<QuoteView> {
    quotes.iter().map(QuoteView::from).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateView {
    pub price_range: String,
    pub explanation: String,
}

impl From<PriceEstimate> for EstimateView {
    fn from(estimate: PriceEstimate) -> Self {
        Self { price_range: estimate.price_range.to_string(), explanation: estimate.explanation }
    }
}

// /api/parse

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseBody {
    #[serde(default)]
    raw_input: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedView {
    pub issue: String,
    pub description: String,
    pub name: String,
    pub address: String,
    pub times_available: Vec<String>,
    pub desired_price_range: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub data: ParsedView,
    pub clarifying_questions: Vec<String>,
    pub price_estimate: EstimateView,
    pub source: &'static str,
}

async fn parse_request(State(state): State<AppState>, body: Bytes) -> ApiResult<ParseResponse> {
    let body: ParseBody = parse_json(&body)?;
    if body.raw_input.trim().is_empty() {
        return Err(bad_request("rawInput is required"));
    }

    let outcome = state.parser.parse(&body.raw_input).await;
    let parsed = outcome.parsed;
    let (estimate, _) = state.estimator.estimate(&parsed.issue, Some(&parsed.address)).await;
    info!(
        event_name = "intake.parsed",
        source = outcome.source.as_str(),
        questions = parsed.clarifying_questions.len(),
        "raw request parsed"
    );

    Ok(Json(ParseResponse {
        data: ParsedView {
            issue: parsed.issue,
            description: parsed.description,
            name: parsed.name,
            address: parsed.address,
            times_available: parsed.times_available,
            desired_price_range: parsed.desired_price_range.to_string(),
        },
        clarifying_questions: parsed.clarifying_questions,
        price_estimate: estimate.into(),
        source: outcome.source.as_str(),
    }))
}

// /api/price-estimate

#[derive(Debug, Deserialize)]
struct EstimateBody {
    #[serde(default)]
    issue: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub data: EstimateView,
}

async fn price_estimate(State(state): State<AppState>, body: Bytes) -> ApiResult<EstimateResponse> {
    let body: EstimateBody = parse_json(&body)?;
    if body.issue.trim().is_empty() {
        return Err(bad_request("issue is required"));
    }
    let (estimate, _) = state.estimator.estimate(&body.issue, body.location.as_deref()).await;
    Ok(Json(EstimateResponse { data: estimate.into() }))
}

// /api/describe-image

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeBody {
    #[serde(default)]
    image_url: String,
}

#[derive(Debug, Serialize)]
pub struct DescribeResponse {
    pub description: String,
}

async fn describe_image(State(state): State<AppState>, body: Bytes) -> ApiResult<DescribeResponse> {
    let body: DescribeBody = parse_json(&body)?;
    if body.image_url.trim().is_empty() {
        return Err(bad_request("imageUrl is required"));
    }

    match state.describer.describe(body.image_url.trim()).await {
        Ok(description) => Ok(Json(DescribeResponse { description })),
        Err(error) => {
            let status = if matches!(error, LlmError::NotConfigured) {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::BAD_GATEWAY
            };
            let (_, Json(mut payload)) = failure(ApplicationError::Integration(error.to_string()));
            payload.message = "Image description is unavailable right now.";
            Err((status, Json(payload)))
        }
    }
}

// /api/submit

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimesInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    issue: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    times_available: Option<TimesInput>,
    #[serde(default)]
    desired_price_range: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_text: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub request_id: String,
    pub quotes: Vec<QuoteView>,
}

async fn submit(State(state): State<AppState>, body: Bytes) -> ApiResult<SubmitResponse> {
    let body: SubmitBody = parse_json(&body)?;
    let source = match body.source.as_deref() {
        None => RequestSource::Form,
        Some(raw) => RequestSource::parse(raw)
            .ok_or_else(|| bad_request(format!("unknown source `{raw}` (expected form|text|voice|image)")))?,
    };
    let times_available = match body.times_available {
        Some(TimesInput::One(slot)) => slot.split(',').map(str::to_string).collect(),
        Some(TimesInput::Many(slots)) => slots,
        None => Vec::new(),
    };

    let form = SubmitForm {
        customer: NewUser { name: body.name, email: body.email, phone: body.phone },
        issue: body.issue,
        description: body.description,
        address: body.address,
        times_available,
        desired_price_range: body.desired_price_range,
        source,
        source_text: body.source_text,
        image_url: body.image_url,
    };
    let submission = state.intake.submit(form).await.map_err(failure)?;

    Ok(Json(SubmitResponse {
        success: true,
        request_id: submission.request.id.0.clone(),
        quotes: quote_views(&submission.quotes),
    }))
}

// /api/fetch-quotes and /api/requests/{id}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchBody {
    #[serde(default)]
    request_id: String,
    #[serde(default, alias = "refreshFromRetell")]
    refresh_from_provider: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWithQuotes {
    pub request: RequestView,
    pub quotes: Vec<QuoteView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<RefreshReport>,
}

async fn load_request(state: &AppState, request_id: &RequestId) -> Result<ServiceRequest, ApiFailure> {
    state
        .requests
        .find_by_id(request_id)
        .await
        .map_err(|error| failure(persistence(error)))?
        .ok_or_else(|| failure(ApplicationError::not_found("request", request_id.0.clone())))
}

async fn fetch_quotes(State(state): State<AppState>, body: Bytes) -> ApiResult<RequestWithQuotes> {
    let body: FetchBody = parse_json(&body)?;
    let request_id = RequestId(body.request_id.trim().to_string());
    if request_id.0.is_empty() {
        return Err(bad_request("requestId is required"));
    }
    let request = load_request(&state, &request_id).await?;

    let (quotes, refresh) = if body.refresh_from_provider {
        let report = state.reconciler.refresh_request(&request_id).await.map_err(reconcile_failure)?;
        (report.quotes.clone(), Some(report))
    } else {
        let quotes =
            state.quotes.list_for_request(&request_id).await.map_err(|error| failure(persistence(error)))?;
        (quotes, None)
    };

    Ok(Json(RequestWithQuotes { request: (&request).into(), quotes: quote_views(&quotes), refresh }))
}

async fn get_request(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<RequestWithQuotes> {
    let request_id = RequestId(id);
    let request = load_request(&state, &request_id).await?;
    let quotes =
        state.quotes.list_for_request(&request_id).await.map_err(|error| failure(persistence(error)))?;
    Ok(Json(RequestWithQuotes { request: (&request).into(), quotes: quote_views(&quotes), refresh: None }))
}

// /api/update-quote

/// Operator edits arrive in either naming convention.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UpdateData {
    #[serde(alias = "call_status", alias = "status")]
    call_status: Option<String>,
    #[serde(alias = "call_summary")]
    call_summary: Option<String>,
    #[serde(alias = "user_sentiment")]
    user_sentiment: Option<String>,
    #[serde(alias = "call_successful")]
    call_successful: Option<bool>,
    #[serde(alias = "quote_price")]
    quote_price: Option<String>,
    #[serde(alias = "available_time")]
    available_time: Option<String>,
    #[serde(alias = "call_error")]
    call_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuoteBody {
    #[serde(default)]
    call_id: String,
    #[serde(default)]
    update_data: UpdateData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub success: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<QuoteView>,
}

impl UpdateData {
    fn into_update(self) -> Result<CallUpdate, ApiFailure> {
        let mut update = CallUpdate::new(UpdateOrigin::Operator);
        if let Some(raw) = self.call_status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
            let status = CallStatus::parse(raw).ok_or_else(|| bad_request(format!("unknown call status `{raw}`")))?;
            update = update.with_status(status);
        }
        update.summary = self.call_summary;
        update.sentiment = self.user_sentiment;
        update.successful = self.call_successful;
        update.quote_price = self.quote_price;
        update.available_time = self.available_time;
        update.error = self.call_error;
        Ok(update)
    }
}

fn outcome_response(outcome: ReconcileOutcome, call_id: &CallId) -> ApiResult<UpdateResponse> {
    match outcome {
        ReconcileOutcome::NotFound => {
            Err(failure(ApplicationError::not_found("quote for call", call_id.0.clone())))
        }
        ReconcileOutcome::Rejected { reason, .. } => Err(failure(ApplicationError::Domain(reason.into()))),
        outcome => Ok(Json(UpdateResponse {
            success: true,
            outcome: outcome.label(),
            quote: outcome.quote().map(QuoteView::from),
        })),
    }
}

async fn update_quote(State(state): State<AppState>, body: Bytes) -> ApiResult<UpdateResponse> {
    let body: UpdateQuoteBody = parse_json(&body)?;
    let call_id = CallId(body.call_id.trim().to_string());
    if call_id.0.is_empty() {
        return Err(bad_request("callId is required"));
    }
    let update = body.update_data.into_update()?;
    let outcome = state.reconciler.apply(&call_id, &update).await.map_err(reconcile_failure)?;
    outcome_response(outcome, &call_id)
}

// /api/webhooks/voice

type HmacSha256 = Hmac<Sha256>;

/// Compares keyed digests of both values, so timing does not reveal where they diverge.
fn secret_matches(expected: &SecretString, presented: Option<&str>) -> bool {
    let Some(presented) = presented else {
        return false;
    };
    let expected = expected.expose_secret().as_bytes();
    let Ok(mut reference) = HmacSha256::new_from_slice(expected) else {
        return false;
    };
    let mut candidate = reference.clone();
    reference.update(expected);
    candidate.update(presented.as_bytes());
    candidate.verify_slice(&reference.finalize().into_bytes()).is_ok()
}

async fn voice_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<UpdateResponse> {
    if let Some(secret) = &state.webhook_secret {
        let presented = headers.get(WEBHOOK_SECRET_HEADER).and_then(|value| value.to_str().ok());
        if !secret_matches(secret, presented) {
            warn!(event_name = "reconcile.webhook_unauthorized", "webhook secret mismatch");
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiError {
                    error: "webhook secret missing or invalid".to_string(),
                    message: "The request could not be authenticated.",
                    correlation_id: Uuid::new_v4().to_string(),
                }),
            ));
        }
    }

    let envelope: WebhookEnvelope = parse_json(&body)?;
    let disposition = envelope.interpret().map_err(|error| bad_request(error.to_string()))?;

    match disposition {
        WebhookDisposition::Ignored { call_id, event } => {
            info!(event_name = "reconcile.webhook_ignored", call_id = %call_id.0, event = %event, "untracked call event");
            Ok(Json(UpdateResponse { success: true, outcome: "ignored", quote: None }))
        }
        WebhookDisposition::Update { call_id, update } => {
            let outcome = state.reconciler.apply(&call_id, &update).await.map_err(reconcile_failure)?;
            match outcome {
                // Stale deliveries are acknowledged so the provider stops retrying them.
                ReconcileOutcome::Rejected { .. } => {
                    Ok(Json(UpdateResponse { success: true, outcome: "rejected", quote: None }))
                }
                other => outcome_response(other, &call_id),
            }
        }
    }
}

// /api/quotes/{id}/accept|decline

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub quote: QuoteView,
}

async fn decide(state: &AppState, id: String, decision: QuoteDecision) -> ApiResult<DecisionResponse> {
    let quote = decide_quote(state.quotes.as_ref(), &QuoteId(id), decision).await.map_err(failure)?;
    Ok(Json(DecisionResponse { success: true, quote: (&quote).into() }))
}

async fn accept_quote(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<DecisionResponse> {
    decide(&state, id, QuoteDecision::Accepted).await
}

async fn decline_quote(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<DecisionResponse> {
    decide(&state, id, QuoteDecision::Declined).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use fixquote_agent::{ImageDescriber, PriceEstimator, RequestParser};
    use fixquote_calls::StatusReconciler;
    use fixquote_core::audit::InMemoryAuditSink;
    use fixquote_core::calls::CallStatus;
    use fixquote_core::domain::quote::{CallId, QuoteId};
    use fixquote_db::repositories::{InMemoryQuoteRepository, QuoteRepository};
    use secrecy::SecretString;

    use crate::intake::tests::{fixture, Fixture};

    use super::{router, secret_matches, AppState, WEBHOOK_SECRET_HEADER};

    struct Harness {
        app: Router,
        quotes: Arc<InMemoryQuoteRepository>,
    }

    fn harness(webhook_secret: Option<&str>) -> Harness {
        let Fixture { service, requests, quotes } = fixture();
        let reconciler =
            StatusReconciler::new(quotes.clone(), None, Arc::new(InMemoryAuditSink::default()));
        let state = AppState {
            intake: Arc::new(service),
            reconciler: Arc::new(reconciler),
            requests,
            quotes: quotes.clone(),
            parser: Arc::new(RequestParser::heuristic_only()),
            estimator: Arc::new(PriceEstimator::heuristic_only()),
            describer: Arc::new(ImageDescriber::new(None, "gpt-4o")),
            webhook_secret: webhook_secret.map(|secret| SecretString::from(secret.to_string())),
        };
        Harness { app: router(state), quotes }
    }

    async fn post(app: &Router, uri: &str, body: Value, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut request = Request::post(uri).header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = request.body(Body::from(body.to_string())).expect("request");
        send(app, request).await
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::get(uri).body(Body::empty()).expect("request")).await
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json body") };
        (status, payload)
    }

    fn submit_body() -> Value {
        json!({
            "name": "Dana",
            "email": "dana@example.com",
            "phone": "+15550109999",
            "issue": "Leaking faucet",
            "address": "Plano",
            "timesAvailable": "Saturday morning, Sunday",
            "desiredPriceRange": "$80-120"
        })
    }

    /// Stores a live-looking pending quote so webhook updates have something to move.
    async fn pending_quote(harness: &Harness, request_id: &str, call_id: &str) {
        let mut quote = harness
            .quotes
            .list_for_request(&fixquote_core::domain::request::RequestId(request_id.to_string()))
            .await
            .expect("list")
            .remove(0);
        quote.id = QuoteId(format!("q-{call_id}"));
        quote.call.call_id = Some(CallId(call_id.to_string()));
        quote.call.status = CallStatus::Pending;
        quote.call.summary = None;
        quote.call.successful = false;
        quote.quote_price = None;
        harness.quotes.insert(quote).await.expect("insert");
    }

    #[tokio::test]
    async fn submit_returns_one_completed_mock_quote_per_provider() {
        let harness = harness(None);

        let (status, body) = post(&harness.app, "/api/submit", submit_body(), &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let quotes = body["quotes"].as_array().expect("quotes");
        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0]["providerName"], "Joe");
        assert_eq!(quotes[0]["quotePrice"], "$72");
        assert!(quotes.iter().all(|quote| quote["callStatus"] == "completed"));

        let request_id = body["requestId"].as_str().expect("request id");
        let (status, fetched) = get(&harness.app, &format!("/api/requests/{request_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["request"]["timesAvailable"], json!(["Saturday morning", "Sunday"]));
        assert_eq!(fetched["request"]["desiredPriceRange"], "$80-120");
    }

    #[tokio::test]
    async fn submit_without_issue_is_a_bad_request() {
        let harness = harness(None);
        let mut body = submit_body();
        body["issue"] = json!("  ");

        let (status, payload) = post(&harness.app, "/api/submit", body, &[]).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["correlationId"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let harness = harness(None);
        let request = Request::post("/api/parse")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let (status, _) = send(&harness.app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn parse_falls_back_to_heuristics_without_a_model() {
        let harness = harness(None);

        let (status, body) = post(
            &harness.app,
            "/api/parse",
            json!({ "rawInput": "My sink is clogged. My name is Sam, I live in Frisco." }),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "heuristic");
        assert_eq!(body["data"]["issue"], "My sink is clogged");
        assert_eq!(body["data"]["name"], "Sam");
        assert!(body["priceEstimate"]["priceRange"].as_str().is_some());
    }

    #[tokio::test]
    async fn describe_image_without_model_is_unavailable() {
        let harness = harness(None);

        let (status, _) =
            post(&harness.app, "/api/describe-image", json!({ "imageUrl": "https://img.test/a.png" }), &[]).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let harness = harness(None);

        let (status, _) = get(&harness.app, "/api/requests/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            post(&harness.app, "/api/fetch-quotes", json!({ "requestId": "missing" }), &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_moves_a_live_call_forward_and_acks_stale_events() {
        let harness = harness(None);
        let (_, submitted) = post(&harness.app, "/api/submit", submit_body(), &[]).await;
        let request_id = submitted["requestId"].as_str().expect("request id").to_string();
        pending_quote(&harness, &request_id, "call_live_1").await;

        let (status, body) = post(
            &harness.app,
            "/api/webhooks/voice",
            json!({ "event": "call_ended", "data": { "call_id": "call_live_1" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "applied");
        assert_eq!(body["quote"]["callStatus"], "completed");

        let (status, body) = post(
            &harness.app,
            "/api/webhooks/voice",
            json!({ "event": "call_started", "call": { "call_id": "call_live_1" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "rejected");

        let (_, fetched) = get(&harness.app, &format!("/api/requests/{request_id}")).await;
        let live = fetched["quotes"]
            .as_array()
            .expect("quotes")
            .iter()
            .find(|quote| quote["callId"] == "call_live_1")
            .cloned()
            .expect("live quote");
        assert_eq!(live["callStatus"], "completed");
    }

    #[tokio::test]
    async fn webhook_rejects_unknown_calls_and_non_call_events() {
        let harness = harness(None);

        let (status, _) = post(
            &harness.app,
            "/api/webhooks/voice",
            json!({ "event": "call_ended", "data": { "call_id": "call_nobody" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            post(&harness.app, "/api/webhooks/voice", json!({ "event": "agent_updated" }), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(&harness.app, "/api/webhooks/voice", json!({ "event": "call_ended" }), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_secret_is_enforced_when_configured() {
        let harness = harness(Some("s3cret"));
        let payload = json!({ "event": "call_ended", "data": { "call_id": "call_nobody" } });

        let (status, _) = post(&harness.app, "/api/webhooks/voice", payload.clone(), &[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post(&harness.app, "/api/webhooks/voice", payload, &[(WEBHOOK_SECRET_HEADER, "s3cret")]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn operator_update_accepts_both_casings_and_refuses_regressions() {
        let harness = harness(None);
        let (_, submitted) = post(&harness.app, "/api/submit", submit_body(), &[]).await;
        let request_id = submitted["requestId"].as_str().expect("request id").to_string();
        pending_quote(&harness, &request_id, "call_op_1").await;

        let (status, body) = post(
            &harness.app,
            "/api/update-quote",
            json!({ "callId": "call_op_1", "updateData": { "call_status": "in-progress", "quotePrice": "$95" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quote"]["callStatus"], "in-progress");
        assert_eq!(body["quote"]["quotePrice"], "$95");

        let (status, _) = post(
            &harness.app,
            "/api/update-quote",
            json!({ "callId": "call_op_1", "updateData": { "callStatus": "pending" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = post(
            &harness.app,
            "/api/update-quote",
            json!({ "callId": "call_op_1", "updateData": { "callStatus": "teleported" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(
            &harness.app,
            "/api/update-quote",
            json!({ "callId": "call_missing", "updateData": { "callStatus": "completed" } }),
            &[],
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetch_with_refresh_skips_mock_calls() {
        let harness = harness(None);
        let (_, submitted) = post(&harness.app, "/api/submit", submit_body(), &[]).await;
        let request_id = submitted["requestId"].as_str().expect("request id");

        let (status, body) = post(
            &harness.app,
            "/api/fetch-quotes",
            json!({ "requestId": request_id, "refreshFromRetell": true }),
            &[],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quotes"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["refresh"]["skipped"], 3);
        assert_eq!(body["refresh"]["refreshed"], 0);
    }

    #[tokio::test]
    async fn second_accept_on_the_same_request_conflicts() {
        let harness = harness(None);
        let (_, submitted) = post(&harness.app, "/api/submit", submit_body(), &[]).await;
        let quotes = submitted["quotes"].as_array().expect("quotes");
        let first = quotes[0]["id"].as_str().expect("id");
        let second = quotes[1]["id"].as_str().expect("id");

        let (status, body) = post(&harness.app, &format!("/api/quotes/{first}/accept"), json!({}), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quote"]["decision"], "accepted");

        let (status, _) = post(&harness.app, &format!("/api/quotes/{second}/accept"), json!({}), &[]).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = post(&harness.app, "/api/quotes/nope/decline", json!({}), &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn webhook_secret_comparison() {
        let secret = SecretString::from("whsec_abc123".to_string());
        assert!(secret_matches(&secret, Some("whsec_abc123")));
        assert!(!secret_matches(&secret, Some("whsec_abc124")));
        assert!(!secret_matches(&secret, Some("whsec_abc1234")));
        assert!(!secret_matches(&secret, Some("")));
        assert!(!secret_matches(&secret, None));
    }
}
