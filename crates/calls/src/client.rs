use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use fixquote_core::config::VoiceConfig;
use fixquote_core::domain::quote::CallId;
use fixquote_core::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("voice provider is not configured")]
    NotConfigured,
    #[error("voice provider rejected credentials: {message}")]
    Authentication { message: String },
    #[error("voice provider rate limit: {message}")]
    RateLimit { message: String },
    #[error("voice provider error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("voice provider network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },
    #[error("unexpected voice provider payload: {0}")]
    Parse(String),
}

impl VoiceError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Body of `POST /v2/create-phone-call`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateCallRequest {
    pub from_number: String,
    pub to_number: String,
    pub agent_id: String,
    pub retell_llm_dynamic_variables: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreatedCall {
    pub call_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CallAnalysis {
    #[serde(default)]
    pub call_summary: Option<String>,
    #[serde(default)]
    pub user_sentiment: Option<String>,
    #[serde(default)]
    pub call_successful: Option<bool>,
}

/// Response of `GET /v2/get-call/{call_id}`. Older payloads use `status`/`analysis`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CallDetails {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default, alias = "status")]
    pub call_status: Option<String>,
    #[serde(default, alias = "analysis")]
    pub call_analysis: Option<CallAnalysis>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub disconnection_reason: Option<String>,
}

#[async_trait]
pub trait VoiceProvider: Send + Sync {
    async fn create_phone_call(&self, request: &CreateCallRequest) -> Result<CreatedCall, VoiceError>;
    async fn get_call(&self, call_id: &CallId) -> Result<CallDetails, VoiceError>;
}

pub struct RetellClient {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
    retry: RetryPolicy,
}

impl RetellClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, VoiceError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, base_url: base_url.into(), http_client, retry: lookup_policy(retry) })
    }

    pub fn from_config(config: &VoiceConfig) -> Result<Self, VoiceError> {
        let api_key = config.api_key.clone().ok_or(VoiceError::NotConfigured)?;
        Self::new(
            api_key,
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::with_max_retries(config.max_retries),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap, VoiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key.expose_secret())).map_err(
                |_| VoiceError::Authentication { message: "invalid API key format".to_string() },
            )?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, VoiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);
            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    VoiceError::Authentication { message }
                }
                reqwest::StatusCode::TOO_MANY_REQUESTS => VoiceError::RateLimit { message },
                _ => VoiceError::Api { status: status.as_u16(), message },
            });
        }
        response.json::<T>().await.map_err(|error| VoiceError::Parse(error.to_string()))
    }

    async fn fetch_call(&self, call_id: &CallId) -> Result<CallDetails, VoiceError> {
        let response = self
            .http_client
            .get(self.endpoint(&format!("v2/get-call/{}", call_id.0)))
            .headers(self.headers()?)
            .send()
            .await?;
        Self::read_json(response).await
    }
}

/// Call lookups retry at most once whatever the caller configured.
pub(crate) fn lookup_policy(retry: RetryPolicy) -> RetryPolicy {
    RetryPolicy { max_retries: retry.max_retries.min(1), ..retry }
}

/// Provider errors arrive as JSON (`message` or `error`), plain text, or an HTML error page.
fn error_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = ["message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        {
            return message.to_string();
        }
        return value.to_string();
    }
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        return format!("received HTML response (status {status}); check base URL and credentials");
    }
    if trimmed.is_empty() {
        return format!("empty response body (status {status})");
    }
    trimmed.to_string()
}

#[async_trait]
impl VoiceProvider for RetellClient {
    // Not retried: a repeated create would dial the handyman twice.
    async fn create_phone_call(&self, request: &CreateCallRequest) -> Result<CreatedCall, VoiceError> {
        debug!(event_name = "voice.create_call", to_number = %request.to_number, "creating phone call");
        let response = self
            .http_client
            .post(self.endpoint("v2/create-phone-call"))
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;
        let created: CreatedCall = Self::read_json(response).await?;
        if created.call_id.trim().is_empty() {
            return Err(VoiceError::Parse("create-phone-call returned an empty call_id".to_string()));
        }
        Ok(created)
    }

    async fn get_call(&self, call_id: &CallId) -> Result<CallDetails, VoiceError> {
        let result = self.retry.run(VoiceError::is_transient, || self.fetch_call(call_id)).await;
        if let Err(error) = &result {
            warn!(event_name = "voice.get_call_failed", call_id = %call_id.0, error = %error, "call lookup failed");
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use fixquote_core::domain::quote::CallId;

    use fixquote_core::retry::RetryPolicy;

    use super::{
        error_message, lookup_policy, CallDetails, CreateCallRequest, CreatedCall, VoiceError, VoiceProvider,
    };

    /// Voice provider double: scripted create results per destination number and canned
    /// call details per call id.
    #[derive(Default)]
    pub(crate) struct StubVoice {
        pub(crate) creates: Mutex<HashMap<String, VecDeque<Result<CreatedCall, VoiceError>>>>,
        pub(crate) calls: Mutex<HashMap<String, Result<CallDetails, String>>>,
        pub(crate) created_requests: Mutex<Vec<CreateCallRequest>>,
        pub(crate) lookups: Mutex<Vec<String>>,
    }

    impl StubVoice {
        pub(crate) fn on_create(self, to_number: &str, result: Result<CreatedCall, VoiceError>) -> Self {
            self.creates
                .lock()
                .expect("creates lock")
                .entry(to_number.to_string())
                .or_default()
                .push_back(result);
            self
        }

        pub(crate) fn on_get(self, call_id: &str, result: Result<CallDetails, String>) -> Self {
            self.calls.lock().expect("calls lock").insert(call_id.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl VoiceProvider for StubVoice {
        async fn create_phone_call(&self, request: &CreateCallRequest) -> Result<CreatedCall, VoiceError> {
            self.created_requests.lock().expect("requests lock").push(request.clone());
            self.creates
                .lock()
                .expect("creates lock")
                .get_mut(&request.to_number)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Ok(CreatedCall { call_id: format!("call_{}", request.to_number) }))
        }

        async fn get_call(&self, call_id: &CallId) -> Result<CallDetails, VoiceError> {
            self.lookups.lock().expect("lookups lock").push(call_id.0.clone());
            match self.calls.lock().expect("calls lock").get(&call_id.0) {
                Some(Ok(details)) => Ok(details.clone()),
                Some(Err(message)) => Err(VoiceError::Api { status: 500, message: message.clone() }),
                None => Err(VoiceError::Api { status: 404, message: "call not found".to_string() }),
            }
        }
    }

    #[test]
    fn call_details_accept_current_and_legacy_field_names() {
        let current: CallDetails = serde_json::from_str(
            r#"{"call_id":"call_1","call_status":"ended","call_analysis":{"call_summary":"Quoted $90","call_successful":true}}"#,
        )
        .expect("current shape");
        let legacy: CallDetails =
            serde_json::from_str(r#"{"status":"error","analysis":{"user_sentiment":"Negative"}}"#)
                .expect("legacy shape");

        assert_eq!(current.call_status.as_deref(), Some("ended"));
        assert_eq!(current.call_analysis.and_then(|analysis| analysis.call_successful), Some(true));
        assert_eq!(legacy.call_status.as_deref(), Some("error"));
        assert_eq!(
            legacy.call_analysis.and_then(|analysis| analysis.user_sentiment).as_deref(),
            Some("Negative")
        );
    }

    #[test]
    fn error_bodies_are_summarized() {
        assert_eq!(error_message(400, r#"{"message":"bad agent id"}"#), "bad agent id");
        assert_eq!(error_message(401, r#"{"error":"invalid key"}"#), "invalid key");
        assert!(error_message(404, "<!DOCTYPE html><html></html>").contains("HTML response"));
        assert_eq!(error_message(502, "  "), "empty response body (status 502)");
        assert_eq!(error_message(500, "upstream down"), "upstream down");
    }

    #[tokio::test]
    async fn failing_lookup_is_attempted_twice_at_most() {
        let voice = StubVoice::default().on_get("call_1", Err("upstream down".to_string()));
        let policy = lookup_policy(RetryPolicy { max_retries: 5, base_delay_ms: 1, max_delay_ms: 1 });
        let call_id = CallId("call_1".to_string());

        let result = policy.run(VoiceError::is_transient, || voice.get_call(&call_id)).await;

        assert!(matches!(result, Err(VoiceError::Api { status: 500, .. })));
        assert_eq!(voice.lookups.lock().expect("lookups lock").len(), 2);
        assert_eq!(lookup_policy(RetryPolicy::none()).max_retries, 0);
    }

    #[test]
    fn transient_classification() {
        assert!(VoiceError::Api { status: 502, message: String::new() }.is_transient());
        assert!(!VoiceError::Api { status: 404, message: String::new() }.is_transient());
        assert!(!VoiceError::NotConfigured.is_transient());
    }
}
