use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use fixquote_core::config::LlmConfig;
use fixquote_core::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no language model is configured")]
    NotConfigured,
    #[error("authentication failed: {message}")]
    Authentication { message: String },
    #[error("rate limit exceeded: {message}")]
    RateLimit { message: String },
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },
    #[error("could not parse model output: {0}")]
    Parse(String),
    #[error("model returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: MessageContent::Text(text.into()) }
    }

    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl { image_url: ImageUrl { url: image_url.into() } },
            ]),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub json_object: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, message: ChatMessage) -> Self {
        Self { model: model.into(), messages: vec![message], temperature: None, json_object: false }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json_object(mut self) -> Self {
        self.json_object = true;
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the text of the first completion choice.
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for `/chat/completions` endpoints that follow the OpenAI wire format (Groq,
/// OpenAI, Ollama's compatibility layer).
pub struct OpenAiCompatibleClient {
    api_key: Option<SecretString>,
    base_url: String,
    http_client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAiCompatibleClient {
    pub fn new(
        api_key: Option<SecretString>,
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, base_url: base_url.into(), http_client, retry })
    }

    /// `None` when the config has no usable credentials, which switches intake to
    /// heuristics.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, LlmError> {
        if !config.is_configured() {
            return Ok(None);
        }
        Self::new(
            config.api_key.clone(),
            config.effective_base_url(),
            Duration::from_secs(config.timeout_secs),
            RetryPolicy::with_max_retries(config.max_retries),
        )
        .map(Some)
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret())).map_err(
                    |_| LlmError::Authentication { message: "invalid API key format".to_string() },
                )?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.json_object.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self.http_client.post(&url).headers(headers).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(error_text);
            return Err(match status {
                reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                    LlmError::Authentication { message }
                }
                reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit { message },
                _ => LlmError::Api { status: status.as_u16(), message },
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Parse(format!("completion envelope: {error}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        debug!(event_name = "llm.request", model = %request.model, "sending chat completion");
        let result = self.retry.run(LlmError::is_transient, || self.send_once(&request)).await;
        if let Err(error) = &result {
            warn!(event_name = "llm.request_failed", model = %request.model, error = %error, "chat completion failed");
        }
        result
    }
}
