use serde::Deserialize;
use thiserror::Error;

use fixquote_core::calls::transcript;
use fixquote_core::calls::{CallStatus, CallUpdate, UpdateOrigin};
use fixquote_core::domain::quote::CallId;

use crate::client::{CallAnalysis, CallDetails};

/// Inbound webhook body. Providers send the call under `data` or `call`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<WebhookCall>,
    #[serde(default)]
    pub call: Option<WebhookCall>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookCall {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub call_analysis: Option<CallAnalysis>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub disconnection_reason: Option<String>,
    #[serde(default, alias = "error_message")]
    pub error: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("not a call event: `{0}`")]
    NotACallEvent(String),
    #[error("webhook payload has no call id")]
    MissingCallId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WebhookDisposition {
    Update { call_id: CallId, update: CallUpdate },
    /// A `call_*` event this service does not track; acknowledged without a write.
    Ignored { call_id: CallId, event: String },
}

impl WebhookEnvelope {
    pub fn interpret(self) -> Result<WebhookDisposition, WebhookError> {
        let event = self.event.unwrap_or_default();
        if !event.starts_with("call_") {
            return Err(WebhookError::NotACallEvent(event));
        }

        let call = self.data.or(self.call).unwrap_or_default();
        let call_id = call
            .call_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallId(value.to_string()))
            .ok_or(WebhookError::MissingCallId)?;

        let update = CallUpdate::new(UpdateOrigin::Webhook);
        let update = match event.as_str() {
            "call_registered" | "call_queued" => update.with_status(CallStatus::Pending),
            "call_started" | "call_ongoing" => update.with_status(CallStatus::InProgress),
            "call_ended" => match call.failure_reason() {
                Some(reason) => update.with_status(CallStatus::Failed).with_successful(false).with_error(reason),
                None => update.with_status(CallStatus::Completed),
            },
            "call_analyzed" => with_analysis(
                update.with_status(CallStatus::Analyzed),
                call.call_analysis.as_ref(),
                call.transcript.as_deref(),
            ),
            "call_failed" | "call_error" => {
                let update = update.with_status(CallStatus::Failed).with_successful(false);
                match call.failure_reason() {
                    Some(reason) => update.with_error(reason),
                    None => update,
                }
            }
            _ => return Ok(WebhookDisposition::Ignored { call_id, event }),
        };

        Ok(WebhookDisposition::Update { call_id, update })
    }
}

impl WebhookCall {
    fn failure_reason(&self) -> Option<String> {
        let explicit = self.error.as_ref().and_then(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.trim().is_empty() => None,
            serde_json::Value::String(text) => Some(text.trim().to_string()),
            serde_json::Value::Bool(false) => None,
            other => Some(other.to_string()),
        });
        explicit.or_else(|| {
            self.disconnection_reason
                .as_deref()
                .filter(|reason| is_error_disconnection(reason))
                .map(str::to_string)
        })
    }
}

fn is_error_disconnection(reason: &str) -> bool {
    reason.starts_with("error") || reason == "dial_failed"
}

fn with_analysis(
    mut update: CallUpdate,
    analysis: Option<&CallAnalysis>,
    transcript_text: Option<&str>,
) -> CallUpdate {
    if let Some(analysis) = analysis {
        if let Some(summary) = &analysis.call_summary {
            update = update.with_summary(summary.clone());
        }
        if let Some(sentiment) = &analysis.user_sentiment {
            update = update.with_sentiment(sentiment.clone());
        }
        if let Some(successful) = analysis.call_successful {
            update = update.with_successful(successful);
        }
    }
    if let Some(text) = transcript_text {
        let details = transcript::scrape(text);
        if let Some(price) = details.quote_price {
            update = update.with_quote_price(price);
        }
        if let Some(available) = details.available_time {
            update = update.with_available_time(available);
        }
    }
    update
}

impl CallDetails {
    /// Pull-path mapping: `ended` completes, `error` fails, anything else leaves the status
    /// alone and only merges analysis.
    pub fn to_update(&self) -> CallUpdate {
        let update = CallUpdate::new(UpdateOrigin::Poll);
        let update = match self.call_status.as_deref() {
            Some("ended") => update.with_status(CallStatus::Completed),
            Some("error") => {
                let update = update.with_status(CallStatus::Failed).with_successful(false);
                match &self.disconnection_reason {
                    Some(reason) => update.with_error(reason.clone()),
                    None => update,
                }
            }
            _ => update,
        };
        with_analysis(update, self.call_analysis.as_ref(), self.transcript.as_deref())
    }
}
