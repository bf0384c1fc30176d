use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calls::CallStatus;
use crate::domain::quote::Quote;

/// Which path produced an update. Recorded for audit and logging only; every origin goes
/// through the same ordering guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOrigin {
    Webhook,
    Poll,
    Operator,
}

impl UpdateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poll => "poll",
            Self::Operator => "operator",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallUpdate {
    pub status: Option<CallStatus>,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub successful: Option<bool>,
    pub quote_price: Option<String>,
    pub available_time: Option<String>,
    pub error: Option<String>,
    pub origin: UpdateOrigin,
}

impl CallUpdate {
    pub fn new(origin: UpdateOrigin) -> Self {
        Self {
            status: None,
            summary: None,
            sentiment: None,
            successful: None,
            quote_price: None,
            available_time: None,
            error: None,
            origin,
        }
    }

    pub fn with_status(mut self, status: CallStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = Some(sentiment.into());
        self
    }

    pub fn with_successful(mut self, successful: bool) -> Self {
        self.successful = Some(successful);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_quote_price(mut self, quote_price: impl Into<String>) -> Self {
        self.quote_price = Some(quote_price.into());
        self
    }

    pub fn with_available_time(mut self, available_time: impl Into<String>) -> Self {
        self.available_time = Some(available_time.into());
        self
    }
}

/// Field values that differ from what the quote currently holds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldChanges {
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub successful: Option<bool>,
    pub quote_price: Option<String>,
    pub available_time: Option<String>,
    pub error: Option<String>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.sentiment.is_none()
            && self.successful.is_none()
            && self.quote_price.is_none()
            && self.available_time.is_none()
            && self.error.is_none()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpdatePlan {
    pub from: CallStatus,
    pub to: CallStatus,
    pub fields: FieldChanges,
}

impl UpdatePlan {
    pub fn status_changed(&self) -> bool {
        self.from != self.to
    }

    pub fn is_noop(&self) -> bool {
        !self.status_changed() && self.fields.is_empty()
    }

    pub(crate) fn for_quote(quote: &Quote, update: &CallUpdate) -> Result<Self, UpdateRejection> {
        let current = quote.call.status;
        let to = match update.status {
            None => current,
            Some(CallStatus::Analyzed) => {
                if current.rank() < CallStatus::Analyzed.rank() {
                    CallStatus::Analyzed
                } else {
                    current
                }
            }
            Some(requested) if requested == current => current,
            Some(requested) if current.is_terminal() => {
                return Err(UpdateRejection::Terminal { current, requested });
            }
            Some(requested) if requested.rank() < current.rank() => {
                return Err(UpdateRejection::Regression { current, requested });
            }
            Some(requested) => requested,
        };

        let call = &quote.call;
        let fields = FieldChanges {
            summary: changed_text(update.summary.as_deref(), call.summary.as_deref()),
            sentiment: changed_text(update.sentiment.as_deref(), call.sentiment.as_deref()),
            successful: update.successful.filter(|value| *value != call.successful),
            quote_price: changed_text(update.quote_price.as_deref(), quote.quote_price.as_deref()),
            available_time: changed_text(
                update.available_time.as_deref(),
                quote.available_time.as_deref(),
            ),
            error: changed_text(update.error.as_deref(), call.error.as_deref()),
        };

        Ok(Self { from: current, to, fields })
    }
}

fn changed_text(incoming: Option<&str>, current: Option<&str>) -> Option<String> {
    let incoming = incoming.map(str::trim).filter(|value| !value.is_empty())?;
    if current == Some(incoming) {
        None
    } else {
        Some(incoming.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum UpdateRejection {
    #[error("call is already {current:?}; refusing transition to {requested:?}")]
    Terminal { current: CallStatus, requested: CallStatus },
    #[error("stale update {requested:?} would regress call from {current:?}")]
    Regression { current: CallStatus, requested: CallStatus },
}
