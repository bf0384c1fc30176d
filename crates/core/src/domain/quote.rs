use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calls::{CallStatus, CallUpdate, UpdatePlan, UpdateRejection};
use crate::domain::provider::ProviderSnapshot;
use crate::domain::request::RequestId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

/// Provider-assigned call identifier. Once a real id is stored it addresses the quote for
/// every later status update, so it is unique across quotes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn is_synthetic(&self) -> bool {
        crate::calls::is_synthetic_call_id(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteDecision {
    Open,
    Accepted,
    Declined,
}

impl QuoteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallTracking {
    pub call_id: Option<CallId>,
    pub status: CallStatus,
    pub summary: Option<String>,
    pub sentiment: Option<String>,
    pub successful: bool,
    pub error: Option<String>,
}

impl CallTracking {
    pub fn pending(call_id: Option<CallId>) -> Self {
        Self {
            call_id,
            status: CallStatus::Pending,
            summary: None,
            sentiment: None,
            successful: false,
            error: None,
        }
    }

    /// Whether the pull path may ask the provider about this call.
    pub fn is_refreshable(&self) -> bool {
        match &self.call_id {
            Some(call_id) => {
                !call_id.0.trim().is_empty() && !call_id.is_synthetic() && !self.status.is_terminal()
            }
            None => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub request_id: RequestId,
    pub provider: ProviderSnapshot,
    pub quote_price: Option<String>,
    pub estimated_price: Option<Decimal>,
    pub available_time: Option<String>,
    pub duration: Option<String>,
    pub included_in_quote: Option<String>,
    pub call: CallTracking,
    pub decision: QuoteDecision,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn plan_update(&self, update: &CallUpdate) -> Result<UpdatePlan, UpdateRejection> {
        UpdatePlan::for_quote(self, update)
    }

    /// Applies a plan produced by [`Quote::plan_update`]. Returns whether anything changed.
    pub fn apply_plan(&mut self, plan: &UpdatePlan) -> bool {
        if plan.is_noop() {
            return false;
        }

        self.call.status = plan.to;
        let fields = &plan.fields;
        if let Some(summary) = &fields.summary {
            self.call.summary = Some(summary.clone());
        }
        if let Some(sentiment) = &fields.sentiment {
            self.call.sentiment = Some(sentiment.clone());
        }
        if let Some(successful) = fields.successful {
            self.call.successful = successful;
        }
        if let Some(error) = &fields.error {
            self.call.error = Some(error.clone());
        }
        if let Some(quote_price) = &fields.quote_price {
            self.quote_price = Some(quote_price.clone());
        }
        if let Some(available_time) = &fields.available_time {
            self.available_time = Some(available_time.clone());
        }
        self.updated_at = Utc::now();
        true
    }

    pub fn accept(&mut self) -> Result<(), DomainError> {
        match self.decision {
            QuoteDecision::Open => {
                self.decision = QuoteDecision::Accepted;
                self.updated_at = Utc::now();
                Ok(())
            }
            QuoteDecision::Accepted => Ok(()),
            QuoteDecision::Declined => Err(DomainError::InvalidDecision {
                from: self.decision,
                to: QuoteDecision::Accepted,
            }),
        }
    }

    pub fn decline(&mut self) -> Result<(), DomainError> {
        match self.decision {
            QuoteDecision::Open => {
                self.decision = QuoteDecision::Declined;
                self.updated_at = Utc::now();
                Ok(())
            }
            QuoteDecision::Declined => Ok(()),
            QuoteDecision::Accepted => Err(DomainError::InvalidDecision {
                from: self.decision,
                to: QuoteDecision::Declined,
            }),
        }
    }
}
