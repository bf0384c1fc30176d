use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::price::PriceRange;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    Form,
    Text,
    Voice,
    Image,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "form" => Some(Self::Form),
            "text" => Some(Self::Text),
            "voice" => Some(Self::Voice),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// One customer's repair request. Immutable once stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub issue: String,
    pub description: String,
    pub address: String,
    pub times_available: Vec<String>,
    pub desired_price_range: Option<PriceRange>,
    pub source: RequestSource,
    pub source_text: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn times_available_text(&self) -> String {
        if self.times_available.is_empty() {
            "flexible".to_string()
        } else {
            self.times_available.join(", ")
        }
    }
}
