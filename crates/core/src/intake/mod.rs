pub mod heuristic;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::price::PriceRange;

/// ZIP code assumed when the customer gives no location.
pub const DEFAULT_ADDRESS: &str = "75025";
pub const DEFAULT_NAME: &str = "Guest";
pub const DEFAULT_AVAILABILITY: &str = "Weekday evenings";

pub fn default_price_range() -> PriceRange {
    PriceRange { min: Decimal::from(50), max: Decimal::from(100) }
}

/// Structured form of a free-text repair request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsedRequest {
    pub issue: String,
    pub description: String,
    pub name: String,
    pub address: String,
    pub times_available: Vec<String>,
    pub desired_price_range: PriceRange,
    pub clarifying_questions: Vec<String>,
}

pub use heuristic::parse_text;
