use std::sync::OnceLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::price::PriceRange;
use crate::domain::provider::Provider;

pub const DEFAULT_LOCATION: &str = "DFW";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub price_range: PriceRange,
    pub explanation: String,
}

/// Market-rate table used when no estimator model is configured or it returns nothing
/// usable.
pub fn heuristic_estimate(issue: &str) -> PriceEstimate {
    let issue = issue.to_ascii_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|keyword| issue.contains(keyword));

    let (min, max, explanation) = if has(&["leak", "faucet", "sink"]) {
        (
            70,
            120,
            "Plumbing repairs typically cost between $70-120 in the DFW area, depending on the \
             complexity of the leak and parts needed.",
        )
    } else if has(&["electrical", "outlet", "light"]) {
        (
            85,
            150,
            "Electrical repairs usually range from $85-150, varying based on the complexity of the \
             wiring and any parts that need replacement.",
        )
    } else if has(&["door", "window"]) {
        (
            65,
            110,
            "Door and window repairs typically cost $65-110, depending on the type of repair and \
             materials required.",
        )
    } else {
        (
            60,
            100,
            "General handyman services in the DFW area typically cost between $60-100 per hour, \
             with most small jobs taking 1-2 hours to complete.",
        )
    };

    PriceEstimate {
        price_range: PriceRange { min: Decimal::from(min), max: Decimal::from(max) },
        explanation: explanation.to_string(),
    }
}

fn prose_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(\d+)(?:-|\s+to\s+)(\d+)").expect("static prose range pattern")
    })
}

/// Pulls a `$A-B` or `$A to B` range out of free-form model output.
pub fn range_from_prose(text: &str) -> Option<PriceRange> {
    let captures = prose_range_pattern().captures(text)?;
    let min: i64 = captures.get(1)?.as_str().parse().ok()?;
    let max: i64 = captures.get(2)?.as_str().parse().ok()?;
    PriceRange::from_whole_dollars(min.min(max), min.max(max)).ok()
}

/// Quote details synthesized locally, either for mock dispatch or when a live call could
/// not be placed.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteDetails {
    pub quote_price: String,
    pub estimated_price: Decimal,
    pub available_time: String,
    pub duration: String,
    pub included_in_quote: String,
}

const WEEKDAYS: [&str; 6] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];
const DAY_PARTS: [&str; 3] = ["morning", "afternoon", "evening"];
const DURATIONS: [&str; 4] = ["30 minutes", "1 hour", "1.5 hours", "2 hours"];

pub fn synthesize_quote<R: Rng + ?Sized>(provider: &Provider, issue: &str, rng: &mut R) -> QuoteDetails {
    let issue = issue.to_ascii_lowercase();
    let plumbing = ["leak", "faucet", "plumbing"].iter().any(|keyword| issue.contains(keyword));

    let base = if plumbing {
        70.0
    } else if issue.contains("electrical") || issue.contains("light") {
        90.0
    } else {
        60.0
    };
    let adjusted = (base * (1.0 + (f64::from(provider.rating) - 4.5) / 10.0)).round() as i64;

    let day = WEEKDAYS.choose(rng).copied().unwrap_or("Monday");
    let part = DAY_PARTS.choose(rng).copied().unwrap_or("morning");
    let duration = DURATIONS.choose(rng).copied().unwrap_or("1 hour");

    let extras = if plumbing {
        "basic parts, water testing"
    } else if issue.contains("electrical") {
        "wiring check, safety inspection"
    } else {
        "minor repairs"
    };

    QuoteDetails {
        quote_price: format!("${adjusted}"),
        estimated_price: Decimal::from(adjusted),
        available_time: format!("{day} {part}"),
        duration: duration.to_string(),
        included_in_quote: format!("Labor, inspection, {extras}"),
    }
}
