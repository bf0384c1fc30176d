//! Pattern-based extraction used when no language model is configured or the model call
//! fails. It never errors: every field falls back to a default.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::price::PriceRange;
use crate::intake::{
    default_price_range, ParsedRequest, DEFAULT_ADDRESS, DEFAULT_AVAILABILITY, DEFAULT_NAME,
};

fn name_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)my name is ([^,.]+)").expect("static name pattern"),
            Regex::new(r"(?i)([^,.]+) here").expect("static name pattern"),
        ]
    })
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bin ([^,.]+)").expect("static location pattern"))
}

fn availability_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)available\s+([^,.]+)").expect("static availability pattern"),
            Regex::new(r"(?i)can do\s+([^,.]+)").expect("static availability pattern"),
            Regex::new(r"(?i)free\s+([^,.]+)").expect("static availability pattern"),
        ]
    })
}

fn budget_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:budget|price|cost|pay|spend|around|\$)\s*\$?(\d+)(?:\s*-\s*\$?(\d+))?")
            .expect("static budget pattern")
    })
}

fn first_capture(pattern: &Regex, input: &str) -> Option<String> {
    pattern
        .captures(input)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse_text(raw: &str) -> ParsedRequest {
    let input = raw.trim();
    let issue = input.split('.').next().unwrap_or_default().trim().to_string();

    let name = name_patterns()
        .iter()
        .find_map(|pattern| first_capture(pattern, input))
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    let address =
        first_capture(location_pattern(), input).unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    let mut times_available: Vec<String> = availability_patterns()
        .iter()
        .filter_map(|pattern| first_capture(pattern, input))
        .collect();
    if times_available.is_empty() {
        times_available = keyword_availability(input);
    }

    let desired_price_range = extract_budget(input).unwrap_or_else(default_price_range);

    let mut clarifying_questions = Vec::new();
    if name == DEFAULT_NAME {
        clarifying_questions.push("What's your name?".to_string());
    }
    if times_available.is_empty() {
        clarifying_questions
            .push("When would you be available for a handyman to visit?".to_string());
        times_available.push(DEFAULT_AVAILABILITY.to_string());
    }
    if address == DEFAULT_ADDRESS && !input.contains("Plano") {
        clarifying_questions.push("What's your address or ZIP code?".to_string());
    }

    ParsedRequest {
        issue,
        description: input.to_string(),
        name,
        address,
        times_available,
        desired_price_range,
        clarifying_questions,
    }
}

fn keyword_availability(input: &str) -> Vec<String> {
    let lower = input.to_ascii_lowercase();
    let slots: Vec<&str> = [("morning", "Morning"), ("afternoon", "Afternoon"), ("evening", "Evening")]
        .into_iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, label)| label)
        .collect();

    let day = if lower.contains("weekend") {
        Some("Weekend")
    } else if lower.contains("saturday") {
        Some("Saturday")
    } else if lower.contains("sunday") {
        Some("Sunday")
    } else {
        None
    };

    slots
        .into_iter()
        .map(|slot| match day {
            Some(day) => format!("{day} {slot}"),
            None => slot.to_string(),
        })
        .collect()
}

/// A lone figure becomes a point range; two figures become an ordered range.
fn extract_budget(input: &str) -> Option<PriceRange> {
    let captures = budget_pattern().captures(input)?;
    let first: i64 = captures.get(1)?.as_str().parse().ok()?;
    match captures.get(2).and_then(|matched| matched.as_str().parse::<i64>().ok()) {
        Some(second) => PriceRange::from_whole_dollars(first.min(second), first.max(second)).ok(),
        None => PriceRange::from_whole_dollars(first, first).ok(),
    }
}
