use std::sync::OnceLock;

use regex::Regex;

/// Quote details recovered from a call transcript.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranscriptDetails {
    pub quote_price: Option<String>,
    pub available_time: Option<String>,
}

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\$\d+(?:-\d+)?)").expect("valid price regex"))
}

fn availability_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)available\s+([^,.]+)").expect("valid availability regex"))
}

pub fn scrape(transcript: &str) -> TranscriptDetails {
    let quote_price = price_pattern()
        .captures(transcript)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str().to_string());
    let available_time = availability_pattern()
        .captures(transcript)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str().trim().to_string())
        .filter(|value| !value.is_empty());

    TranscriptDetails { quote_price, available_time }
}
