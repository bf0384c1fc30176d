use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// A dollar range as the customer or an estimator states it. A single figure is kept as a
/// point range (`min == max`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\$?\s*(\d+(?:\.\d+)?)\s*(?:-|to)\s*\$?\s*(\d+(?:\.\d+)?)$")
            .expect("static price range pattern")
    })
}

fn point_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\$?\s*(\d+(?:\.\d+)?)$").expect("static price pattern"))
}

impl PriceRange {
    pub fn new(min: Decimal, max: Decimal) -> Result<Self, DomainError> {
        if min.is_sign_negative() || max.is_sign_negative() {
            return Err(DomainError::InvalidPriceRange("prices must not be negative".to_string()));
        }
        if min > max {
            return Err(DomainError::InvalidPriceRange(format!(
                "minimum {min} is greater than maximum {max}"
            )));
        }
        Ok(Self { min: min.normalize(), max: max.normalize() })
    }

    pub fn point(value: Decimal) -> Result<Self, DomainError> {
        Self::new(value, value)
    }

    pub fn from_whole_dollars(min: i64, max: i64) -> Result<Self, DomainError> {
        Self::new(Decimal::from(min), Decimal::from(max))
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    pub fn midpoint(&self) -> Decimal {
        ((self.min + self.max) / Decimal::from(2)).round_dp(2).normalize()
    }

    /// Phrasing used when the voice agent reads the range aloud.
    pub fn spoken(&self) -> String {
        if self.is_point() {
            format!("${}", self.min)
        } else {
            format!("${} to ${}", self.min, self.max)
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_point() {
            write!(f, "${}", self.min)
        } else {
            write!(f, "${}-{}", self.min, self.max)
        }
    }
}

impl FromStr for PriceRange {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let parse = |text: &str| {
            Decimal::from_str(text)
                .map_err(|error| DomainError::InvalidPriceRange(format!("`{raw}`: {error}")))
        };

        if let Some(captures) = range_pattern().captures(value) {
            return Self::new(parse(&captures[1])?, parse(&captures[2])?);
        }
        if let Some(captures) = point_pattern().captures(value) {
            return Self::point(parse(&captures[1])?);
        }

        Err(DomainError::InvalidPriceRange(format!("`{raw}` is not a dollar amount or range")))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::PriceRange;

    #[test]
    fn parses_common_range_spellings() {
        let expected = PriceRange::from_whole_dollars(50, 100).expect("range");

        for raw in ["$50-100", "$50 - $100", "$50 to $100", "50-100", "$50-$100"] {
            assert_eq!(raw.parse::<PriceRange>().expect(raw), expected, "{raw}");
        }
    }

    #[test]
    fn single_figure_is_a_point_range() {
        let range: PriceRange = "$65".parse().expect("point");
        assert!(range.is_point());
        assert_eq!(range.min, Decimal::from(65));
        assert_eq!(range.to_string(), "$65");
    }

    #[test]
    fn spoken_form_reads_both_ends() {
        let range = PriceRange::from_whole_dollars(50, 200).expect("range");
        assert_eq!(range.spoken(), "$50 to $200");
        assert_eq!(range.to_string(), "$50-200");
    }

    #[test]
    fn inverted_or_garbage_ranges_are_rejected() {
        assert!("$100-50".parse::<PriceRange>().is_err());
        assert!("about fifty".parse::<PriceRange>().is_err());
    }

    #[test]
    fn midpoint_is_average_of_bounds() {
        let range = PriceRange::from_whole_dollars(70, 120).expect("range");
        assert_eq!(range.midpoint(), Decimal::from(95));
    }
}
