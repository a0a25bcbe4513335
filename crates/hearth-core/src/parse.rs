//! Free-text number parsing: prices and bed/bath/area details.

use std::sync::LazyLock;

use regex::Regex;

static CENTS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d{1,2}\s*$").expect("valid regex"));

static BEDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:bd|bds|beds?|bedrooms?|br)\b").expect("valid regex")
});

static BATHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:ba|baths?|bathrooms?)\b").expect("valid regex")
});

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").expect("valid regex")
});

static AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+)\s*(?:sq\.?\s*ft|sqft|square\s+feet|sf)\b")
        .expect("valid regex")
});

/// Bed, bath and area counts read from specification text. Zero when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Details {
    pub beds: u32,
    pub baths: f64,
    pub area: u32,
}

/// Parse a price such as `"$1,234,567"` into whole currency units.
///
/// Every non-digit character is dropped; text without digits (`"Contact for
/// price"`) yields 0. A trailing cents group (`".00"`) is removed first so it
/// does not multiply the amount.
pub fn parse_price(text: &str) -> u64 {
    let text = CENTS_SUFFIX.replace(text.trim(), "");
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(0)
}

/// Extract beds, baths and area from text like `"3 bed, 2.5 bath, 1,800 sqft"`.
pub fn parse_details(text: &str) -> Details {
    Details {
        beds: parse_beds(text),
        baths: parse_baths(text),
        area: parse_area(text),
    }
}

pub fn parse_beds(text: &str) -> u32 {
    BEDS.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

pub fn parse_baths(text: &str) -> f64 {
    BATHS
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|b| b.is_finite() && *b >= 0.0)
        .unwrap_or(0.0)
}

pub fn parse_area(text: &str) -> u32 {
    AREA.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
        .unwrap_or(0)
}

/// Parse the first number in `text` (`"3"`, `"2.5 ba"`, `"1,800 sq ft"`).
pub fn parse_number(text: &str) -> Option<f64> {
    let token = NUMBER.find(text)?.as_str().replace(',', "");
    token.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0)
}

/// Collapse runs of whitespace into single spaces.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
