use serde::Serialize;

use crate::platform::Platform;

/// Upper bound on comparable listings kept per record.
pub const MAX_COMPARABLES: usize = 6;

/// Whether a listing is currently on the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketStatus {
    Active,
    OffMarket,
    Sold,
    #[default]
    Unknown,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Active => "active",
            MarketStatus::OffMarket => "off-market",
            MarketStatus::Sold => "sold",
            MarketStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A nearby listing surfaced on a detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparableListing {
    pub price: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baths: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The canonical extraction output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    /// Asking price in whole currency units; 0 when unknown.
    pub price: u64,
    pub address: String,
    pub beds: u32,
    pub baths: f64,
    /// Interior area in square feet.
    pub area: u32,
    pub property_type: String,
    pub source_url: String,
    pub market_status: MarketStatus,
    pub valuation_estimate: Option<u64>,
    pub valuation_estimate_note: Option<String>,
    pub last_sold_price: Option<u64>,
    pub last_sold_date: Option<String>,
    pub comparable_listings: Vec<ComparableListing>,
    pub platform: Platform,
    /// Name of the tier that produced this record.
    pub tier: String,
}

impl ListingRecord {
    /// An empty record for `url`, with every field at its default.
    pub fn empty(platform: Platform, url: &str) -> Self {
        Self {
            price: 0,
            address: String::new(),
            beds: 0,
            baths: 0.0,
            area: 0,
            property_type: "unknown".to_string(),
            source_url: url.to_string(),
            market_status: MarketStatus::Unknown,
            valuation_estimate: None,
            valuation_estimate_note: None,
            last_sold_price: None,
            last_sold_date: None,
            comparable_listings: Vec::new(),
            platform,
            tier: String::new(),
        }
    }

    /// A missing price or a missing address means the tier failed; such a
    /// record is never handed to callers.
    pub fn is_insufficient(&self) -> bool {
        self.price == 0 || self.address.trim().is_empty()
    }
}

/// Listing fields read from embedded structured data. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialListing {
    pub price: Option<u64>,
    pub address: Option<String>,
    pub beds: Option<u32>,
    pub baths: Option<f64>,
    pub area: Option<u32>,
    pub property_type: Option<String>,
}

impl PartialListing {
    /// True when the snippet carried a usable price or address.
    pub fn is_usable(&self) -> bool {
        self.price.is_some_and(|p| p > 0) || self.address.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Raw response of a single GET attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

/// A body that passed block detection, with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub body: String,
    pub status: u16,
    pub attempts: u32,
}

/// A live-DOM snapshot taken by a [`Renderer`](crate::traits::Renderer).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    /// Serialized `document.documentElement.outerHTML`.
    pub html: String,
    /// `document.body.innerText`, when the renderer could read it.
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_when_price_or_address_missing() {
        let mut record = ListingRecord::empty(Platform::Redfin, "https://www.redfin.com/x");
        assert!(record.is_insufficient());

        record.price = 450_000;
        assert!(record.is_insufficient());

        record.address = "12 Elm St, Austin, TX".into();
        assert!(!record.is_insufficient());

        record.price = 0;
        assert!(record.is_insufficient());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = ListingRecord::empty(Platform::Zillow, "https://www.zillow.com/homedetails/1");
        record.market_status = MarketStatus::OffMarket;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["propertyType"], "unknown");
        assert_eq!(json["marketStatus"], "off-market");
        assert_eq!(json["sourceUrl"], "https://www.zillow.com/homedetails/1");
        assert_eq!(json["platform"], "zillow");
        assert!(json["comparableListings"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_partial_usable() {
        assert!(!PartialListing::default().is_usable());
        assert!(
            !PartialListing {
                price: Some(0),
                address: Some(String::new()),
                ..Default::default()
            }
            .is_usable()
        );
        assert!(
            PartialListing {
                address: Some("1 Main St".into()),
                ..Default::default()
            }
            .is_usable()
        );
    }
}
