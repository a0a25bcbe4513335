//! Schema.org JSON-LD extraction.
//!
//! Snippets are parsed into [`serde_json::Value`] and probed along a fixed
//! set of key paths; every probe is independently optional.

use serde_json::Value;

use crate::models::PartialListing;
use crate::page::ParsedPage;
use crate::parse::{parse_number, parse_price, squash_whitespace};

/// `@type` fragments accepted as describing a listing. Matched as
/// case-insensitive substrings, so `SingleFamilyResidence` hits `residence`.
const LISTING_TYPES: &[&str] = &[
    "residence",
    "house",
    "apartment",
    "condominium",
    "townhouse",
    "realestate",
    "accommodation",
    "place",
    "product",
    "offer",
];

const ADDRESS_PARTS: &[&str] = &["streetAddress", "addressLocality", "addressRegion", "postalCode"];

/// Read the best listing snippet embedded in `page`.
///
/// The first qualifying snippet with a price or an address wins. Snippets
/// that fail to parse are skipped.
pub fn extract(page: &ParsedPage) -> PartialListing {
    for (index, raw) in page.ld_json_blocks().iter().enumerate() {
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(index, error = %e, "Skipping malformed JSON-LD snippet");
                continue;
            }
        };

        for node in flatten(value) {
            if !is_listing_type(&node) {
                continue;
            }
            let partial = read_node(&node);
            if partial.is_usable() {
                tracing::debug!(index, price = ?partial.price, "Structured listing data found");
                return partial;
            }
        }
    }
    PartialListing::default()
}

/// Expand top-level arrays and `@graph` containers into individual nodes.
fn flatten(value: Value) -> Vec<Value> {
    let mut nodes = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut expanded = Vec::new();
    for item in &nodes {
        if let Some(graph) = item.get("@graph").and_then(Value::as_array) {
            expanded.extend(graph.iter().cloned());
        }
    }
    nodes.extend(expanded);
    nodes
}

fn is_listing_type(node: &Value) -> bool {
    type_labels(node).iter().any(|label| {
        let lower = label.to_lowercase();
        LISTING_TYPES.iter().any(|t| lower.contains(t))
    })
}

/// `@type` may be a plain string or an array of strings.
fn type_labels(node: &Value) -> Vec<&str> {
    match node.get("@type") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn read_node(node: &Value) -> PartialListing {
    PartialListing {
        price: read_price(node),
        address: node.get("address").and_then(read_address),
        beds: first_number(node, &["numberOfBedrooms", "numberOfRooms"]).map(|n| n as u32),
        baths: first_number(
            node,
            &["numberOfBathroomsTotal", "numberOfFullBathrooms", "numberOfBathrooms"],
        ),
        area: node.get("floorSize").and_then(read_area),
        property_type: type_labels(node).first().map(|s| s.to_string()),
    }
}

fn read_price(node: &Value) -> Option<u64> {
    let offers = node.get("offers");
    let offer = match offers {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };

    let candidates = [
        offer.and_then(|o| o.get("price")),
        offer.and_then(|o| o.get("lowPrice")),
        node.get("price"),
    ];
    candidates.into_iter().flatten().find_map(number_or_price)
}

fn number_or_price(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64),
        Value::String(s) => Some(parse_price(s)).filter(|p| *p > 0),
        _ => None,
    }
}

fn read_address(value: &Value) -> Option<String> {
    let joined = match value {
        Value::String(s) => squash_whitespace(s),
        Value::Object(_) => ADDRESS_PARTS
            .iter()
            .filter_map(|key| value.get(*key))
            .filter_map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };
    (!joined.is_empty()).then_some(joined)
}

fn read_area(value: &Value) -> Option<u32> {
    let scalar = match value {
        Value::Object(_) => value.get("value")?,
        other => other,
    };
    as_number(scalar).map(|n| n as u32)
}

fn first_number(node: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| node.get(*k)).find_map(as_number)
}

/// Numbers show up as JSON numbers, numeric strings, or `QuantitativeValue`s.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite() && *f >= 0.0),
        Value::String(s) => parse_number(s),
        Value::Object(_) => value.get("value").and_then(as_number),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(squash_whitespace(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(snippets: &[&str]) -> ParsedPage {
        let scripts: String = snippets
            .iter()
            .map(|s| format!(r#"<script type="application/ld+json">{s}</script>"#))
            .collect();
        ParsedPage::parse(&format!("<html><head>{scripts}</head><body></body></html>"))
    }

    #[test]
    fn test_single_family_residence() {
        let page = page_with(&[r#"{
            "@context": "https://schema.org",
            "@type": "SingleFamilyResidence",
            "offers": {"@type": "Offer", "price": 500000},
            "address": {
                "streetAddress": "1 Main St",
                "addressLocality": "Springfield",
                "addressRegion": "IL",
                "postalCode": "62704"
            },
            "numberOfRooms": 3,
            "numberOfBathroomsTotal": 2.5,
            "floorSize": {"@type": "QuantitativeValue", "value": "1,800", "unitCode": "FTK"}
        }"#]);

        let partial = extract(&page);
        assert_eq!(partial.price, Some(500_000));
        assert_eq!(partial.address.as_deref(), Some("1 Main St, Springfield, IL, 62704"));
        assert_eq!(partial.beds, Some(3));
        assert_eq!(partial.baths, Some(2.5));
        assert_eq!(partial.area, Some(1800));
        assert_eq!(partial.property_type.as_deref(), Some("SingleFamilyResidence"));
    }

    #[test]
    fn test_malformed_snippet_is_skipped() {
        let page = page_with(&[
            r#"{"@type": "House", "offers": {"price": 1"#,
            r#"{"@type": "House", "offers": {"price": "$725,000"}, "address": "9 Bay Rd"}"#,
        ]);
        let partial = extract(&page);
        assert_eq!(partial.price, Some(725_000));
        assert_eq!(partial.address.as_deref(), Some("9 Bay Rd"));
    }

    #[test]
    fn test_unrelated_types_are_ignored() {
        let page = page_with(&[
            r#"{"@type": "Organization", "name": "Brokerage", "address": "HQ"}"#,
            r#"{"@type": "BreadcrumbList", "itemListElement": []}"#,
        ]);
        assert_eq!(extract(&page), PartialListing::default());
    }

    #[test]
    fn test_first_usable_snippet_wins() {
        let page = page_with(&[
            r#"{"@type": "Product", "name": "no price or address"}"#,
            r#"{"@type": ["Product", "RealEstateListing"], "offers": [{"lowPrice": 410000}], "address": {"streetAddress": "5 Pine Ct", "addressRegion": ""}}"#,
            r#"{"@type": "House", "offers": {"price": 999999}, "address": "later"}"#,
        ]);
        let partial = extract(&page);
        assert_eq!(partial.price, Some(410_000));
        assert_eq!(partial.address.as_deref(), Some("5 Pine Ct"));
        assert_eq!(partial.property_type.as_deref(), Some("Product"));
    }

    #[test]
    fn test_graph_container_is_flattened() {
        let page = page_with(&[r#"{
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "WebPage", "name": "listing"},
                {"@type": "Apartment", "price": "329000", "numberOfBedrooms": "2", "floorSize": 900}
            ]
        }"#]);
        let partial = extract(&page);
        assert_eq!(partial.price, Some(329_000));
        assert_eq!(partial.beds, Some(2));
        assert_eq!(partial.area, Some(900));
        assert_eq!(partial.address, None);
    }

    #[test]
    fn test_no_snippets_yields_empty() {
        let page = ParsedPage::parse("<html><body><p>nothing here</p></body></html>");
        assert_eq!(extract(&page), PartialListing::default());
    }
}
