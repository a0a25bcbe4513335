//! Per-platform listing assembly.
//!
//! Structured data is tried first for every field; selector probes from the
//! tier's [`SelectorProfile`] fill the gaps, then the detail regexes over
//! combined detail containers and finally over the whole page text.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::AppError;
use crate::models::{ComparableListing, ListingRecord, MAX_COMPARABLES, MarketStatus};
use crate::page::ParsedPage;
use crate::parse::{Details, parse_details, parse_number, parse_price, squash_whitespace};
use crate::platform::{ExtrasProfile, Platform, SelectorProfile, Tier};
use crate::structured;

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d+)").expect("valid regex"));

static TREND_NOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([+\-−]?\s*\$[\d,.]+\s*[KM]?\s+since\s+sold\s+in\s+[A-Za-z]{3,9}\.?\s+\d{4})")
        .expect("valid regex")
});

/// `"<brand> Estimate $..."`; group 1 is the brand, group 2 the amount.
static ESTIMATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Za-z][\w.]*)\s+Estimate\s*:?\s*\$\s*(\d{1,3}(?:,\d{3})+|\d+)").expect("valid regex")
});

static LAST_SOLD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSOLD\s+([A-Z]{3})[A-Z]*\.?\s+(\d{4})\s+FOR\s+\$\s*(\d{1,3}(?:,\d{3})+|\d+)")
        .expect("valid regex")
});

/// Assembles a [`ListingRecord`] for one platform using one selector profile.
#[derive(Debug, Clone, Copy)]
pub struct SourceExtractor {
    platform: Platform,
    profile: &'static SelectorProfile,
}

impl SourceExtractor {
    pub fn new(platform: Platform, profile: &'static SelectorProfile) -> Self {
        Self { platform, profile }
    }

    /// Extractor bound to `tier`'s selector profile.
    pub fn for_tier(platform: Platform, tier: &Tier) -> Self {
        Self::new(platform, tier.profile())
    }

    /// Extractor using the platform's first-tier profile.
    pub fn primary(platform: Platform) -> Self {
        Self::new(platform, platform.tiers()[0].profile())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn profile(&self) -> &'static SelectorProfile {
        self.profile
    }

    /// Parse `html` and assemble a record, failing when price or address is
    /// missing.
    pub fn extract_from_html(&self, html: &str, url: &str) -> Result<ListingRecord, AppError> {
        let page = ParsedPage::parse(html);
        self.extract_from_page(&page, url)
    }

    pub fn extract_from_page(&self, page: &ParsedPage, url: &str) -> Result<ListingRecord, AppError> {
        let record = self.assemble(page, url);
        if record.is_insufficient() {
            return Err(AppError::InsufficientData {
                platform: self.platform.display_name().to_string(),
                price: record.price,
                address: record.address,
            });
        }
        Ok(record)
    }

    /// Assemble a record without the sufficiency check.
    pub fn assemble(&self, page: &ParsedPage, url: &str) -> ListingRecord {
        let profile = self.profile;
        let embedded = structured::extract(page);
        let mut record = ListingRecord::empty(self.platform, url);

        record.price = embedded
            .price
            .filter(|p| *p > 0)
            .or_else(|| page.first_value(profile.price, positive_price))
            .unwrap_or(0);

        record.address = embedded
            .address
            .filter(|a| !a.is_empty())
            .or_else(|| page.first_value(profile.address, clean_address))
            .unwrap_or_default();

        let combined = DetailFallback::new(page, profile);
        record.beds = embedded
            .beds
            .filter(|b| *b > 0)
            .or_else(|| page.first_value(profile.beds, positive_count))
            .or_else(|| combined.get(|d| (d.beds > 0).then_some(d.beds)))
            .unwrap_or(0);
        record.baths = embedded
            .baths
            .filter(|b| *b > 0.0)
            .or_else(|| page.first_value(profile.baths, |s| parse_number(s).filter(|n| *n > 0.0)))
            .or_else(|| combined.get(|d| (d.baths > 0.0).then_some(d.baths)))
            .unwrap_or(0.0);
        record.area = embedded
            .area
            .filter(|a| *a > 0)
            .or_else(|| page.first_value(profile.area, positive_count))
            .or_else(|| combined.get(|d| (d.area > 0).then_some(d.area)))
            .unwrap_or(0);

        record.property_type = embedded
            .property_type
            .filter(|t| !t.is_empty())
            .or_else(|| page.first_value(profile.property_type, |s| Some(s.to_string())))
            .unwrap_or_else(|| "unknown".to_string());

        if let Some(extras) = self.platform.extras() {
            apply_extras(&mut record, page, extras, url);
        }

        tracing::debug!(
            platform = %self.platform,
            profile = profile.name,
            price = record.price,
            address = %record.address,
            beds = record.beds,
            baths = record.baths,
            area = record.area,
            comps = record.comparable_listings.len(),
            "Assembled listing record"
        );
        record
    }
}

/// Detail counts from combined containers, then from the full page text.
/// Both are parsed at most once, on first use.
struct DetailFallback<'a> {
    page: &'a ParsedPage,
    profile: &'static SelectorProfile,
    container: OnceCell<Option<Details>>,
    full_text: OnceCell<Details>,
}

impl<'a> DetailFallback<'a> {
    fn new(page: &'a ParsedPage, profile: &'static SelectorProfile) -> Self {
        Self {
            page,
            profile,
            container: OnceCell::new(),
            full_text: OnceCell::new(),
        }
    }

    fn get<T>(&self, pick: impl Fn(&Details) -> Option<T>) -> Option<T> {
        let container = self.container.get_or_init(|| {
            self.page.first_value(self.profile.details, |s| {
                let details = parse_details(s);
                (details != Details::default()).then_some(details)
            })
        });
        container
            .as_ref()
            .and_then(&pick)
            .or_else(|| pick(self.full_text.get_or_init(|| parse_details(self.page.text()))))
    }
}

fn positive_price(text: &str) -> Option<u64> {
    Some(parse_price(text)).filter(|p| *p > 0)
}

fn positive_count(text: &str) -> Option<u32> {
    parse_number(text).map(|n| n as u32).filter(|n| *n > 0)
}

/// Drop trailing `| MLS# ... | Brand` segments from titles.
fn clean_address(raw: &str) -> Option<String> {
    let head = raw.split('|').next().unwrap_or_default();
    let cleaned = squash_whitespace(head).trim_end_matches([',', '-']).trim().to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn apply_extras(record: &mut ListingRecord, page: &ParsedPage, extras: &ExtrasProfile, url: &str) {
    let text = page.text();

    record.market_status = if text.to_lowercase().contains(extras.off_market_marker) {
        MarketStatus::OffMarket
    } else {
        MarketStatus::Active
    };

    record.valuation_estimate = ESTIMATE
        .captures_iter(text)
        .find(|c| c.get(1).is_some_and(|b| b.as_str().eq_ignore_ascii_case(extras.brand)))
        .and_then(|c| c.get(2))
        .map(|m| parse_price(m.as_str()))
        .filter(|p| *p > 0);

    record.valuation_estimate_note = TREND_NOTE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| squash_whitespace(m.as_str()));

    if let Some(caps) = LAST_SOLD.captures(text) {
        let month = caps.get(1).map(|m| m.as_str().to_uppercase());
        let year = caps.get(2).map(|m| m.as_str());
        if let (Some(month), Some(year)) = (month, year) {
            record.last_sold_date = Some(format!("{month} {year}"));
        }
        record.last_sold_price = caps
            .get(3)
            .map(|m| parse_price(m.as_str()))
            .filter(|p| *p > 0);
    }

    record.comparable_listings = comparable_listings(page, extras, url);
}

/// Anchors pointing at other listings, in document order, capped at
/// [`MAX_COMPARABLES`]. Anchors without a price are dropped.
pub fn comparable_listings(page: &ParsedPage, extras: &ExtrasProfile, url: &str) -> Vec<ComparableListing> {
    let pattern = match Regex::new(extras.listing_path) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(pattern = extras.listing_path, error = %e, "Invalid listing path pattern");
            return Vec::new();
        }
    };
    let own_path = Url::parse(url).ok().map(|u| u.path().trim_end_matches('/').to_string());

    let mut seen = HashSet::new();
    let mut comps = Vec::new();
    for anchor in page.anchors() {
        if comps.len() == MAX_COMPARABLES {
            break;
        }
        if !pattern.is_match(&anchor.href) {
            continue;
        }
        let path = href_path(&anchor.href);
        if own_path.as_deref() == Some(path.as_str()) || seen.contains(&path) {
            continue;
        }
        let Some(price) = DOLLAR_AMOUNT
            .captures(&anchor.text)
            .and_then(|c| c.get(1))
            .map(|m| parse_price(m.as_str()))
            .filter(|p| *p > 0)
        else {
            continue;
        };
        seen.insert(path);
        let details = parse_details(&anchor.text);
        comps.push(ComparableListing {
            price,
            address: anchor.title.clone(),
            beds: (details.beds > 0).then_some(details.beds),
            baths: (details.baths > 0.0).then_some(details.baths),
            area: (details.area > 0).then_some(details.area),
            url: Some(anchor.href),
        });
    }
    comps
}

/// Path part of an absolute or relative href, without query, fragment or
/// trailing slash.
fn href_path(href: &str) -> String {
    let path = match Url::parse(href) {
        Ok(u) => u.path().to_string(),
        Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.trim_end_matches('/').to_string()
}
