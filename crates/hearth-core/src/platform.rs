//! Supported listing platforms and their static extraction tables.
//!
//! Tier order, fetch strategies and selector candidates are plain data so the
//! orchestrator can walk them and tests can enumerate them.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;

use crate::error::AppError;
use crate::page::Probe;

/// A supported listing website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Zillow,
    Redfin,
    Realtor,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Zillow, Platform::Redfin, Platform::Realtor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Zillow => "zillow",
            Platform::Redfin => "redfin",
            Platform::Realtor => "realtor",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Zillow => "Zillow",
            Platform::Redfin => "Redfin",
            Platform::Realtor => "Realtor.com",
        }
    }

    fn domain(&self) -> &'static str {
        match self {
            Platform::Zillow => "zillow.com",
            Platform::Redfin => "redfin.com",
            Platform::Realtor => "realtor.com",
        }
    }

    /// Resolve the platform for `url`. Pure: never touches the network.
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| AppError::UnsupportedSource(format!("invalid URL '{url}': {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::UnsupportedSource(format!(
                    "URL scheme '{scheme}' is not supported"
                )));
            }
        }

        let host = parsed
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| AppError::UnsupportedSource(format!("URL '{url}' has no host")))?;

        Self::ALL
            .into_iter()
            .find(|p| {
                let domain = p.domain();
                host == domain || host.ends_with(&format!(".{domain}"))
            })
            .ok_or_else(|| AppError::UnsupportedSource(host))
    }

    /// Ordered tier chain for this platform.
    pub fn tiers(&self) -> &'static [Tier] {
        match self {
            Platform::Zillow => ZILLOW_TIERS,
            Platform::Redfin => REDFIN_TIERS,
            Platform::Realtor => REALTOR_TIERS,
        }
    }

    /// Prose-scanning extras, for platforms that render them.
    pub fn extras(&self) -> Option<&'static ExtrasProfile> {
        match self {
            Platform::Redfin => Some(&REDFIN_EXTRAS),
            Platform::Zillow | Platform::Realtor => None,
        }
    }

    /// Platforms that actively fingerprint and challenge automated clients.
    pub fn strong_anti_automation(&self) -> bool {
        matches!(self, Platform::Zillow)
    }

    /// Failure text surfaced once every tier has failed.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Platform::Zillow => {
                "Zillow blocked automated access or served a page without listing data"
            }
            Platform::Redfin => {
                "Could not find price and address on the Redfin page; the listing may be removed or the markup changed"
            }
            Platform::Realtor => {
                "Could not find price and address on the Realtor.com page; the listing may be removed or the markup changed"
            }
        }
    }

    /// Remediation hint naming the other supported platforms.
    pub fn suggestion(&self) -> Option<String> {
        if !self.strong_anti_automation() {
            return None;
        }
        let others: Vec<&str> = Self::ALL
            .iter()
            .filter(|p| *p != self)
            .map(Platform::display_name)
            .collect();
        Some(format!(
            "Try the same property on {}",
            others.join(" or ")
        ))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zillow" => Ok(Platform::Zillow),
            "redfin" => Ok(Platform::Redfin),
            "realtor" | "realtor.com" => Ok(Platform::Realtor),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tier tables
// ---------------------------------------------------------------------------

/// One step of a platform's fallback chain.
#[derive(Debug, Clone, Copy)]
pub struct Tier {
    pub name: &'static str,
    pub method: TierMethod,
}

#[derive(Debug, Clone, Copy)]
pub enum TierMethod {
    /// Plain HTTP fetch, then heuristic extraction over the markup.
    Fetch {
        strategy: &'static FetchStrategy,
        profile: &'static SelectorProfile,
    },
    /// Headless-browser render, then the same extraction over the live DOM.
    Render { profile: &'static SelectorProfile },
}

impl Tier {
    pub fn profile(&self) -> &'static SelectorProfile {
        match self.method {
            TierMethod::Fetch { profile, .. } | TierMethod::Render { profile } => profile,
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self.method, TierMethod::Render { .. })
    }
}

/// Header and pacing profile for a fetch tier.
#[derive(Debug, Clone, Copy)]
pub struct FetchStrategy {
    pub name: &'static str,
    /// Merged over the rotating header profile on every attempt.
    pub overrides: &'static [(&'static str, &'static str)],
    pub max_attempts: u32,
    /// Multiplier applied to the retry policy's jitter and backoff.
    pub pace: u32,
}

/// Ordered selector candidates for each listing field.
#[derive(Debug, Clone, Copy)]
pub struct SelectorProfile {
    pub name: &'static str,
    pub price: &'static [Probe],
    pub address: &'static [Probe],
    pub beds: &'static [Probe],
    pub baths: &'static [Probe],
    pub area: &'static [Probe],
    /// Combined "3 bd | 2 ba | 1,800 sqft" style containers.
    pub details: &'static [Probe],
    pub property_type: &'static [Probe],
}

/// Prose-level facts scanned from the full page text.
#[derive(Debug, Clone, Copy)]
pub struct ExtrasProfile {
    /// Brand prefix of the valuation estimate, as in `"<brand> Estimate $..."`.
    pub brand: &'static str,
    pub off_market_marker: &'static str,
    /// Regex an anchor `href` must match to count as a comparable listing.
    pub listing_path: &'static str,
}

const PRIMARY_FETCH: FetchStrategy = FetchStrategy {
    name: "primary",
    overrides: &[],
    max_attempts: 3,
    pace: 1,
};

const OG_TITLE: Probe = Probe::attr(r#"meta[property="og:title"]"#, "content");
const META_DESCRIPTION: Probe = Probe::attr(r#"meta[name="description"]"#, "content");
const OG_DESCRIPTION: Probe = Probe::attr(r#"meta[property="og:description"]"#, "content");

// -- Zillow ------------------------------------------------------------------

const ZILLOW_ALTERNATE_FETCH: FetchStrategy = FetchStrategy {
    name: "alternate",
    overrides: &[
        ("Referer", "https://www.zillow.com/homes/"),
        ("Sec-Fetch-Site", "same-origin"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Dest", "document"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Cache-Control", "no-cache"),
    ],
    max_attempts: 2,
    pace: 2,
};

const ZILLOW_PRIMARY: SelectorProfile = SelectorProfile {
    name: "zillow-primary",
    price: &[
        Probe::text(r#"[data-testid="price"]"#),
        Probe::text(r#"span[data-testid="price"] span"#),
        Probe::text(".summary-container .price"),
    ],
    address: &[
        Probe::text(r#"h1[class*="Address"]"#),
        Probe::text(r#"[data-testid="address"]"#),
        Probe::text(".summary-container h1"),
        OG_TITLE,
    ],
    beds: &[Probe::text(r#"[data-testid="bed-bath-item"]:nth-of-type(1) strong"#)],
    baths: &[Probe::text(r#"[data-testid="bed-bath-item"]:nth-of-type(2) strong"#)],
    area: &[Probe::text(r#"[data-testid="bed-bath-item"]:nth-of-type(3) strong"#)],
    details: &[
        Probe::text(r#"[data-testid="bed-bath-sqft-facts"]"#),
        Probe::text(r#"[data-testid="bed-bath-beyond"]"#),
        META_DESCRIPTION,
    ],
    property_type: &[
        Probe::text(r#"[data-testid="home-type"]"#),
        Probe::text(r#"[aria-label="Home type"] + span"#),
    ],
};

const ZILLOW_ALTERNATE: SelectorProfile = SelectorProfile {
    name: "zillow-alternate",
    price: &[
        Probe::text(".ds-summary-row .ds-value"),
        Probe::text(".ds-price .ds-value"),
        Probe::text(r#"[class*="PriceText"]"#),
    ],
    address: &[
        Probe::text("h1.ds-address-container"),
        Probe::text(r#"[class*="AddressWrapper"] h1"#),
        OG_TITLE,
    ],
    beds: &[Probe::text(".ds-bed-bath-living-area span:nth-of-type(1)")],
    baths: &[Probe::text(".ds-bed-bath-living-area span:nth-of-type(3)")],
    area: &[Probe::text(".ds-bed-bath-living-area span:nth-of-type(5)")],
    details: &[
        Probe::text(".ds-bed-bath-living-area-container"),
        Probe::text(r#"[class*="BedBathSqft"]"#),
        OG_DESCRIPTION,
        META_DESCRIPTION,
    ],
    property_type: &[Probe::text(".ds-home-fact-list-item:first-child .ds-body-small")],
};

const ZILLOW_RENDERED: SelectorProfile = SelectorProfile {
    name: "zillow-rendered",
    price: &[
        Probe::text(r#"[data-testid="price"]"#),
        Probe::text(".ds-summary-row .ds-value"),
        Probe::text(r#"[class*="PriceText"]"#),
    ],
    address: &[
        Probe::text(r#"h1[class*="Address"]"#),
        Probe::text("h1.ds-address-container"),
        Probe::text("h1"),
        OG_TITLE,
    ],
    beds: &[Probe::text(r#"[data-testid="bed-bath-item"]:nth-of-type(1) strong"#)],
    baths: &[Probe::text(r#"[data-testid="bed-bath-item"]:nth-of-type(2) strong"#)],
    area: &[Probe::text(r#"[data-testid="bed-bath-item"]:nth-of-type(3) strong"#)],
    details: &[
        Probe::text(r#"[data-testid="bed-bath-sqft-facts"]"#),
        Probe::text(".ds-bed-bath-living-area-container"),
        META_DESCRIPTION,
    ],
    property_type: &[Probe::text(r#"[data-testid="home-type"]"#)],
};

const ZILLOW_TIERS: &[Tier] = &[
    Tier {
        name: "http-primary",
        method: TierMethod::Fetch {
            strategy: &PRIMARY_FETCH,
            profile: &ZILLOW_PRIMARY,
        },
    },
    Tier {
        name: "http-alternate",
        method: TierMethod::Fetch {
            strategy: &ZILLOW_ALTERNATE_FETCH,
            profile: &ZILLOW_ALTERNATE,
        },
    },
    Tier {
        name: "headless",
        method: TierMethod::Render {
            profile: &ZILLOW_RENDERED,
        },
    },
];

// -- Redfin ------------------------------------------------------------------

const REDFIN_ALTERNATE_FETCH: FetchStrategy = FetchStrategy {
    name: "alternate",
    overrides: &[
        ("Referer", "https://www.redfin.com/"),
        ("Sec-Fetch-Site", "same-origin"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    max_attempts: 2,
    pace: 2,
};

const REDFIN_PRIMARY: SelectorProfile = SelectorProfile {
    name: "redfin-primary",
    price: &[
        Probe::text(r#"[data-rf-test-id="abp-price"] .statsValue"#),
        Probe::text(".price-section .price"),
        Probe::text(".statsValue.price"),
    ],
    address: &[
        Probe::text(".full-address"),
        Probe::text(r#"[data-rf-test-id="abp-streetLine"]"#),
        Probe::text(".street-address"),
        OG_TITLE,
    ],
    beds: &[Probe::text(r#"[data-rf-test-id="abp-beds"] .statsValue"#)],
    baths: &[Probe::text(r#"[data-rf-test-id="abp-baths"] .statsValue"#)],
    area: &[Probe::text(r#"[data-rf-test-id="abp-sqFt"] .statsValue"#)],
    details: &[Probe::text(".home-main-stats-variant"), META_DESCRIPTION],
    property_type: &[
        Probe::text(r#"[data-rf-test-id="propertyType"] .content"#),
        Probe::text(".keyDetails-row .valueText"),
    ],
};

const REDFIN_TIERS: &[Tier] = &[
    Tier {
        name: "http-primary",
        method: TierMethod::Fetch {
            strategy: &PRIMARY_FETCH,
            profile: &REDFIN_PRIMARY,
        },
    },
    Tier {
        name: "http-alternate",
        method: TierMethod::Fetch {
            strategy: &REDFIN_ALTERNATE_FETCH,
            profile: &REDFIN_PRIMARY,
        },
    },
];

const REDFIN_EXTRAS: ExtrasProfile = ExtrasProfile {
    brand: "Redfin",
    off_market_marker: "off market",
    listing_path: r"^(?:https?://(?:www\.)?redfin\.com)?/[A-Z]{2}/[^/]+/[^/]+/home/\d+",
};

// -- Realtor.com -------------------------------------------------------------

const REALTOR_ALTERNATE_FETCH: FetchStrategy = FetchStrategy {
    name: "alternate",
    overrides: &[
        ("Referer", "https://www.realtor.com/realestateandhomes-search/"),
        ("Sec-Fetch-Site", "same-origin"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
    max_attempts: 2,
    pace: 2,
};

const REALTOR_PRIMARY: SelectorProfile = SelectorProfile {
    name: "realtor-primary",
    price: &[
        Probe::text(r#"[data-testid="list-price"]"#),
        Probe::text(r#"[data-label="pc-price"]"#),
    ],
    address: &[
        Probe::text(r#"[data-testid="address-line-1"]"#),
        Probe::text(r#"h1[data-testid="address"]"#),
        OG_TITLE,
    ],
    beds: &[Probe::text(r#"[data-testid="property-meta-beds"] [data-testid="meta-value"]"#)],
    baths: &[Probe::text(r#"[data-testid="property-meta-baths"] [data-testid="meta-value"]"#)],
    area: &[Probe::text(r#"[data-testid="property-meta-sqft"] [data-testid="meta-value"]"#)],
    details: &[Probe::text(r#"[data-testid="property-meta"]"#), META_DESCRIPTION],
    property_type: &[Probe::text(r#"[data-testid="property-type"]"#)],
};

const REALTOR_ALTERNATE: SelectorProfile = SelectorProfile {
    name: "realtor-alternate",
    price: &[
        Probe::text(".ldp-header-price span"),
        Probe::text(r#"[class*="Price__Component"]"#),
    ],
    address: &[
        Probe::text("#ldp-address"),
        Probe::text(r#"[class*="Address__StyledAddress"]"#),
        OG_TITLE,
    ],
    beds: &[Probe::text(r#"li[data-label="property-meta-beds"] .data-value"#)],
    baths: &[Probe::text(r#"li[data-label="property-meta-bath"] .data-value"#)],
    area: &[Probe::text(r#"li[data-label="property-meta-sqft"] .data-value"#)],
    details: &[
        Probe::text("ul.property-meta"),
        OG_DESCRIPTION,
        META_DESCRIPTION,
    ],
    property_type: &[Probe::text(r#"[data-label="property-type"] .ldp-key-fact-item"#)],
};

const REALTOR_TIERS: &[Tier] = &[
    Tier {
        name: "http-primary",
        method: TierMethod::Fetch {
            strategy: &PRIMARY_FETCH,
            profile: &REALTOR_PRIMARY,
        },
    },
    Tier {
        name: "http-alternate",
        method: TierMethod::Fetch {
            strategy: &REALTOR_ALTERNATE_FETCH,
            profile: &REALTOR_ALTERNATE,
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url_matches_hosts() {
        assert_eq!(
            Platform::from_url("https://www.zillow.com/homedetails/1-Main-St/123_zpid/").unwrap(),
            Platform::Zillow
        );
        assert_eq!(
            Platform::from_url("https://www.redfin.com/TX/Austin/12-Elm-St-78701/home/456").unwrap(),
            Platform::Redfin
        );
        assert_eq!(
            Platform::from_url("http://realtor.com/realestateandhomes-detail/1-Oak_X_M1-2").unwrap(),
            Platform::Realtor
        );
        assert_eq!(
            Platform::from_url("HTTPS://WWW.REDFIN.COM/x").unwrap(),
            Platform::Redfin
        );
    }

    #[test]
    fn test_from_url_rejects_unsupported() {
        for url in [
            "https://www.example.com/listing/1",
            "https://zillow.com.evil.net/homedetails/1",
            "ftp://www.zillow.com/file",
            "not a url",
            "",
        ] {
            let err = Platform::from_url(url).unwrap_err();
            assert!(matches!(err, AppError::UnsupportedSource(_)), "{url}: {err}");
        }
    }

    #[test]
    fn test_tier_chains() {
        let names = |p: Platform| p.tiers().iter().map(|t| t.name).collect::<Vec<_>>();
        assert_eq!(names(Platform::Zillow), ["http-primary", "http-alternate", "headless"]);
        assert_eq!(names(Platform::Redfin), ["http-primary", "http-alternate"]);
        assert_eq!(names(Platform::Realtor), ["http-primary", "http-alternate"]);

        // Only the strongest anti-automation platform gets a render tier.
        for platform in Platform::ALL {
            let has_render = platform.tiers().iter().any(Tier::is_render);
            assert_eq!(has_render, platform.strong_anti_automation());
        }
    }

    #[test]
    fn test_alternate_tier_uses_distinct_headers() {
        for platform in Platform::ALL {
            let tiers = platform.tiers();
            let (TierMethod::Fetch { strategy: first, .. }, TierMethod::Fetch { strategy: second, .. }) =
                (tiers[0].method, tiers[1].method)
            else {
                panic!("first two tiers of {platform} must be fetch tiers");
            };
            assert!(first.overrides.is_empty());
            assert!(!second.overrides.is_empty());
        }
    }

    #[test]
    fn test_alternate_selector_profiles() {
        assert_ne!(Platform::Zillow.tiers()[0].profile().name, Platform::Zillow.tiers()[1].profile().name);
        assert_ne!(Platform::Realtor.tiers()[0].profile().name, Platform::Realtor.tiers()[1].profile().name);
        assert_eq!(Platform::Redfin.tiers()[0].profile().name, Platform::Redfin.tiers()[1].profile().name);
    }

    #[test]
    fn test_suggestion_only_for_strong_platforms() {
        assert_eq!(
            Platform::Zillow.suggestion().as_deref(),
            Some("Try the same property on Redfin or Realtor.com")
        );
        assert_eq!(Platform::Redfin.suggestion(), None);
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("Realtor.com".parse::<Platform>().unwrap(), Platform::Realtor);
        assert!("trulia".parse::<Platform>().is_err());
    }
}
