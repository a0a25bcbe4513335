//! Block and challenge page detection.
//!
//! A heuristic: a soft block that slips through here still surfaces later as
//! a record with no price or address.

/// Phrases that only appear on block, rate-limit or challenge pages.
pub const BLOCK_PHRASES: &[&str] = &[
    "captcha",
    "robot check",
    "verify you are a human",
    "access denied",
    "temporarily unavailable",
    "request blocked",
    // Reverse-proxy challenge markers.
    "cf-browser-verification",
    "challenge-platform",
    "px-captcha",
];

/// Statuses that always mean the origin refused us.
const BLOCK_STATUSES: &[u16] = &[403, 429];

/// Classify a fetched body as blocked/challenged.
pub fn is_blocked(body: &str, status: u16) -> bool {
    block_reason(body, status).is_some()
}

/// Same rules as [`is_blocked`], returning which rule matched.
pub fn block_reason(body: &str, status: u16) -> Option<String> {
    if BLOCK_STATUSES.contains(&status) {
        return Some(format!("status {status}"));
    }
    if body.trim().is_empty() {
        return Some("empty body".to_string());
    }
    let lower = body.to_lowercase();
    BLOCK_PHRASES
        .iter()
        .find(|phrase| lower.contains(*phrase))
        .map(|phrase| format!("matched {phrase:?}"))
}
