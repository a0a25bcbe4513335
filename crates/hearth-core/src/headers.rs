//! Browser header fingerprints rotated across fetch attempts.

/// A realistic browser header fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderProfile {
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub referer: Option<&'static str>,
}

/// Default rotation pool. Attempt `i` uses entry `i % len`.
pub const DEFAULT_POOL: &[HeaderProfile] = &[
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
        referer: Some("https://www.google.com/"),
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.8",
        referer: Some("https://www.bing.com/"),
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.5",
        referer: None,
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9,es;q=0.6",
        referer: Some("https://duckduckgo.com/"),
    },
];

impl HeaderProfile {
    pub fn to_header_set(&self) -> HeaderSet {
        let mut set = HeaderSet::new();
        set.set("User-Agent", self.user_agent);
        set.set("Accept", self.accept);
        set.set("Accept-Language", self.accept_language);
        if let Some(referer) = self.referer {
            set.set("Referer", referer);
        }
        set
    }
}

/// Ordered header list with case-insensitive replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from static pairs, e.g. a platform's alternate overrides.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.set(name, value);
        }
        set
    }

    /// Insert or replace `name`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Overlay `overrides` on top of `self`.
    pub fn merged(mut self, overrides: &HeaderSet) -> Self {
        for (name, value) in &overrides.0 {
            self.set(name, value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
