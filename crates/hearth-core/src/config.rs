use std::time::Duration;

use crate::error::AppError;

/// Delay, backoff and acceptance rules for [`ResilientFetcher`](crate::retry::ResilientFetcher).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Lower edge of the first attempt's jitter window.
    pub jitter_floor: Duration,
    /// Width of the first attempt's jitter window.
    pub jitter_span: Duration,
    /// How much both edges of the window move out per attempt.
    pub jitter_growth: Duration,
    /// Backoff after failed attempt `i` is `backoff_unit * (i + 1)`.
    pub backoff_unit: Duration,
    /// Bodies shorter than this are treated as soft blocks.
    pub min_body_len: usize,
    /// Statuses at or above this fail the attempt.
    pub status_ceiling: u16,
}

impl RetryPolicy {
    /// No waiting at all; for tests and offline tools.
    pub fn immediate() -> Self {
        Self {
            jitter_floor: Duration::ZERO,
            jitter_span: Duration::ZERO,
            jitter_growth: Duration::ZERO,
            backoff_unit: Duration::ZERO,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    /// First attempt waits 400–1200 ms; backoff grows by 1.5 s per failure.
    fn default() -> Self {
        Self {
            jitter_floor: Duration::from_millis(400),
            jitter_span: Duration::from_millis(800),
            jitter_growth: Duration::from_millis(300),
            backoff_unit: Duration::from_millis(1500),
            min_body_len: 500,
            status_ceiling: 500,
        }
    }
}

/// Static, process-wide pipeline configuration. Never mutated per request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    /// Timeout of a single GET.
    pub fetch_timeout: Duration,
    pub max_redirects: usize,
    /// Hard cap on browser navigation plus settle time.
    pub navigation_timeout: Duration,
    /// Wait after navigation for deferred content.
    pub settle_delay: Duration,
    /// Overall bound on one acquisition across all tiers.
    pub deadline: Duration,
    /// Overrides every fetch tier's own attempt count when set.
    pub max_attempts: Option<u32>,
    /// Skip render tiers even when a renderer is available.
    pub disable_render: bool,
    /// Launch Chromium with `--no-sandbox`. Off unless explicitly requested.
    pub chrome_no_sandbox: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(20),
            max_redirects: 5,
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            deadline: Duration::from_secs(90),
            max_attempts: None,
            disable_render: false,
            chrome_no_sandbox: false,
        }
    }
}

impl PipelineConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// - `HEARTH_FETCH_TIMEOUT_SECS`
    /// - `HEARTH_NAVIGATION_TIMEOUT_SECS`
    /// - `HEARTH_SETTLE_MS`
    /// - `HEARTH_DEADLINE_SECS`
    /// - `HEARTH_MAX_ATTEMPTS`
    /// - `HEARTH_MAX_REDIRECTS`
    /// - `HEARTH_CHROME_NO_SANDBOX`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| -> Result<Duration, AppError> {
            Ok(positive(&lookup, key)?.map_or(default, Duration::from_secs))
        };

        Ok(Self {
            retry: defaults.retry,
            fetch_timeout: secs("HEARTH_FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            navigation_timeout: secs("HEARTH_NAVIGATION_TIMEOUT_SECS", defaults.navigation_timeout)?,
            deadline: secs("HEARTH_DEADLINE_SECS", defaults.deadline)?,
            settle_delay: match lookup("HEARTH_SETTLE_MS") {
                None => defaults.settle_delay,
                Some(raw) => Duration::from_millis(raw.trim().parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid HEARTH_SETTLE_MS '{raw}': must be a non-negative integer"
                    ))
                })?),
            },
            max_redirects: positive(&lookup, "HEARTH_MAX_REDIRECTS")?
                .map_or(defaults.max_redirects, |n| n as usize),
            max_attempts: positive(&lookup, "HEARTH_MAX_ATTEMPTS")?.map(|n| n as u32),
            disable_render: defaults.disable_render,
            chrome_no_sandbox: flag(&lookup, "HEARTH_CHROME_NO_SANDBOX")?
                .unwrap_or(defaults.chrome_no_sandbox),
        })
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let parsed: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Some(parsed))
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(Some(true)),
        "0" | "false" | "no" | "" => Ok(Some(false)),
        _ => Err(AppError::ConfigError(format!(
            "Invalid {key} '{raw}': expected true or false"
        ))),
    }
}
