//! Retrying fetch with header rotation, jitter and backoff.
//!
//! Wraps a single-attempt [`Fetcher`] and only hands back bodies that pass
//! block detection. A transport error and a block page are handled the same
//! way: wait, switch fingerprint, try again.
//!
//! # Example
//!
//! ```rust,no_run
//! use hearth_core::config::RetryPolicy;
//! use hearth_core::headers::{DEFAULT_POOL, HeaderSet};
//! use hearth_core::retry::ResilientFetcher;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! # use hearth_core::traits::Fetcher;
//! # #[derive(Clone)] struct MyFetcher;
//! # impl Fetcher for MyFetcher {
//! #     async fn fetch(&self, _: &str, _: &HeaderSet) -> Result<hearth_core::models::FetchResponse, hearth_core::AppError> { todo!() }
//! # }
//! let fetcher = ResilientFetcher::new(MyFetcher, DEFAULT_POOL, RetryPolicy::default());
//! let page = fetcher.fetch("https://www.redfin.com/TX/Austin/x/home/1", &HeaderSet::new(), 3).await?;
//! println!("{} bytes after {} attempts", page.body.len(), page.attempts);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::block::block_reason;
use crate::config::RetryPolicy;
use crate::error::AppError;
use crate::headers::{HeaderProfile, HeaderSet};
use crate::models::{FetchResponse, FetchResult};
use crate::traits::Fetcher;

/// A [`Fetcher`] wrapper that retries until a usable body arrives.
///
/// The header pool and policy are fixed at construction and shared read-only
/// by every request.
#[derive(Clone)]
pub struct ResilientFetcher<F> {
    inner: F,
    pool: &'static [HeaderProfile],
    policy: RetryPolicy,
}

impl<F: Fetcher> ResilientFetcher<F> {
    pub fn new(inner: F, pool: &'static [HeaderProfile], policy: RetryPolicy) -> Self {
        Self {
            inner,
            pool,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `url` with up to `max_attempts` tries at normal pace.
    pub async fn fetch(
        &self,
        url: &str,
        overrides: &HeaderSet,
        max_attempts: u32,
    ) -> Result<FetchResult, AppError> {
        self.fetch_paced(url, overrides, max_attempts, 1).await
    }

    /// Like [`fetch`](Self::fetch), with every delay multiplied by `pace`.
    pub async fn fetch_paced(
        &self,
        url: &str,
        overrides: &HeaderSet,
        max_attempts: u32,
        pace: u32,
    ) -> Result<FetchResult, AppError> {
        let pace = pace.max(1);
        let mut last = AppError::Generic("no fetch attempts were made".to_string());

        for attempt in 0..max_attempts {
            let jitter = self.jitter_delay(attempt) * pace;
            if !jitter.is_zero() {
                tokio::time::sleep(jitter).await;
            }

            let headers = self.headers_for(attempt).merged(overrides);
            tracing::debug!(
                %url,
                attempt = attempt + 1,
                max_attempts,
                user_agent = headers.get("User-Agent").unwrap_or_default(),
                "Fetching"
            );

            let outcome = self
                .inner
                .fetch(url, &headers)
                .await
                .and_then(|response| self.accept(response));

            match outcome {
                Ok(response) => {
                    tracing::info!(
                        %url,
                        status = response.status,
                        bytes = response.body.len(),
                        attempts = attempt + 1,
                        "Fetched usable page"
                    );
                    return Ok(FetchResult {
                        body: response.body,
                        status: response.status,
                        attempts: attempt + 1,
                    });
                }
                Err(e) => {
                    tracing::warn!(%url, attempt = attempt + 1, error = %e, "Fetch attempt failed");
                    last = e;
                }
            }

            if attempt + 1 < max_attempts {
                let backoff = self.backoff_delay(attempt) * pace;
                if !backoff.is_zero() {
                    tracing::debug!(backoff_ms = %backoff.as_millis(), "Backing off");
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(AppError::FetchExhausted {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }

    /// Rotating header profile for `attempt`.
    fn headers_for(&self, attempt: u32) -> HeaderSet {
        if self.pool.is_empty() {
            return HeaderSet::new();
        }
        self.pool[attempt as usize % self.pool.len()].to_header_set()
    }

    /// Reject responses that are errors, too short, or block pages.
    fn accept(&self, response: FetchResponse) -> Result<FetchResponse, AppError> {
        if response.status >= self.policy.status_ceiling {
            return Err(AppError::HttpError(format!("HTTP {}", response.status)));
        }
        if let Some(reason) = block_reason(&response.body, response.status) {
            return Err(AppError::FetchBlocked {
                status: response.status,
                reason,
            });
        }
        if response.body.len() < self.policy.min_body_len {
            return Err(AppError::FetchBlocked {
                status: response.status,
                reason: format!(
                    "body of {} bytes is below the {} byte minimum",
                    response.body.len(),
                    self.policy.min_body_len
                ),
            });
        }
        Ok(response)
    }

    /// Random delay in a window that widens with `attempt`.
    fn jitter_delay(&self, attempt: u32) -> Duration {
        let growth = self.policy.jitter_growth * attempt;
        let floor = self.policy.jitter_floor + growth;
        let span = self.policy.jitter_span + growth;
        floor + Duration::from_millis(rand_jitter_ms(span.as_millis() as u64))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.policy.backoff_unit * (attempt + 1)
    }
}

// ---------------------------------------------------------------------------
// Jitter from a time-seeded xorshift; not crypto, just spread.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x |= 1;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
