use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::headers::{DEFAULT_POOL, HeaderSet};
use crate::models::{ListingRecord, RenderedPage};
use crate::platform::{Platform, Tier, TierMethod};
use crate::render::HeadlessRenderer;
use crate::retry::ResilientFetcher;
use crate::source::SourceExtractor;
use crate::traits::{Fetcher, Renderer};

/// Orchestrates one acquisition: dispatch → tier 1 → tier 2 → … → record or error.
///
/// Generic over the HTTP and browser dependencies via traits, enabling
/// dependency injection and testability without real network or browser.
pub struct Acquirer<F, R>
where
    F: Fetcher,
    R: Renderer,
{
    fetcher: ResilientFetcher<F>,
    renderer: Option<HeadlessRenderer<R>>,
    config: PipelineConfig,
}

/// Progress through a platform's tier chain.
enum State {
    Init,
    Tier(usize),
    Done(Result<ListingRecord, AppError>),
}

/// Placeholder renderer for acquirers built without a browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl Renderer for NoRenderer {
    async fn render(&self, _url: &str, _timeout: Duration) -> Result<RenderedPage, AppError> {
        Err(AppError::RenderFailed("no renderer configured".to_string()))
    }
}

impl<F: Fetcher> Acquirer<F, NoRenderer> {
    /// Create an Acquirer that only runs HTTP tiers.
    pub fn http_only(fetcher: F, config: PipelineConfig) -> Self {
        Self::build(fetcher, None, config)
    }
}

impl<F, R> Acquirer<F, R>
where
    F: Fetcher,
    R: Renderer,
{
    /// Create an Acquirer with a headless-browser tier available.
    pub fn new(fetcher: F, renderer: R, config: PipelineConfig) -> Self {
        Self::build(fetcher, Some(renderer), config)
    }

    fn build(fetcher: F, renderer: Option<R>, config: PipelineConfig) -> Self {
        Self {
            fetcher: ResilientFetcher::new(fetcher, DEFAULT_POOL, config.retry.clone()),
            renderer: renderer.map(|r| HeadlessRenderer::new(r, config.navigation_timeout)),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for `url` under the configured deadline.
    pub async fn acquire(&self, url: &str) -> Result<ListingRecord, AppError> {
        self.acquire_with_cancel(url, CancellationToken::new()).await
    }

    /// Like [`acquire`](Self::acquire), aborting in-flight work with
    /// [`AppError::Cancelled`] once `cancel` fires.
    ///
    /// Unsupported URLs fail before any network call.
    pub async fn acquire_with_cancel(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<ListingRecord, AppError> {
        let platform = Platform::from_url(url)?;
        tracing::info!(%url, %platform, "Acquiring listing");

        let deadline = self.config.deadline;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(%url, "Acquisition cancelled");
                Err(AppError::Cancelled)
            }
            outcome = tokio::time::timeout(deadline, self.run(url, platform)) => {
                outcome.unwrap_or_else(|_| {
                    tracing::warn!(%url, deadline_secs = deadline.as_secs(), "Acquisition deadline elapsed");
                    Err(AppError::Timeout(deadline.as_secs()))
                })
            }
        }
    }

    async fn run(&self, url: &str, platform: Platform) -> Result<ListingRecord, AppError> {
        let tiers = platform.tiers();
        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<AppError> = None;
        let mut state = State::Init;

        loop {
            state = match state {
                State::Init => State::Tier(0),
                State::Tier(i) if i >= tiers.len() => {
                    State::Done(Err(self.exhausted(
                        platform,
                        std::mem::take(&mut attempted),
                        last_error.take(),
                    )))
                }
                State::Tier(i) => {
                    let tier = &tiers[i];
                    if tier.is_render() && !self.render_enabled() {
                        tracing::info!(tier = tier.name, "No browser available, skipping tier");
                        State::Tier(i + 1)
                    } else {
                        attempted.push(tier.name.to_string());
                        tracing::info!(tier = tier.name, step = i + 1, of = tiers.len(), "Trying tier");
                        match self.run_tier(url, platform, tier).await {
                            Ok(mut record) => {
                                record.tier = tier.name.to_string();
                                tracing::info!(
                                    tier = tier.name,
                                    price = record.price,
                                    address = %record.address,
                                    "Listing extracted"
                                );
                                State::Done(Ok(record))
                            }
                            Err(e) if !e.escalates() => State::Done(Err(e)),
                            Err(e) => {
                                tracing::warn!(tier = tier.name, error = %e, "Tier failed");
                                last_error = Some(e);
                                State::Tier(i + 1)
                            }
                        }
                    }
                }
                State::Done(result) => return result,
            };
        }
    }

    async fn run_tier(
        &self,
        url: &str,
        platform: Platform,
        tier: &Tier,
    ) -> Result<ListingRecord, AppError> {
        match tier.method {
            TierMethod::Fetch { strategy, profile } => {
                let overrides = HeaderSet::from_pairs(strategy.overrides);
                let attempts = self.config.max_attempts.unwrap_or(strategy.max_attempts);
                let fetched = self
                    .fetcher
                    .fetch_paced(url, &overrides, attempts, strategy.pace)
                    .await?;
                tracing::debug!(
                    strategy = strategy.name,
                    profile = profile.name,
                    attempts = fetched.attempts,
                    "Extracting from fetched markup"
                );
                SourceExtractor::new(platform, profile).extract_from_html(&fetched.body, url)
            }
            TierMethod::Render { .. } => match &self.renderer {
                Some(headless) => headless.render_and_extract(url, platform, tier).await,
                None => Err(AppError::RenderFailed("no renderer configured".to_string())),
            },
        }
    }

    fn render_enabled(&self) -> bool {
        self.renderer.is_some() && !self.config.disable_render
    }

    fn exhausted(&self, platform: Platform, tiers: Vec<String>, last: Option<AppError>) -> AppError {
        tracing::warn!(%platform, tiers = ?tiers, "All tiers failed");
        AppError::ExtractionFailed {
            platform: platform.display_name().to_string(),
            tiers,
            reason: platform.failure_reason().to_string(),
            suggestion: platform.suggestion(),
            last: last.map(Box::new),
        }
    }
}
