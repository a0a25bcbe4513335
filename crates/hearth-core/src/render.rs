//! Headless-browser tier.
//!
//! The [`Renderer`] owns the browser; this module only bounds it in time and
//! runs the shared heuristics over the snapshot it returns.

use std::time::Duration;

use crate::error::AppError;
use crate::models::ListingRecord;
use crate::page::ParsedPage;
use crate::platform::{Platform, Tier};
use crate::source::SourceExtractor;
use crate::traits::Renderer;

#[derive(Clone)]
pub struct HeadlessRenderer<R> {
    renderer: R,
    navigation_timeout: Duration,
}

impl<R: Renderer> HeadlessRenderer<R> {
    pub fn new(renderer: R, navigation_timeout: Duration) -> Self {
        Self {
            renderer,
            navigation_timeout,
        }
    }

    /// Render `url` and extract a listing with `tier`'s selector profile.
    ///
    /// Every failure, including missing price or address, comes back as
    /// [`AppError::RenderFailed`].
    pub async fn render_and_extract(
        &self,
        url: &str,
        platform: Platform,
        tier: &Tier,
    ) -> Result<ListingRecord, AppError> {
        tracing::info!(%url, %platform, timeout_secs = self.navigation_timeout.as_secs(), "Rendering in headless browser");

        // Dropping the render future on timeout tears the browser down.
        let rendered = tokio::time::timeout(
            self.navigation_timeout,
            self.renderer.render(url, self.navigation_timeout),
        )
        .await
        .map_err(|_| {
            AppError::RenderFailed(format!(
                "navigation timed out after {}s",
                self.navigation_timeout.as_secs()
            ))
        })?
        .map_err(|e| match e {
            AppError::RenderFailed(_) => e,
            other => AppError::RenderFailed(other.to_string()),
        })?;

        tracing::info!(
            html_bytes = rendered.html.len(),
            text_bytes = rendered.text.as_ref().map_or(0, String::len),
            "Captured live DOM"
        );

        let page = ParsedPage::from_rendered(&rendered);
        SourceExtractor::for_tier(platform, tier)
            .extract_from_page(&page, url)
            .map_err(|e| AppError::RenderFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RenderedPage;
    use crate::testutil::{MockRenderer, jsonld_listing};

    fn headless_tier() -> &'static Tier {
        Platform::Zillow
            .tiers()
            .iter()
            .find(|t| t.is_render())
            .unwrap()
    }

    #[tokio::test]
    async fn extracts_from_rendered_dom() {
        let mock = MockRenderer::new(&jsonld_listing(615_000, "9 Birch Ln"));
        let headless = HeadlessRenderer::new(mock.clone(), Duration::from_secs(30));

        let record = headless
            .render_and_extract("https://www.zillow.com/homedetails/9", Platform::Zillow, headless_tier())
            .await
            .unwrap();

        assert_eq!(record.price, 615_000);
        assert!(record.address.starts_with("9 Birch Ln"));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.active(), 0);
    }

    #[tokio::test]
    async fn reads_inner_text_when_markup_is_sparse() {
        let mock = MockRenderer::with_responses(vec![Ok(RenderedPage {
            html: r#"<html><body><h1 class="AddressHeader">22 Oak Ct, Denver, CO 80203</h1>
                <span data-testid="price">$799,000</span></body></html>"#
                .to_string(),
            text: Some("22 Oak Ct, Denver, CO 80203\n$799,000\n4 bd | 3 ba | 2,450 sqft".to_string()),
        })]);
        let headless = HeadlessRenderer::new(mock, Duration::from_secs(30));

        let record = headless
            .render_and_extract("https://www.zillow.com/homedetails/22", Platform::Zillow, headless_tier())
            .await
            .unwrap();

        assert_eq!(record.price, 799_000);
        assert_eq!(record.beds, 4);
        assert_eq!(record.baths, 3.0);
        assert_eq!(record.area, 2450);
    }

    #[tokio::test]
    async fn insufficient_snapshot_is_render_failed() {
        let mock = MockRenderer::new("<html><body><h1>Loading…</h1></body></html>");
        let headless = HeadlessRenderer::new(mock.clone(), Duration::from_secs(30));

        let err = headless
            .render_and_extract("https://www.zillow.com/homedetails/1", Platform::Zillow, headless_tier())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RenderFailed(_)), "{err}");
        assert_eq!(mock.active(), 0);
    }

    #[tokio::test]
    async fn renderer_errors_are_render_failed() {
        let mock = MockRenderer::with_error(AppError::NetworkError("net::ERR_CONNECTION_RESET".into()));
        let headless = HeadlessRenderer::new(mock, Duration::from_secs(30));

        let err = headless
            .render_and_extract("https://www.zillow.com/homedetails/1", Platform::Zillow, headless_tier())
            .await
            .unwrap_err();

        match err {
            AppError::RenderFailed(msg) => assert!(msg.contains("ERR_CONNECTION_RESET")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_timeout_tears_down_session() {
        let mock = MockRenderer::new(&jsonld_listing(1, "1 Slow Rd")).with_delay(Duration::from_secs(120));
        let headless = HeadlessRenderer::new(mock.clone(), Duration::from_secs(30));

        assert_eq!(mock.active(), 0);
        let err = headless
            .render_and_extract("https://www.zillow.com/homedetails/1", Platform::Zillow, headless_tier())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RenderFailed(ref m) if m.contains("timed out")));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.active(), 0);
    }
}
