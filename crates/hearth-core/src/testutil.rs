//! Test utilities: mock implementations of the I/O traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::headers::HeaderSet;
use crate::models::{FetchResponse, RenderedPage};
use crate::traits::{Fetcher, Renderer};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that pops queued responses and records every request.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a 200 with an empty body (a soft block).
    responses: Arc<Mutex<Vec<Result<FetchResponse, AppError>>>>,
    calls: Arc<Mutex<Vec<(String, HeaderSet)>>>,
}

impl MockFetcher {
    pub fn with_responses(responses: Vec<Result<FetchResponse, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `(url, headers)` pair seen so far, in call order.
    pub fn calls(&self) -> Vec<(String, HeaderSet)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, headers: &HeaderSet) -> Result<FetchResponse, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(FetchResponse {
                status: 200,
                body: String::new(),
            })
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

/// Mock renderer with a simulated browser session per call.
///
/// `active()` counts sessions that were opened and not yet torn down, so a
/// test can check nothing outlives a timed-out or dropped render.
#[derive(Clone)]
pub struct MockRenderer {
    responses: Arc<Mutex<Vec<Result<RenderedPage, AppError>>>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl MockRenderer {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(RenderedPage {
            html: html.to_string(),
            text: None,
        })])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<RenderedPage, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate a slow navigation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sessions currently open.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the active-session count when dropped.
struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Renderer for MockRenderer {
    async fn render(&self, _url: &str, _timeout: Duration) -> Result<RenderedPage, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        let _session = SessionGuard(self.active.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        next.unwrap_or_else(|| Ok(RenderedPage::default()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Markup filler that keeps fixture pages above the minimum body length.
const FILLER: &str = "<p>Neighborhood information, school ratings and commute times \
    are provided for reference only and may not reflect current conditions.</p>";

/// A page over the minimum body length containing `marker` and nothing
/// listing-shaped.
pub fn listing_body(marker: &str) -> String {
    format!(
        "<html><head><title>Listing</title></head><body><div id=\"marker\">{marker}</div>{}</body></html>",
        FILLER.repeat(5)
    )
}

/// A page whose only listing data is a schema.org JSON-LD block.
pub fn jsonld_listing(price: u64, street: &str) -> String {
    format!(
        r#"<html><head><title>{street}</title>
<script type="application/ld+json">
{{"@context":"https://schema.org","@type":"SingleFamilyResidence",
 "address":{{"@type":"PostalAddress","streetAddress":"{street}","addressLocality":"Austin","addressRegion":"TX","postalCode":"78701"}},
 "numberOfRooms":3,"floorSize":{{"@type":"QuantitativeValue","value":1600}},
 "offers":{{"@type":"Offer","price":{price},"priceCurrency":"USD"}}}}
</script></head><body>{}</body></html>"#,
        FILLER.repeat(5)
    )
}

pub fn ok_page(body: String) -> Result<FetchResponse, AppError> {
    Ok(FetchResponse { status: 200, body })
}
