use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::headers::HeaderSet;
use crate::models::{FetchResponse, RenderedPage};

/// Performs a single HTTP GET.
///
/// Implementations return every HTTP response as `Ok`, whatever its
/// status, leaving block detection and retries to
/// [`ResilientFetcher`](crate::retry::ResilientFetcher).
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        url: &str,
        headers: &HeaderSet,
    ) -> impl Future<Output = Result<FetchResponse, AppError>> + Send;
}

/// Renders a page in an isolated browser and snapshots the live DOM.
///
/// Implementations own the whole browser lifecycle for the call: the
/// browser must be gone when the returned future completes or is dropped.
pub trait Renderer: Send + Sync + Clone {
    fn render(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<RenderedPage, AppError>> + Send;
}
