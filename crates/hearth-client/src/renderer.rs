use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use hearth_core::config::PipelineConfig;
use hearth_core::error::AppError;
use hearth_core::headers::{DEFAULT_POOL, HeaderProfile};
use hearth_core::models::RenderedPage;
use hearth_core::traits::Renderer;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Browser processes launched by this module and not yet torn down.
static ACTIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";
const INNER_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Poll interval while waiting for the page's network activity to settle.
const QUIET_POLL: Duration = Duration::from_millis(500);
/// Give up waiting for quiet after this many polls.
const QUIET_MAX_POLLS: u32 = 20;
/// Grace period for a polite browser shutdown before the process is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Headless-Chromium renderer driven over the Chrome DevTools Protocol.
///
/// Every [`Renderer::render`] call launches its own browser with a private,
/// temporary profile directory and tears it down before returning. If the
/// render future is dropped midway (deadline, cancellation) the session
/// guard kills the process instead.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use hearth_client::ChromiumRenderer;
/// use hearth_core::config::PipelineConfig;
/// use hearth_core::traits::Renderer;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = ChromiumRenderer::new(&PipelineConfig::default());
/// let page = renderer.render("https://example.com", Duration::from_secs(30)).await?;
/// println!("{}", &page.html[..200]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChromiumRenderer {
    profile: HeaderProfile,
    viewport: (u32, u32),
    settle_delay: Duration,
    sandbox: bool,
}

impl ChromiumRenderer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            profile: DEFAULT_POOL[0],
            viewport: (1366, 900),
            settle_delay: config.settle_delay,
            sandbox: !config.chrome_no_sandbox,
        }
    }

    /// Use a different browser fingerprint.
    pub fn with_profile(mut self, profile: HeaderProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Whether launched browsers keep Chromium's sandbox. Only
    /// `HEARTH_CHROME_NO_SANDBOX` turns it off.
    pub fn is_sandboxed(&self) -> bool {
        self.sandbox
    }

    /// Browser sessions currently alive in this process.
    pub fn active_sessions() -> usize {
        ACTIVE_SESSIONS.load(Ordering::SeqCst)
    }

    fn launch_config(&self, profile_dir: &TempDir) -> Result<BrowserConfig, AppError> {
        let (width, height) = self.viewport;
        let mut builder = BrowserConfig::builder()
            .disable_default_args()
            .user_data_dir(profile_dir.path())
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            });

        if !self.sandbox {
            tracing::warn!("Launching Chromium without its sandbox");
            builder = builder.no_sandbox();
        }

        if let Some(bin) = find_chrome_binary() {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg(format!("--lang={}", primary_language(self.profile.accept_language)))
            .build()
            .map_err(|e| AppError::RenderFailed(format!("Browser config error: {e}")))
    }

    /// Drive one tab: fingerprint, navigate, wait, snapshot.
    async fn capture(&self, browser: &Browser, url: &str) -> Result<RenderedPage, AppError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::RenderFailed(format!("Failed to open tab: {e}")))?;

        let mut user_agent = SetUserAgentOverrideParams::new(self.profile.user_agent);
        user_agent.accept_language = Some(self.profile.accept_language.to_string());
        page.set_user_agent(user_agent)
            .await
            .map_err(|e| AppError::RenderFailed(format!("Failed to set user agent: {e}")))?;

        let mut extra = serde_json::Map::new();
        extra.insert("Accept".into(), self.profile.accept.into());
        extra.insert("Accept-Language".into(), self.profile.accept_language.into());
        if let Some(referer) = self.profile.referer {
            extra.insert("Referer".into(), referer.into());
        }
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::Value::Object(extra),
        )))
        .await
        .map_err(|e| AppError::RenderFailed(format!("Failed to set headers: {e}")))?;

        page.goto(url)
            .await
            .map_err(|e| AppError::RenderFailed(format!("Failed to navigate to {url}: {e}")))?;

        wait_for_network_quiet(&page).await;
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| AppError::RenderFailed(format!("Failed to read page content: {e}")))?;
        let text = match page.evaluate(INNER_TEXT_JS).await {
            Ok(result) => result.into_value::<String>().ok(),
            Err(e) => {
                tracing::debug!(error = %e, "innerText unavailable");
                None
            }
        };

        let _ = page.close().await;
        Ok(RenderedPage { html, text })
    }
}

impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &str, timeout: Duration) -> Result<RenderedPage, AppError> {
        let profile_dir = tempfile::Builder::new()
            .prefix("hearth-chrome-")
            .tempdir()
            .map_err(|e| AppError::RenderFailed(format!("Failed to create profile dir: {e}")))?;
        let config = self.launch_config(&profile_dir)?;
        let session = BrowserSession::launch(config, profile_dir).await?;

        let outcome = tokio::time::timeout(timeout, self.capture(session.browser(), url)).await;
        session.shutdown().await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(AppError::RenderFailed(format!(
                "navigation timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Session guard
// ---------------------------------------------------------------------------

/// One browser process plus its CDP handler task and profile directory.
///
/// `shutdown` closes the browser politely; dropping the session without it
/// aborts the handler and drops the [`Browser`], whose child process is
/// killed on drop.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    closed: bool,
    _profile_dir: TempDir,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig, profile_dir: TempDir) -> Result<Self, AppError> {
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::RenderFailed(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let active = ACTIVE_SESSIONS.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(active, "Browser launched");
        Ok(Self {
            browser,
            handler,
            closed: false,
            _profile_dir: profile_dir,
        })
    }

    fn browser(&self) -> &Browser {
        &self.browser
    }

    async fn shutdown(mut self) {
        let browser = &mut self.browser;
        match tokio::time::timeout(SHUTDOWN_GRACE, browser.close()).await {
            Ok(Ok(_)) => {
                if tokio::time::timeout(SHUTDOWN_GRACE, browser.wait()).await.is_err() {
                    tracing::warn!("Browser did not exit after close, killing");
                    kill(browser).await;
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Browser close failed, killing");
                kill(browser).await;
            }
            Err(_) => {
                tracing::warn!("Browser close timed out, killing");
                kill(browser).await;
            }
        }
        self.closed = true;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        if !self.closed {
            tracing::debug!("Browser session dropped without shutdown, process killed");
        }
        let active = ACTIVE_SESSIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(active, "Browser session closed");
    }
}

async fn kill(browser: &mut Browser) {
    if let Some(Err(e)) = browser.kill().await {
        tracing::warn!(error = %e, "Failed to kill browser process");
    }
}

/// Wait until the page stops loading new resources, or give up after
/// [`QUIET_MAX_POLLS`] polls.
async fn wait_for_network_quiet(page: &Page) {
    let mut last: Option<u64> = None;
    for _ in 0..QUIET_MAX_POLLS {
        tokio::time::sleep(QUIET_POLL).await;
        let count = match page.evaluate(RESOURCE_COUNT_JS).await {
            Ok(result) => result.into_value::<u64>().ok(),
            Err(_) => None,
        };
        match (last, count) {
            (Some(prev), Some(now)) if prev == now => return,
            (_, now) => last = now,
        }
    }
    tracing::debug!("Network never went quiet, continuing");
}

/// `"en-US,en;q=0.9"` → `"en-US"`.
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en-US")
}

/// Locate a Chrome/Chromium binary, honouring `CHROME_BIN` first.
///
/// The snap wrapper at `/snap/bin/chromium` drops unknown flags and breaks
/// headless mode, so the real binary inside the snap is preferred. `None`
/// lets `chromiumoxide` do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("CHROME_BIN={p} does not exist, searching defaults");
    }

    const CANDIDATES: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];
    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}
