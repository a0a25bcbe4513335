/// Smoke-test for `ChromiumRenderer`.
///
/// Renders <https://example.com> (or the URL given as the first argument)
/// in a throwaway headless Chromium and checks that the live DOM and
/// `innerText` came back, and that no browser process is left behind.
///
/// Run with:
///   cargo run -p hearth-client --example browser_smoke --features browser [URL]
use std::time::Duration;

use hearth_client::ChromiumRenderer;
use hearth_core::config::PipelineConfig;
use hearth_core::traits::Renderer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,hearth_client=debug")
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    let renderer = ChromiumRenderer::new(&PipelineConfig::from_env()?);
    println!("Rendering {url} …");
    let page = renderer.render(&url, Duration::from_secs(30)).await?;

    anyhow::ensure!(
        page.html.len() > 500,
        "HTML suspiciously short ({} bytes)",
        page.html.len()
    );
    let text = page.text.unwrap_or_default();
    anyhow::ensure!(!text.trim().is_empty(), "innerText was empty");
    anyhow::ensure!(
        ChromiumRenderer::active_sessions() == 0,
        "browser session still alive after render"
    );

    println!("OK — {} bytes of HTML, {} chars of text", page.html.len(), text.len());
    println!("First 300 chars of text:\n{}", text.chars().take(300).collect::<String>());
    Ok(())
}
