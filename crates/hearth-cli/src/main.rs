use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hearth_client::ReqwestFetcher;
use hearth_core::block::block_reason;
use hearth_core::page::ParsedPage;
use hearth_core::source::SourceExtractor;
use hearth_core::traits::{Fetcher, Renderer};
use hearth_core::{Acquirer, ListingRecord, PipelineConfig, Platform};

#[derive(Parser)]
#[command(name = "hearth", version, about = "Real-estate listing extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a listing page and extract it, escalating through tiers
    Extract {
        /// Listing URL on a supported site
        url: String,

        /// Never launch a headless browser
        #[arg(long, default_value_t = false)]
        no_browser: bool,

        /// Attempts per HTTP tier (overrides each tier's own count)
        #[arg(long, env = "HEARTH_MAX_ATTEMPTS", value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: Option<u32>,

        /// Overall deadline for the whole pipeline, in seconds
        #[arg(long, env = "HEARTH_DEADLINE_SECS", value_parser = clap::value_parser!(u64).range(1..))]
        deadline_secs: Option<u64>,

        /// Print JSON on a single line
        #[arg(long, default_value_t = false)]
        compact: bool,
    },

    /// Run the extraction heuristics on a saved HTML file (no network)
    Parse {
        /// Path to the saved page
        file: PathBuf,

        /// Site the page came from (zillow, redfin, realtor)
        #[arg(short, long)]
        platform: Platform,

        /// Use the platform's second-tier selector profile
        #[arg(long, default_value_t = false)]
        alternate: bool,

        /// Original URL of the page, used for the record and comparable filtering
        #[arg(long)]
        url: Option<String>,
    },

    /// Run block detection on a saved response body
    Check {
        /// Path to the saved body
        file: PathBuf,

        /// HTTP status the body was served with
        #[arg(long, default_value_t = 200)]
        status: u16,
    },

    /// List supported sites and their tier chains
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays pipeable JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hearth=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            url,
            no_browser,
            max_attempts,
            deadline_secs,
            compact,
        } => {
            let mut config = PipelineConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
            if max_attempts.is_some() {
                config.max_attempts = max_attempts;
            }
            if let Some(secs) = deadline_secs {
                config.deadline = Duration::from_secs(secs);
            }
            config.disable_render = no_browser;
            cmd_extract(&url, config, compact).await?;
        }
        Commands::Parse {
            file,
            platform,
            alternate,
            url,
        } => {
            let record = parse_file(&file, platform, alternate, url.as_deref().unwrap_or_default())?;
            if record.is_insufficient() {
                tracing::warn!(
                    price = record.price,
                    address = %record.address,
                    "Page is missing price or address"
                );
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Check { file, status } => {
            let verdict = check_file(&file, status)?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Commands::Sources => {
            print!("{}", sources_table());
        }
    }

    Ok(())
}

async fn cmd_extract(url: &str, config: PipelineConfig, compact: bool) -> Result<()> {
    let fetcher = ReqwestFetcher::from_config(&config).context("Failed to create HTTP client")?;

    #[cfg(feature = "browser")]
    let record = if config.disable_render {
        run_acquirer(Acquirer::http_only(fetcher, config), url).await?
    } else {
        let renderer = hearth_client::ChromiumRenderer::new(&config);
        run_acquirer(Acquirer::new(fetcher, renderer, config), url).await?
    };

    #[cfg(not(feature = "browser"))]
    let record = {
        if !config.disable_render {
            tracing::debug!("Built without the browser feature; headless tiers are skipped");
        }
        run_acquirer(Acquirer::http_only(fetcher, config), url).await?
    };

    let json = if compact {
        serde_json::to_string(&record)?
    } else {
        serde_json::to_string_pretty(&record)?
    };
    println!("{json}");
    Ok(())
}

/// Run one acquisition, cancelling it on Ctrl-C.
async fn run_acquirer<F: Fetcher, R: Renderer>(
    acquirer: Acquirer<F, R>,
    url: &str,
) -> Result<ListingRecord> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    acquirer
        .acquire_with_cancel(url, cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

fn parse_file(path: &Path, platform: Platform, alternate: bool, url: &str) -> Result<ListingRecord> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read HTML file: {}", path.display()))?;

    let extractor = if alternate {
        let tier = platform
            .tiers()
            .get(1)
            .with_context(|| format!("{platform} has no second tier"))?;
        SourceExtractor::for_tier(platform, tier)
    } else {
        SourceExtractor::primary(platform)
    };
    tracing::info!(%platform, profile = extractor.profile().name, bytes = html.len(), "Parsing saved page");

    let page = ParsedPage::parse(&html);
    Ok(extractor.assemble(&page, url))
}

fn check_file(path: &Path, status: u16) -> Result<serde_json::Value> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read body file: {}", path.display()))?;
    let reason = block_reason(&body, status);
    Ok(serde_json::json!({
        "blocked": reason.is_some(),
        "reason": reason,
        "status": status,
        "bytes": body.len(),
    }))
}

fn sources_table() -> String {
    let mut out = String::new();
    for platform in Platform::ALL {
        let tiers: Vec<&str> = platform.tiers().iter().map(|t| t.name).collect();
        out.push_str(&format!(
            "{:<8} {:<12} {}\n",
            platform.as_str(),
            platform.display_name(),
            tiers.join(" -> ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;

    use super::*;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_flags() {
        let cli = Cli::try_parse_from([
            "hearth",
            "extract",
            "https://www.redfin.com/TX/Austin/x/home/1",
            "--no-browser",
            "--max-attempts",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Extract {
                no_browser,
                max_attempts,
                compact,
                ..
            } => {
                assert!(no_browser);
                assert_eq!(max_attempts, Some(2));
                assert!(!compact);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_extract_rejects_zero_counts() {
        let url = "https://www.redfin.com/TX/Austin/x/home/1";
        for flag in ["--max-attempts", "--deadline-secs"] {
            let result = Cli::try_parse_from(["hearth", "extract", url, flag, "0"]);
            assert!(result.is_err(), "{flag} 0 was accepted");
        }
        assert!(Cli::try_parse_from(["hearth", "extract", url, "--max-attempts", "1"]).is_ok());
    }

    #[test]
    fn test_parse_rejects_unknown_platform() {
        let result = Cli::try_parse_from(["hearth", "parse", "page.html", "--platform", "trulia"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_file_reads_saved_page() {
        let file = write_temp(
            r#"<html><head><meta property="og:title" content="12 Elm St, Austin, TX 78701 | Redfin"></head>
            <body><div data-rf-test-id="abp-price"><div class="statsValue">$450,000</div></div>
            <div class="home-main-stats-variant">3 Beds 2 Baths 1,600 Sq. Ft.</div></body></html>"#,
        );

        let record = parse_file(
            file.path(),
            Platform::Redfin,
            false,
            "https://www.redfin.com/TX/Austin/12-Elm-St-78701/home/1",
        )
        .unwrap();

        assert_eq!(record.price, 450_000);
        assert_eq!(record.address, "12 Elm St, Austin, TX 78701");
        assert_eq!(record.beds, 3);
        assert_eq!(record.area, 1600);
        assert!(!record.is_insufficient());
    }

    #[test]
    fn test_parse_file_missing_is_error() {
        let err = parse_file(Path::new("/nonexistent/page.html"), Platform::Zillow, false, "").unwrap_err();
        assert!(err.to_string().contains("Failed to read HTML file"));
    }

    #[test]
    fn test_check_file_reports_reason() {
        let file = write_temp("<html><body>Please complete the CAPTCHA to continue</body></html>");
        let verdict = check_file(file.path(), 200).unwrap();
        assert_eq!(verdict["blocked"], true);
        assert_eq!(verdict["reason"], "matched \"captcha\"");

        let verdict = check_file(file.path(), 403).unwrap();
        assert_eq!(verdict["reason"], "status 403");
    }

    #[test]
    fn test_sources_table_lists_every_platform() {
        let table = sources_table();
        assert_eq!(table.lines().count(), 3);
        assert!(table.contains("http-primary -> http-alternate -> headless"));
        assert!(table.contains("Realtor.com"));
    }
}
