use thiserror::Error;

/// Application-wide error types for hearth.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (building the client or reading a response).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error (DNS, reset, refused).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A single fetch attempt hit its I/O timeout.
    #[error("Fetch timed out after {0} seconds")]
    FetchTimeout(u64),

    /// The origin answered with a block or challenge page.
    #[error("Request blocked (HTTP {status}): {reason}")]
    FetchBlocked { status: u16, reason: String },

    /// Every fetch attempt failed; carries the last attempt's failure.
    #[error("Fetch failed after {attempts} attempts: {last}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        last: Box<AppError>,
    },

    /// Extraction ran but price or address could not be found.
    #[error("{platform}: insufficient listing data (price {price}, address {address:?})")]
    InsufficientData {
        platform: String,
        price: u64,
        address: String,
    },

    /// The headless-browser tier could not produce a usable record.
    #[error("Render failed: {0}")]
    RenderFailed(String),

    /// No supported platform matched the URL. No network call was made.
    #[error("Unsupported source: {0}. Supported sources are Zillow, Redfin and Realtor.com")]
    UnsupportedSource(String),

    /// Every tier of a platform's chain failed. `last` is the final tier's
    /// own failure.
    #[error(
        "{platform}: extraction failed after {} tiers ({}): {reason}{}{}",
        .tiers.len(),
        .tiers.join(", "),
        .last.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default(),
        .suggestion.as_deref().map(|s| format!(". {s}")).unwrap_or_default()
    )]
    ExtractionFailed {
        platform: String,
        tiers: Vec<String>,
        reason: String,
        suggestion: Option<String>,
        #[source]
        last: Option<Box<AppError>>,
    },

    /// The overall pipeline deadline elapsed.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The caller abandoned the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying with a new
    /// header profile.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::FetchTimeout(_)
            | AppError::FetchBlocked { .. } => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if a tier failing with this error should hand over to the
    /// next tier instead of ending the pipeline.
    pub fn escalates(&self) -> bool {
        !matches!(
            self,
            AppError::UnsupportedSource(_)
                | AppError::Timeout(_)
                | AppError::Cancelled
                | AppError::ConfigError(_)
        )
    }
}
