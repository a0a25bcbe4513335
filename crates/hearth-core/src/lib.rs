pub mod acquire;
pub mod block;
pub mod config;
pub mod error;
pub mod headers;
pub mod models;
pub mod page;
pub mod parse;
pub mod platform;
pub mod render;
pub mod retry;
pub mod source;
pub mod structured;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use acquire::{Acquirer, NoRenderer};
pub use config::{PipelineConfig, RetryPolicy};
pub use error::AppError;
pub use models::{ComparableListing, ListingRecord, MarketStatus};
pub use platform::Platform;
pub use traits::{Fetcher, Renderer};
