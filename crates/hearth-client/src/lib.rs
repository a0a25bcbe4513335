pub mod fetcher;
#[cfg(feature = "browser")]
pub mod renderer;

pub use fetcher::ReqwestFetcher;
#[cfg(feature = "browser")]
pub use renderer::ChromiumRenderer;
