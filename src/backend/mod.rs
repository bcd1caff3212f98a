use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

use crate::data_models::SearchResponse;

pub mod chrome;
pub mod extract;
pub mod serpapi;
pub mod stealth;

pub use chrome::SyncBrowserBackend;
pub use serpapi::ApiBackend;
pub use stealth::AsyncBrowserBackend;

/// One concrete retrieval mechanism. Implementations must coerce whatever
/// their source returns into the uniform [`SearchResponse`] shape.
///
/// Transient scraping failures (captcha wall, results never loading, missing
/// optional elements) are not errors: they come back as empty fields.
/// Errors out of `search` mean something unexpected broke (driver crash,
/// transport failure) and there is no defined recovery.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse>;
}

/// Which backend to verify with. Selection is explicit configuration; no
/// runtime type inspection anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Hosted search API (SerpApi).
    Serpapi,
    /// Blocking headless-Chrome session per query.
    Chrome,
    /// Async stealth-enabled Chrome session per query.
    Stealth,
}

/// Builds the configured backend. Credential problems surface here, before
/// any search runs.
pub fn build(
    kind: BackendKind,
    headless: bool,
    driver_path: Option<PathBuf>,
) -> Result<Box<dyn SearchBackend>> {
    let backend: Box<dyn SearchBackend> = match kind {
        BackendKind::Serpapi => Box::new(ApiBackend::new(None)?),
        BackendKind::Chrome => Box::new(SyncBrowserBackend::new(headless, driver_path)),
        BackendKind::Stealth => Box::new(AsyncBrowserBackend::new(headless)),
    };
    Ok(backend)
}
