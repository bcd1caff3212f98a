use thiserror::Error;

/// Unrecoverable setup problems, raised at backend construction time.
///
/// Transient scraping conditions (captcha walls, missing page elements) are
/// deliberately not represented here: backends encode them as empty fields
/// in the response instead of raising.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no SerpApi key: pass one explicitly or set {0}")]
    MissingCredential(&'static str),
}
