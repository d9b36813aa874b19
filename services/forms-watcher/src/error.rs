//! Service-specific error types

use thiserror::Error;

/// Errors from turning a share URL into a watched form.
///
/// Auth, registry and config failures keep their own crate's error types and
/// reach `main` through `anyhow`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not resolve form URL {0}: no form id after following redirects")]
    Resolve(String),

    #[error("invalid form URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetching form URL failed: {0}")]
    Http(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
