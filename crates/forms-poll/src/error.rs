//! Error types for the watch loop and the registry file

/// Errors from polling and registry persistence.
///
/// Probe failures are not errors: they are `Outcome::Transient` and keep the
/// form pending. Only credential failures abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] forms_auth::Error),

    #[error("forms registry error: {0}")]
    Registry(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for poll operations.
pub type Result<T> = std::result::Result<T, Error>;
