//! Error types for authentication and credential storage

/// Errors from the device flow, token refresh and credential file.
///
/// `NotAuthenticated` and `ChallengeExpired` are recoverable by running the
/// interactive flow again. `Auth` and `RefreshFailed` mean the authority
/// rejected us; neither is ever retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not authenticated: run `forms-watcher auth` first")]
    NotAuthenticated,

    #[error("device code expired before sign-in completed: run `forms-watcher auth` again")]
    ChallengeExpired,

    #[error("authorization failed ({code}): {description}")]
    Auth { code: String, description: String },

    #[error("token refresh failed: {0} (re-run `forms-watcher auth`)")]
    RefreshFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the operator has to go through the interactive flow again.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::NotAuthenticated
                | Error::ChallengeExpired
                | Error::Auth { .. }
                | Error::RefreshFailed(_)
        )
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_remedy() {
        assert!(
            Error::NotAuthenticated
                .to_string()
                .contains("forms-watcher auth")
        );
        assert!(
            Error::RefreshFailed("AADSTS700082: expired".into())
                .to_string()
                .contains("re-run `forms-watcher auth`")
        );
        let auth = Error::Auth {
            code: "access_denied".into(),
            description: "user declined".into(),
        };
        assert_eq!(
            auth.to_string(),
            "authorization failed (access_denied): user declined"
        );
    }

    #[test]
    fn only_authority_failures_require_reauth() {
        assert!(Error::ChallengeExpired.requires_reauth());
        assert!(Error::RefreshFailed("revoked".into()).requires_reauth());
        assert!(!Error::Http("connection reset".into()).requires_reauth());
        assert!(!Error::Io("disk full".into()).requires_reauth());
    }
}
