//! Silent token refresh
//!
//! `TokenRefresher` is the only place a refresh token is spent. It checks the
//! safety window first, so callers can invoke it on every tick without
//! hitting the authority until the access token is actually near expiry.

use std::sync::Arc;

use tracing::{info, warn};

use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::token::{TokenSet, exchange_refresh_token, unix_now};

/// Keeps a token set usable, persisting every new set it obtains.
pub struct TokenRefresher {
    client: reqwest::Client,
    login_url: String,
    store: Arc<CredentialStore>,
}

impl TokenRefresher {
    pub fn new(
        client: reqwest::Client,
        login_url: impl Into<String>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            client,
            login_url: login_url.into(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Return `tokens` unchanged if still fresh, otherwise refresh and persist.
    pub async fn ensure_fresh(&self, tokens: TokenSet) -> Result<TokenSet> {
        self.ensure_fresh_at(tokens, unix_now()).await
    }

    /// `ensure_fresh` with an explicit clock.
    ///
    /// The new set is saved before it is returned, so a crash right after a
    /// refresh never leaves the file holding a refresh token the authority
    /// has already rotated out.
    pub async fn ensure_fresh_at(&self, tokens: TokenSet, now: u64) -> Result<TokenSet> {
        if tokens.is_fresh_at(now) {
            return Ok(tokens);
        }

        info!(
            tenant = %tokens.tenant,
            expires_at = tokens.expires_at(),
            "access token near expiry, refreshing"
        );

        let exchanged = exchange_refresh_token(&self.client, &self.login_url, &tokens, now).await;
        let fresh = match exchanged {
            Ok(fresh) => fresh,
            Err(Error::RefreshFailed(reason)) => {
                warn!(error = %reason, "refresh token rejected");
                return Err(Error::RefreshFailed(reason));
            }
            Err(e) => return Err(e),
        };

        self.store.save(&fresh).await?;
        info!(expires_at = fresh.expires_at(), "token refresh succeeded");
        Ok(fresh)
    }
}
