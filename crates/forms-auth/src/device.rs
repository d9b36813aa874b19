//! OAuth2 device-authorization flow
//!
//! `begin` asks the authority for a device code; the operator then signs in
//! on any browser with the short user code while `await_completion` polls the
//! token endpoint. This is the only step in the tool that waits on a human.

use std::time::Duration;

use common::Secret;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::constants::{
    CLIENT_ID, DEFAULT_DEVICE_POLL_INTERVAL_SECS, DEVICE_CODE_GRANT, device_code_endpoint, scope,
    token_endpoint,
};
use crate::error::{Error, Result};
use crate::token::{GrantResponse, OAuthErrorBody, TokenSet, post_grant, unix_now};

/// Everything the operator and the poller need from a device-code request.
#[derive(Debug, Clone)]
pub struct DeviceChallenge {
    pub verification_uri: String,
    pub user_code: String,
    pub device_code: Secret<String>,
    pub interval: Duration,
    /// Seconds until the device code expires, when the authority says
    pub expires_in: Option<u64>,
    /// Ready-made instruction text from the authority
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// Result of a single token-endpoint poll that did not fail.
#[derive(Debug)]
pub enum DevicePoll {
    /// Operator has not finished signing in yet
    Pending,
    /// Tokens issued
    Authorized(TokenSet),
}

/// Device-code login against one tenant.
pub struct DeviceAuthFlow {
    client: reqwest::Client,
    login_url: String,
    tenant: String,
}

impl DeviceAuthFlow {
    pub fn new(
        client: reqwest::Client,
        login_url: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            client,
            login_url: login_url.into(),
            tenant: tenant.into(),
        }
    }

    /// Request a device code and user code from the authority.
    pub async fn begin(&self) -> Result<DeviceChallenge> {
        let scope = scope();
        let url = device_code_endpoint(&self.login_url, &self.tenant);
        let response = self
            .client
            .post(&url)
            .form(&[("client_id", CLIENT_ID), ("scope", scope.as_str())])
            .send()
            .await
            .map_err(|e| Error::Http(format!("device code request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            let error: Option<OAuthErrorBody> = serde_json::from_str(&body).ok();
            return Err(auth_error(status, error.as_ref(), &body));
        }

        let body = response
            .json::<DeviceCodeResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid device code response: {e}")))?;

        info!(
            tenant = %self.tenant,
            verification_uri = %body.verification_uri,
            "device code issued"
        );

        Ok(DeviceChallenge {
            verification_uri: body.verification_uri,
            user_code: body.user_code,
            device_code: Secret::new(body.device_code),
            interval: Duration::from_secs(
                body.interval.unwrap_or(DEFAULT_DEVICE_POLL_INTERVAL_SECS),
            ),
            expires_in: body.expires_in,
            message: body.message,
        })
    }

    /// Poll the token endpoint once for this challenge.
    ///
    /// `authorization_pending` is the only error that keeps the flow going.
    /// `expired_token` becomes `ChallengeExpired`; everything else,
    /// including `slow_down` and `access_denied`, is a fatal `Auth` error.
    pub async fn poll_once(&self, challenge: &DeviceChallenge) -> Result<DevicePoll> {
        let url = token_endpoint(&self.login_url, &self.tenant);
        let obtained_at = unix_now();
        let response = post_grant(
            &self.client,
            &url,
            &[
                ("client_id", CLIENT_ID),
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", challenge.device_code.expose()),
            ],
        )
        .await?;

        match response {
            GrantResponse::Issued(token) => {
                let tokens = TokenSet::from_response(token, &self.tenant, obtained_at, None)?;
                Ok(DevicePoll::Authorized(tokens))
            }
            GrantResponse::Rejected {
                status,
                error,
                body,
            } => {
                let code = error.as_ref().map(|e| e.error.as_str());
                match code {
                    Some("authorization_pending") => Ok(DevicePoll::Pending),
                    Some("expired_token") => Err(Error::ChallengeExpired),
                    _ => Err(auth_error(status, error.as_ref(), &body)),
                }
            }
        }
    }

    /// Poll every `challenge.interval` until the operator finishes signing in.
    pub async fn await_completion(&self, challenge: &DeviceChallenge) -> Result<TokenSet> {
        self.await_completion_with(challenge, || {}).await
    }

    /// `await_completion` that calls `on_poll` right before each poll, for
    /// progress output.
    pub async fn await_completion_with<F>(
        &self,
        challenge: &DeviceChallenge,
        mut on_poll: F,
    ) -> Result<TokenSet>
    where
        F: FnMut(),
    {
        let mut polls: u32 = 0;
        loop {
            tokio::time::sleep(challenge.interval).await;
            on_poll();
            polls += 1;

            match self.poll_once(challenge).await? {
                DevicePoll::Pending => {
                    debug!(polls, "authorization pending");
                }
                DevicePoll::Authorized(tokens) => {
                    info!(polls, tenant = %tokens.tenant, "device authorization completed");
                    return Ok(tokens);
                }
            }
        }
    }
}

/// Rejected device-flow request: the OAuth error code if the body had one,
/// else the HTTP status.
fn auth_error(status: StatusCode, error: Option<&OAuthErrorBody>, body: &str) -> Error {
    Error::Auth {
        code: error.map_or_else(|| status.as_u16().to_string(), |e| e.error.clone()),
        description: GrantResponse::rejection_reason(status, error, body),
    }
}
