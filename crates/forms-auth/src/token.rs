//! Token sets and the token endpoint
//!
//! Both grants this crate uses (device code and refresh token) POST a form to
//! the tenant's token endpoint and get back either a token response or an
//! OAuth error body. `post_grant` does the request and splits those two
//! cases; callers decide what a rejection means for them.

use common::Secret;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CLIENT_ID, SAFETY_MARGIN_SECS, scope, token_endpoint};
use crate::error::{Error, Result};

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A complete set of credentials as issued by the authority.
///
/// Always replaced as a whole: a refresh builds a new `TokenSet` rather than
/// patching fields of the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    /// Lifetime of the access token in seconds, relative to `obtained_at`
    pub expires_in: u64,
    /// Unix seconds at which the authority issued this set
    pub obtained_at: u64,
    /// Tenant that issued the tokens; refreshes go back to it
    pub tenant: String,
}

impl TokenSet {
    /// Build a token set from a token endpoint response.
    ///
    /// Refresh responses may omit `refresh_token`, in which case
    /// `previous_refresh` is carried over. A device-grant response without one
    /// is an error since nothing could renew the session later.
    pub fn from_response(
        response: TokenResponse,
        tenant: &str,
        obtained_at: u64,
        previous_refresh: Option<&Secret<String>>,
    ) -> Result<Self> {
        let refresh_token = match (response.refresh_token, previous_refresh) {
            (Some(token), _) => Secret::new(token),
            (None, Some(previous)) => previous.clone(),
            (None, None) => {
                return Err(Error::TokenExchange(
                    "token response has no refresh_token (offline_access not granted?)".into(),
                ));
            }
        };

        Ok(Self {
            access_token: Secret::new(response.access_token),
            refresh_token,
            expires_in: response.expires_in,
            obtained_at,
            tenant: tenant.to_owned(),
        })
    }

    /// Unix second at which the access token actually expires.
    pub fn expires_at(&self) -> u64 {
        self.obtained_at.saturating_add(self.expires_in)
    }

    /// `now < obtained_at + expires_in - SAFETY_MARGIN`, without underflow.
    pub fn is_fresh_at(&self, now: u64) -> bool {
        now.saturating_add(SAFETY_MARGIN_SECS) < self.expires_at()
    }
}

/// Successful token endpoint response (device or refresh grant).
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

/// OAuth error body returned with a non-success status.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Outcome of one POST to the token endpoint.
#[derive(Debug)]
pub(crate) enum GrantResponse {
    Issued(TokenResponse),
    Rejected {
        status: StatusCode,
        error: Option<OAuthErrorBody>,
        body: String,
    },
}

impl GrantResponse {
    /// Human-readable reason for a rejection: the authority's description,
    /// then its error code, then the raw body.
    pub(crate) fn rejection_reason(
        status: StatusCode,
        error: Option<&OAuthErrorBody>,
        body: &str,
    ) -> String {
        match error {
            Some(OAuthErrorBody {
                error_description: Some(description),
                ..
            }) => description.clone(),
            Some(err) => err.error.clone(),
            None if body.trim().is_empty() => format!("token endpoint returned {status}"),
            None => format!("token endpoint returned {status}: {}", body.trim()),
        }
    }
}

/// POST a grant to the token endpoint and split success from rejection.
pub(crate) async fn post_grant(
    client: &reqwest::Client,
    url: &str,
    form: &[(&str, &str)],
) -> Result<GrantResponse> {
    let response = client
        .post(url)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token endpoint request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading token endpoint response: {e}")))?;

    if status.is_success() {
        let token = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;
        return Ok(GrantResponse::Issued(token));
    }

    debug!(%status, "token endpoint rejected grant");
    Ok(GrantResponse::Rejected {
        status,
        error: serde_json::from_str(&body).ok(),
        body,
    })
}

/// Exchange `tokens.refresh_token` for a new token set.
///
/// Any rejection from the authority is `RefreshFailed`: a refresh token that
/// was refused once will be refused again, so the caller must not retry.
pub(crate) async fn exchange_refresh_token(
    client: &reqwest::Client,
    login_url: &str,
    tokens: &TokenSet,
    now: u64,
) -> Result<TokenSet> {
    let scope = scope();
    let url = token_endpoint(login_url, &tokens.tenant);
    let response = post_grant(
        client,
        &url,
        &[
            ("client_id", CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("refresh_token", tokens.refresh_token.expose()),
            ("scope", &scope),
        ],
    )
    .await?;

    match response {
        GrantResponse::Issued(token) => {
            TokenSet::from_response(token, &tokens.tenant, now, Some(&tokens.refresh_token))
        }
        GrantResponse::Rejected {
            status,
            error,
            body,
        } => {
            let reason = GrantResponse::rejection_reason(status, error.as_ref(), &body);
            Err(Error::RefreshFailed(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_set(obtained_at: u64, expires_in: u64) -> TokenSet {
        TokenSet {
            access_token: Secret::from("at_old"),
            refresh_token: Secret::from("rt_old"),
            expires_in,
            obtained_at,
            tenant: "common".into(),
        }
    }

    #[test]
    fn fresh_until_safety_margin() {
        let tokens = token_set(1_000, 3_600);
        // expires at 4600; usable while now < 4300
        assert!(tokens.is_fresh_at(1_000));
        assert!(tokens.is_fresh_at(4_299));
        assert!(!tokens.is_fresh_at(4_300));
        assert!(!tokens.is_fresh_at(10_000));
    }

    #[test]
    fn short_lived_token_fresh_only_before_issue_minus_margin() {
        // Lifetime shorter than the margin: usable while now < 1120 - 300
        let tokens = token_set(1_000, 120);
        assert!(tokens.is_fresh_at(0));
        assert!(tokens.is_fresh_at(819));
        assert!(!tokens.is_fresh_at(820));
        assert!(!tokens.is_fresh_at(1_000));
    }

    #[test]
    fn margin_longer_than_lifetime_is_stale_once_issued() {
        let tokens = token_set(1_000, 120);
        for now in [1_000, 1_060, 1_120, 5_000] {
            assert!(!tokens.is_fresh_at(now), "fresh at {now}");
        }

        // No underflow at the bottom of the range either
        let tokens = token_set(0, 0);
        assert!(!tokens.is_fresh_at(0));
        assert!(!tokens.is_fresh_at(u64::MAX));
    }

    #[test]
    fn token_set_file_layout() {
        let json = serde_json::to_value(token_set(1_700_000_000, 3_599)).unwrap();
        assert_eq!(json["access_token"], "at_old");
        assert_eq!(json["refresh_token"], "rt_old");
        assert_eq!(json["expires_in"], 3_599);
        assert_eq!(json["obtained_at"], 1_700_000_000u64);
        assert_eq!(json["tenant"], "common");
    }

    #[test]
    fn from_response_keeps_previous_refresh_token() {
        let previous = Secret::from("rt_keep");
        let response = TokenResponse {
            access_token: "at_new".into(),
            refresh_token: None,
            expires_in: 3_600,
        };
        let tokens = TokenSet::from_response(response, "contoso", 42, Some(&previous)).unwrap();
        assert_eq!(tokens.refresh_token.expose(), "rt_keep");
        assert_eq!(tokens.obtained_at, 42);
        assert_eq!(tokens.tenant, "contoso");
    }

    #[test]
    fn from_response_requires_refresh_token_initially() {
        let response = TokenResponse {
            access_token: "at_new".into(),
            refresh_token: None,
            expires_in: 3_600,
        };
        let err = TokenSet::from_response(response, "common", 0, None).unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)));
    }

    #[tokio::test]
    async fn refresh_sends_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "access_token": "at_new",
                "refresh_token": "rt_new",
                "expires_in": 4_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let fresh = exchange_refresh_token(&client, &server.uri(), &token_set(0, 3_600), 5_000)
            .await
            .unwrap();
        assert_eq!(fresh.access_token.expose(), "at_new");
        assert_eq!(fresh.refresh_token.expose(), "rt_new");
        assert_eq!(fresh.obtained_at, 5_000);
        assert_eq!(fresh.expires_in, 4_000);
    }

    #[tokio::test]
    async fn rejected_refresh_uses_error_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/common/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "AADSTS700082: The refresh token has expired."
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = exchange_refresh_token(&client, &server.uri(), &token_set(0, 3_600), 5_000)
            .await
            .unwrap_err();
        match err {
            Error::RefreshFailed(reason) => assert!(reason.starts_with("AADSTS700082")),
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_refresh_with_plain_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = exchange_refresh_token(&client, &server.uri(), &token_set(0, 3_600), 5_000)
            .await
            .unwrap_err();
        match err {
            Error::RefreshFailed(reason) => assert!(reason.contains("upstream unavailable")),
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
    }
}
