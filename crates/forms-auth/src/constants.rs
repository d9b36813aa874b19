//! Microsoft identity platform and Forms API constants
//!
//! The client ID is the public Microsoft Office client, which works across
//! all Microsoft 365 tenants and needs no client secret. Base URLs are the
//! production defaults; configuration can override them.

/// Microsoft Office public client ID
pub const CLIENT_ID: &str = "d3590ed6-52b3-4102-aeff-aad2292ab01c";

/// Application ID of the Forms API resource the token is issued for
pub const FORMS_APP_ID: &str = "c9a559d2-7aab-4f13-a6ed-e7e9c52aec87";

/// Azure AD login host
pub const MICROSOFT_LOGIN: &str = "https://login.microsoftonline.com";

/// Forms runtime API base
pub const FORMS_API: &str = "https://forms.office.com/formapi/api";

/// Tenant used when the operator does not name one
pub const DEFAULT_TENANT: &str = "common";

/// Grant type for polling the token endpoint during the device flow
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// An access token is treated as expired this many seconds early.
pub const SAFETY_MARGIN_SECS: u64 = 300;

/// Device-flow poll interval when the authority does not send one
pub const DEFAULT_DEVICE_POLL_INTERVAL_SECS: u64 = 5;

/// OAuth scope requested for both the device grant and refreshes.
///
/// `offline_access` is what makes the authority issue a refresh token.
pub fn scope() -> String {
    format!("{FORMS_APP_ID}/.default offline_access")
}

/// Device-code issuance endpoint for a tenant.
pub fn device_code_endpoint(login_url: &str, tenant: &str) -> String {
    format!(
        "{}/{tenant}/oauth2/v2.0/devicecode",
        login_url.trim_end_matches('/')
    )
}

/// Token endpoint (device-code and refresh-token grants) for a tenant.
pub fn token_endpoint(login_url: &str, tenant: &str) -> String {
    format!(
        "{}/{tenant}/oauth2/v2.0/token",
        login_url.trim_end_matches('/')
    )
}
