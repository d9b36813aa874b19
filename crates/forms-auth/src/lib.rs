//! Microsoft identity authentication for forms-watcher
//!
//! Obtains a token set through the OAuth2 device-authorization flow, keeps it
//! on disk, and refreshes it silently before it expires.
//!
//! Credential lifecycle:
//! 1. `DeviceAuthFlow::begin()` issues a device code and user code
//! 2. Operator signs in at the verification URI
//! 3. `DeviceAuthFlow::await_completion()` polls until tokens are issued
//! 4. Tokens stored via `CredentialStore::save()`
//! 5. Each poll tick calls `TokenRefresher::ensure_fresh()`, which refreshes
//!    and re-saves once the access token is within five minutes of expiry

pub mod constants;
pub mod credentials;
pub mod device;
pub mod error;
pub mod refresh;
pub mod token;

pub use constants::*;
pub use credentials::CredentialStore;
pub use device::{DeviceAuthFlow, DeviceChallenge, DevicePoll};
pub use error::{Error, Result};
pub use refresh::TokenRefresher;
pub use token::{TokenResponse, TokenSet, unix_now};
