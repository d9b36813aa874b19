//! Form availability probe and outcome classification
//!
//! A probe asks the Forms runtime API for the form definition. The API answers
//! 200 once the form accepts responses; otherwise it returns an error body
//! whose `error.code` says why:
//!
//! - `5000`: form not published yet (keep watching)
//! - `5001`: operator already submitted (nothing left to wait for)
//!
//! Any other code is kept verbatim for diagnostics. Network failures and
//! timeouts are transient: the form stays pending and is probed next tick.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::registry::ResourceDescriptor;

/// Error code for a form that is not accepting responses yet.
pub const NOT_YET_OPEN_CODE: &str = "5000";

/// Error code for a form the operator has already responded to.
pub const ALREADY_SUBMITTED_CODE: &str = "5001";

/// Query the web client sends with a form definition request.
const STATUS_QUERY: &str = "$expand=questions($expand=choices)&$top=1";

/// Longest slice of a non-JSON error body kept in an outcome.
const MAX_BODY_EXCERPT: usize = 200;

/// Result of probing one form once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Form is open
    Available,
    /// API answered with a classified refusal
    Unavailable(Unavailable),
    /// No usable answer this time
    Transient(Transient),
}

/// Why the API refused a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    NotYetOpen,
    /// Terminal: the operator's response quota for this form is spent
    AlreadyConsumed,
    Other { code: String, message: String },
}

/// Why a probe got no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transient {
    Timeout,
    Network(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Available => write!(f, "OPEN"),
            Outcome::Unavailable(Unavailable::NotYetOpen) => write!(f, "closed"),
            Outcome::Unavailable(Unavailable::AlreadyConsumed) => write!(f, "already submitted"),
            Outcome::Unavailable(Unavailable::Other { code, message }) => {
                write!(f, "error {code}: {message}")
            }
            Outcome::Transient(Transient::Timeout) => write!(f, "timeout"),
            Outcome::Transient(Transient::Network(detail)) => write!(f, "error: {detail}"),
        }
    }
}

/// Classify a status-endpoint response by HTTP status and body.
///
/// 2xx is `Available`. Anything else is classified by `error.code` in the
/// JSON body; codes may arrive as strings or numbers. A body that is not JSON
/// is reported as `Other` with the HTTP status as its code.
pub fn classify_response(status: u16, body: &str) -> Outcome {
    if (200..300).contains(&status) {
        return Outcome::Available;
    }

    let parsed: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            let excerpt: String = body.trim().chars().take(MAX_BODY_EXCERPT).collect();
            return Outcome::Unavailable(Unavailable::Other {
                code: format!("http {status}"),
                message: if excerpt.is_empty() { "?".into() } else { excerpt },
            });
        }
    };

    let error = &parsed["error"];
    let code = match &error["code"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => "?".into(),
    };

    match code.as_str() {
        NOT_YET_OPEN_CODE => Outcome::Unavailable(Unavailable::NotYetOpen),
        ALREADY_SUBMITTED_CODE => Outcome::Unavailable(Unavailable::AlreadyConsumed),
        _ => Outcome::Unavailable(Unavailable::Other {
            message: error["message"].as_str().unwrap_or("?").to_owned(),
            code,
        }),
    }
}

/// Something that can check whether a form is open.
///
/// Uses `Pin<Box<dyn Future>>` so the engine can hold it as a trait object.
pub trait StatusProbe: Send + Sync {
    fn probe<'a>(
        &'a self,
        resource: &'a ResourceDescriptor,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;
}

/// Probes the Forms runtime API over HTTP.
pub struct StatusChecker {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl StatusChecker {
    /// `timeout` bounds each probe so a dead network cannot stall a tick.
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            timeout,
        }
    }

    /// Runtime endpoint for a form.
    pub fn status_url(&self, resource: &ResourceDescriptor) -> String {
        format!(
            "{}/{}/groups/{}/light/runtimeFormsWithResponses('{}')?{STATUS_QUERY}",
            self.api_url.trim_end_matches('/'),
            resource.tenant,
            resource.group,
            resource.form_id,
        )
    }

    /// Probe one form. Never fails: transport problems become `Transient`.
    pub async fn check(&self, resource: &ResourceDescriptor, access_token: &str) -> Outcome {
        let url = self.status_url(resource);
        let result = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .timeout(self.timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Outcome::Transient(Transient::Timeout),
            Err(e) => return Outcome::Transient(Transient::Network(e.to_string())),
        };

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Outcome::Available;
        }

        match response.text().await {
            Ok(body) => {
                debug!(form_id = %resource.form_id, status, "form refused probe");
                classify_response(status, &body)
            }
            Err(e) if e.is_timeout() => Outcome::Transient(Transient::Timeout),
            Err(e) => Outcome::Transient(Transient::Network(format!("reading response: {e}"))),
        }
    }
}

impl StatusProbe for StatusChecker {
    fn probe<'a>(
        &'a self,
        resource: &'a ResourceDescriptor,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send + 'a>> {
        Box::pin(self.check(resource, access_token))
    }
}
