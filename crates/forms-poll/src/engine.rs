//! Poll loop
//!
//! One tick:
//! 1. Make sure the access token is fresh (once per tick, not per form)
//! 2. Probe every pending form in registry order
//! 3. Available → Open, notify once; AlreadyConsumed → Exhausted, no notify
//! 4. Everything else leaves the form pending
//!
//! The loop ends when no form is pending and otherwise sleeps a fixed
//! interval. A credential failure ends the run at once, before any probe of
//! that tick.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use forms_auth::{TokenRefresher, TokenSet};
use tracing::{info, warn};

use crate::error::Result;
use crate::notify::NotificationSink;
use crate::registry::{ResourceRegistry, ResourceState};
use crate::status::{Outcome, StatusProbe, Unavailable};

/// Source of a usable token set at the start of each tick.
pub trait TokenSource: Send + Sync {
    fn ensure_fresh(
        &self,
        tokens: TokenSet,
    ) -> Pin<Box<dyn Future<Output = forms_auth::Result<TokenSet>> + Send + '_>>;
}

impl TokenSource for TokenRefresher {
    fn ensure_fresh(
        &self,
        tokens: TokenSet,
    ) -> Pin<Box<dyn Future<Output = forms_auth::Result<TokenSet>> + Send + '_>> {
        Box::pin(TokenRefresher::ensure_fresh(self, tokens))
    }
}

/// What changed during one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Labels of forms that opened this tick
    pub opened: Vec<String>,
    /// Labels of forms found already submitted this tick
    pub exhausted: Vec<String>,
    /// Forms still pending after the tick
    pub pending: usize,
}

/// What a completed run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u32,
    pub opened: Vec<String>,
    pub exhausted: Vec<String>,
}

/// Drives the watch loop over a registry.
pub struct PollEngine {
    tokens: Arc<dyn TokenSource>,
    probe: Arc<dyn StatusProbe>,
    sink: Arc<dyn NotificationSink>,
    interval: Duration,
}

impl PollEngine {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        probe: Arc<dyn StatusProbe>,
        sink: Arc<dyn NotificationSink>,
        interval: Duration,
    ) -> Self {
        Self {
            tokens,
            probe,
            sink,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until every form is resolved.
    ///
    /// Returns after the first tick that leaves nothing pending, or at once
    /// for an empty registry. Errors only on credential failure.
    pub async fn run(
        &self,
        registry: &mut ResourceRegistry,
        tokens: TokenSet,
    ) -> Result<RunSummary> {
        let mut tokens = tokens;
        let mut summary = RunSummary::default();

        if registry.all_resolved() {
            return Ok(summary);
        }

        info!(
            forms = registry.len(),
            interval_secs = self.interval.as_secs(),
            "polling started"
        );

        loop {
            let report = self.tick(registry, &mut tokens).await?;
            summary.ticks += 1;
            summary.opened.extend(report.opened);
            summary.exhausted.extend(report.exhausted);

            if report.pending == 0 {
                info!(
                    ticks = summary.ticks,
                    opened = summary.opened.len(),
                    exhausted = summary.exhausted.len(),
                    "all forms resolved"
                );
                return Ok(summary);
            }

            info!(
                remaining = report.pending,
                next_in_secs = self.interval.as_secs(),
                "forms still closed"
            );
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run a single tick. `tokens` is replaced if it had to be refreshed.
    pub async fn tick(
        &self,
        registry: &mut ResourceRegistry,
        tokens: &mut TokenSet,
    ) -> Result<TickReport> {
        let mut report = TickReport::default();

        let pending = registry.pending();
        if pending.is_empty() {
            return Ok(report);
        }

        *tokens = self.tokens.ensure_fresh(tokens.clone()).await?;
        let access_token = tokens.access_token.expose().as_str();

        for index in pending {
            let Some(resource) = registry.descriptor(index) else {
                continue;
            };
            let label = resource.label().to_owned();
            let outcome = self.probe.probe(resource, access_token).await;

            match &outcome {
                Outcome::Available => {
                    // Guarded by the registry transition, not by the outcome
                    if registry.resolve(index, ResourceState::Open) {
                        self.sink.notify(&format!("OPEN: {label}"));
                        info!(form = %label, ">>> form is OPEN <<<");
                        report.opened.push(label);
                    }
                }
                Outcome::Unavailable(Unavailable::AlreadyConsumed) => {
                    if registry.resolve(index, ResourceState::Exhausted) {
                        info!(form = %label, "already submitted, no longer watching");
                        report.exhausted.push(label);
                    }
                }
                Outcome::Unavailable(Unavailable::NotYetOpen) => {
                    info!(form = %label, detail = %outcome, "probed");
                }
                Outcome::Unavailable(Unavailable::Other { .. }) | Outcome::Transient(_) => {
                    warn!(form = %label, detail = %outcome, "probed");
                }
            }
        }

        report.pending = registry.pending_count();
        Ok(report)
    }
}
