//! Watch loop for unpublished Microsoft Forms
//!
//! Probes each watched form until it opens, notifying the operator exactly
//! once per form. Forms the operator has already submitted are dropped from
//! the loop without a notification. Credentials come from `forms-auth`.
//!
//! Per-form lifecycle:
//! 1. Form added to the registry file → `Pending` for the run
//! 2. Probe returns 200 → `Open`, notification sent
//! 3. Probe returns code 5001 → `Exhausted`, silently dropped
//! 4. Code 5000, other codes, timeouts → still `Pending`, probed next tick

pub mod engine;
pub mod error;
pub mod notify;
pub mod registry;
pub mod status;

pub use engine::{PollEngine, RunSummary, TickReport, TokenSource};
pub use error::{Error, Result};
pub use notify::{DesktopNotifier, NotificationSink};
pub use registry::{RegistryStore, ResourceDescriptor, ResourceRegistry, ResourceState};
pub use status::{Outcome, StatusChecker, StatusProbe, Transient, Unavailable, classify_response};
