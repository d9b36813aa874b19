//! Watched forms and their per-run state
//!
//! `ResourceDescriptor` is what the registry file stores: everything needed
//! to address one form's status endpoint. `ResourceRegistry` wraps the
//! descriptors for a single run and carries each form's state alongside it.
//!
//! State transitions are one-way:
//! - Pending → Open (form accepted a probe, operator notified)
//! - Pending → Exhausted (operator already used up this form)
//!
//! A resolved form is never probed again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One watched form, as stored in the registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Operator-chosen label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Short code from the share URL (`forms.office.com/r/<short>`)
    pub short: String,
    /// Full form ID the runtime API is keyed by
    pub form_id: String,
    /// URL the operator added
    pub url: String,
    /// Tenant that owns the form
    pub tenant: String,
    /// Group (collection) the form lives in
    pub group: String,
}

impl ResourceDescriptor {
    /// Name if set, otherwise the short code.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.short)
    }
}

/// Per-run state of a watched form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Pending,
    Open,
    Exhausted,
}

impl ResourceState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ResourceState::Pending)
    }

    /// Status label for logging.
    pub fn label(self) -> &'static str {
        match self {
            ResourceState::Pending => "pending",
            ResourceState::Open => "open",
            ResourceState::Exhausted => "exhausted",
        }
    }
}

#[derive(Debug)]
struct Entry {
    descriptor: ResourceDescriptor,
    state: ResourceState,
}

/// Fixed, ordered set of forms being watched in this run.
#[derive(Debug)]
pub struct ResourceRegistry {
    entries: Vec<Entry>,
}

impl ResourceRegistry {
    /// Start a run with every form pending.
    ///
    /// Entries repeating an earlier `form_id` are dropped: state is tracked
    /// per form, so one form listed twice must still notify once.
    pub fn new(descriptors: Vec<ResourceDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let entries = descriptors
            .into_iter()
            .filter(|d| {
                let fresh = seen.insert(d.form_id.clone());
                if !fresh {
                    warn!(
                        form = %d.label(),
                        form_id = %d.form_id,
                        "form listed twice, watching once"
                    );
                }
                fresh
            })
            .map(|descriptor| Entry {
                descriptor,
                state: ResourceState::Pending,
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor at `index`, as returned by `pending()`.
    pub fn descriptor(&self, index: usize) -> Option<&ResourceDescriptor> {
        self.entries.get(index).map(|e| &e.descriptor)
    }

    pub fn state(&self, index: usize) -> Option<ResourceState> {
        self.entries.get(index).map(|e| e.state)
    }

    /// All forms in registry order with their current state.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceDescriptor, ResourceState)> {
        self.entries.iter().map(|e| (&e.descriptor, e.state))
    }

    /// Indices of forms still pending, in registry order.
    pub fn pending(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state == ResourceState::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == ResourceState::Pending)
            .count()
    }

    /// True once no form is pending (vacuously true when empty).
    pub fn all_resolved(&self) -> bool {
        self.pending_count() == 0
    }

    /// Move a pending form to a terminal state.
    ///
    /// Returns `true` only for the call that actually performed the
    /// transition. Resolving an already-resolved form, "resolving" to
    /// `Pending`, or an index past the end changes nothing and returns `false`.
    pub fn resolve(&mut self, index: usize, state: ResourceState) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        if entry.state.is_terminal() || !state.is_terminal() {
            return false;
        }
        debug!(form = %entry.descriptor.label(), state = state.label(), "form resolved");
        entry.state = state;
        true
    }
}

/// JSON file holding the ordered list of watched forms.
///
/// The file is pretty-printed so it can be edited by hand.
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the descriptors. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<ResourceDescriptor>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(format!("reading forms file: {e}"))),
        };
        let path = self.path.display();
        serde_json::from_str(&contents).map_err(|e| Error::Registry(format!("parsing {path}: {e}")))
    }

    /// Replace the stored list (temp file + rename).
    pub async fn save(&self, descriptors: &[ResourceDescriptor]) -> Result<()> {
        let json = serde_json::to_string_pretty(descriptors)
            .map_err(|e| Error::Registry(format!("serializing forms: {e}")))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let tmp_path = dir.join(format!(".forms.tmp.{}", std::process::id()));

        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .map_err(|e| Error::Io(format!("writing temp forms file: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| Error::Io(format!("renaming temp forms file: {e}")))?;

        debug!(path = %self.path.display(), forms = descriptors.len(), "saved forms");
        Ok(())
    }

    /// Delete the file. Missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing forms file: {e}"))),
        }
    }
}
