//! Credential storage for the operator's token set
//!
//! The token file holds exactly one `TokenSet`. Writes go to a temp file in
//! the same directory and are renamed over the target, so a reader never sees
//! a half-written file. A tokio Mutex keeps saves single-writer.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenSet;

/// File-backed holder of the current token set.
pub struct CredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted token set.
    ///
    /// A missing file means the operator never authenticated and yields
    /// `NotAuthenticated`. A file that exists but does not parse is a
    /// `CredentialParse` error so a corrupt file is not mistaken for a
    /// fresh install.
    pub async fn load(&self) -> Result<TokenSet> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file");
                return Err(Error::NotAuthenticated);
            }
            Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
        };

        let tokens: TokenSet = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
        debug!(path = %self.path.display(), tenant = %tokens.tenant, "loaded tokens");
        Ok(tokens)
    }

    /// Persist a token set, replacing whatever was stored before.
    pub async fn save(&self, tokens: &TokenSet) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, tokens).await?;
        info!(path = %self.path.display(), expires_at = tokens.expires_at(), "saved tokens");
        Ok(())
    }

    /// Forget the stored token set. Missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(format!("removing token file: {e}"))),
        }
    }
}

/// Write the token set to `path` atomically with 0600 permissions.
async fn write_atomic(path: &Path, tokens: &TokenSet) -> Result<()> {
    let json = serde_json::to_string_pretty(tokens)
        .map_err(|e| Error::CredentialParse(format!("serializing tokens: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".forms_tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
