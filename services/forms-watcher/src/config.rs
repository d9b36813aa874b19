//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Unlike most services the config file is optional: without one the tool
//! runs against the public Microsoft endpoints with files in the working
//! directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Group that holds the watched forms when the config does not name one.
pub const DEFAULT_GROUP_ID: &str = "5385ae13-9f9d-4598-a665-dc861def3047";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Sign-in and token storage settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

/// Polling settings
#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_forms_file")]
    pub forms_file: PathBuf,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_forms_api_url")]
    pub forms_api_url: String,
}

fn default_tenant() -> String {
    forms_auth::DEFAULT_TENANT.into()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("forms_tokens.json")
}

fn default_login_url() -> String {
    forms_auth::MICROSOFT_LOGIN.into()
}

fn default_forms_file() -> PathBuf {
    PathBuf::from("forms.json")
}

fn default_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    10
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.into()
}

fn default_forms_api_url() -> String {
    forms_auth::FORMS_API.into()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tenant: default_tenant(),
            token_file: default_token_file(),
            login_url: default_login_url(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            forms_file: default_forms_file(),
            interval_secs: default_interval(),
            request_timeout_secs: default_timeout(),
            group_id: default_group_id(),
            forms_api_url: default_forms_api_url(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `FORMS_WATCHER_TENANT` replaces the configured tenant.
    fn apply_env(&mut self) {
        if let Ok(tenant) = std::env::var("FORMS_WATCHER_TENANT") {
            let tenant = tenant.trim();
            if !tenant.is_empty() {
                self.auth.tenant = tenant.to_owned();
            }
        }
    }

    fn validate(&self) -> common::Result<()> {
        for (name, url) in [
            ("login_url", &self.auth.login_url),
            ("forms_api_url", &self.watch.forms_api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if self.auth.tenant.is_empty() {
            return Err(common::Error::Config("tenant must not be empty".into()));
        }

        if self.watch.interval_secs == 0 {
            return Err(common::Error::Config(
                "interval_secs must be greater than 0".into(),
            ));
        }

        if self.watch.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.watch.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.watch.request_timeout_secs)
    }

    /// Resolve config file path from CLI arg or FORMS_WATCHER_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("FORMS_WATCHER_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("forms-watcher.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("forms-watcher.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[auth]
tenant = "contoso.onmicrosoft.com"
token_file = "/var/lib/forms-watcher/tokens.json"

[watch]
forms_file = "/var/lib/forms-watcher/forms.json"
interval_secs = 30
request_timeout_secs = 4
group_id = "0f0e0d0c-0000-4000-8000-000000000001"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.tenant, "contoso.onmicrosoft.com");
        assert_eq!(
            config.auth.token_file,
            PathBuf::from("/var/lib/forms-watcher/tokens.json")
        );
        assert_eq!(config.auth.login_url, forms_auth::MICROSOFT_LOGIN);
        assert_eq!(config.interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(4));
        assert_eq!(
            config.watch.group_id,
            "0f0e0d0c-0000-4000-8000-000000000001"
        );
        assert_eq!(config.watch.forms_api_url, forms_auth::FORMS_API);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.tenant, "common");
        assert_eq!(config.auth.token_file, PathBuf::from("forms_tokens.json"));
        assert_eq!(config.watch.forms_file, PathBuf::from("forms.json"));
        assert_eq!(config.watch.interval_secs, 5);
        assert_eq!(config.watch.request_timeout_secs, 10);
        assert_eq!(config.watch.group_id, DEFAULT_GROUP_ID);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        let config = Config::load_or_default(Path::new("/nonexistent/forms-watcher.toml")).unwrap();
        assert_eq!(config.auth.tenant, "common");
        assert!(Config::load(Path::new("/nonexistent/forms-watcher.toml")).is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[watch]\ninterval_secs = 0\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("interval_secs"), "got: {err}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[watch]\nrequest_timeout_secs = 0\n");

        let err = Config::load(&path).unwrap_err();
        assert!(
            err.to_string().contains("request_timeout_secs"),
            "got: {err}"
        );
    }

    #[test]
    fn test_non_http_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[auth]\nlogin_url = \"login.microsoftonline.com\"\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("login_url"), "got: {err}");
    }

    #[test]
    fn test_env_overrides_tenant() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[auth]\ntenant = \"from-file\"\n");

        unsafe { set_env("FORMS_WATCHER_TENANT", "from-env") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("FORMS_WATCHER_TENANT") };

        assert_eq!(config.auth.tenant, "from-env");
    }

    #[test]
    fn test_resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();

        unsafe { set_env("FORMS_WATCHER_CONFIG", "/etc/forms-watcher.toml") };
        assert_eq!(
            Config::resolve_path(Some(Path::new("cli.toml"))),
            PathBuf::from("cli.toml")
        );
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("/etc/forms-watcher.toml")
        );

        unsafe { remove_env("FORMS_WATCHER_CONFIG") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("forms-watcher.toml")
        );
    }
}
