use crate::error::{MomsyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `planning.password`.
pub const PASSWORD_ENV: &str = "MOMSYNC_PLANNING_PASSWORD";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_cursor_path")]
    pub cursor_path: PathBuf,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from("state/cursor.yaml")
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cursor_path: default_cursor_path(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// PlanningConfig
// ---------------------------------------------------------------------------

/// The planning system's web endpoints and the account the bridge uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    pub login_url: String,
    pub import_url: String,
    pub logout_url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl PlanningConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Backoff after the first failed delivery; doubles per attempt.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Deliveries attempted before a task is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_backoff_secs() -> u64 {
    5
}

fn default_max_backoff_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl DispatchConfig {
    /// Backoff before the next delivery after `attempts` consecutive
    /// transport failures of one task.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let exp = attempts.saturating_sub(1).min(31);
        let secs = self.backoff_secs.saturating_mul(1u64 << exp);
        Duration::from_secs(secs.min(self.max_backoff_secs))
    }
}

// ---------------------------------------------------------------------------
// ListenerConfig
// ---------------------------------------------------------------------------

/// Inbound HTTPS listener. Certificates and keys are PEM files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
    /// CA bundle that client certificates must chain to.
    pub client_ca: PathBuf,
    #[serde(default = "default_require_client_cert")]
    pub require_client_cert: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_require_client_cert() -> bool {
    true
}

fn default_max_connections() -> usize {
    4
}

fn default_connection_timeout_secs() -> u64 {
    5
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

impl ListenerConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// RepositoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,
}

fn default_repository_path() -> PathBuf {
    PathBuf::from("state/repository.sqlite")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    pub planning: PlanningConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    pub listener: ListenerConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
}

impl Config {
    /// Parse YAML, applying the password environment override.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(data)?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            cfg.planning.password = password;
        }
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MomsyncError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_yaml(&data)?;
        cfg.resolve_paths(path.parent().unwrap_or(Path::new(".")));
        Ok(cfg)
    }

    /// Relative paths in the file are relative to the file's directory.
    fn resolve_paths(&mut self, base: &Path) {
        for p in [
            &mut self.poll.cursor_path,
            &mut self.repository.path,
            &mut self.listener.server_cert,
            &mut self.listener.server_key,
            &mut self.listener.client_ca,
        ] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.poll.interval_secs == 0 {
            push(
                WarnLevel::Error,
                "poll.interval_secs must be at least 1".to_string(),
            );
        }

        for (name, url) in [
            ("planning.login_url", &self.planning.login_url),
            ("planning.import_url", &self.planning.import_url),
            ("planning.logout_url", &self.planning.logout_url),
        ] {
            if url.trim().is_empty() {
                push(WarnLevel::Error, format!("{name} is empty"));
            } else if !url.starts_with("https://") && !url.starts_with("http://") {
                push(
                    WarnLevel::Error,
                    format!("{name} '{url}' is not an http(s) URL"),
                );
            } else if url.starts_with("http://") {
                push(
                    WarnLevel::Warning,
                    format!("{name} uses plain http; credentials travel unencrypted"),
                );
            }
        }

        if self.planning.password.is_empty() {
            push(
                WarnLevel::Warning,
                format!("planning.password is empty (set it or {PASSWORD_ENV})"),
            );
        }

        if self.planning.request_timeout_secs == 0 {
            push(
                WarnLevel::Error,
                "planning.request_timeout_secs must be at least 1".to_string(),
            );
        }

        if self.dispatch.max_attempts == 0 {
            push(
                WarnLevel::Error,
                "dispatch.max_attempts must be at least 1".to_string(),
            );
        }

        if self.dispatch.backoff_secs > self.dispatch.max_backoff_secs {
            push(
                WarnLevel::Warning,
                format!(
                    "dispatch.backoff_secs={} exceeds max_backoff_secs={}",
                    self.dispatch.backoff_secs, self.dispatch.max_backoff_secs
                ),
            );
        }

        if !(1..=64).contains(&self.listener.max_connections) {
            push(
                WarnLevel::Error,
                format!(
                    "listener.max_connections={} must be between 1 and 64",
                    self.listener.max_connections
                ),
            );
        }

        if self.listener.bind.parse::<std::net::SocketAddr>().is_err() {
            push(
                WarnLevel::Error,
                format!("listener.bind '{}' is not a socket address", self.listener.bind),
            );
        }

        for (name, path) in [
            ("listener.server_cert", &self.listener.server_cert),
            ("listener.server_key", &self.listener.server_key),
            ("listener.client_ca", &self.listener.client_ca),
        ] {
            if !path.exists() {
                push(
                    WarnLevel::Error,
                    format!("{name} '{}' does not exist", path.display()),
                );
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
