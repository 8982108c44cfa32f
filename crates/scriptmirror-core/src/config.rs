//! Configuration module for ScriptMirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `source.token`
pub const ENV_SOURCE_TOKEN: &str = "SCRIPTMIRROR_SOURCE_TOKEN";

/// Environment variable that overrides `remote.password`
pub const ENV_REMOTE_PASSWORD: &str = "SCRIPTMIRROR_REMOTE_PASSWORD";

const REDACTED: &str = "********";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for ScriptMirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub remote: RemoteConfig,
    pub state: StateConfig,
    pub packaging: PackagingConfig,
    pub logging: LoggingConfig,
}

/// Source repository settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the repository REST API, e.g. `https://gitlab.example.com/api/v4`.
    pub url: String,
    /// Private access token.
    pub token: String,
    /// Tree entries requested per page.
    pub per_page: u32,
    /// Concurrent version lookups during a scan.
    pub scan_concurrency: usize,
    /// Seconds to wait for in-flight lookups when a scan is torn down early.
    pub scan_shutdown_timeout_secs: u64,
    /// Per-request timeout in seconds for repository API calls.
    pub request_timeout_secs: u64,
}

/// Remote script server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the server, e.g. `https://perf.example.com`.
    pub url: String,
    /// User name, or client id when `authenticate_with_token` is set.
    pub username: String,
    /// Password, or client secret when `authenticate_with_token` is set.
    pub password: String,
    /// Authenticate with a client token instead of user credentials.
    pub authenticate_with_token: bool,
    /// Seconds a login (and a project binding) stays fresh.
    pub session_ttl_secs: u64,
    /// Consecutive login failures that trigger the backoff window.
    pub max_consecutive_failures: u32,
    /// Seconds during which logins are suppressed after too many failures.
    pub failure_backoff_secs: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Persisted state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path to the SQLite database.
    pub database: PathBuf,
}

/// Packaging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingConfig {
    /// Root for temporary artifacts. `None` uses the OS temp directory.
    pub work_dir: Option<PathBuf>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/scriptmirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("scriptmirror")
            .join("config.yaml")
    }

    /// Replace secrets with values from the environment when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_SOURCE_TOKEN).filter(|v| !v.is_empty()) {
            tracing::debug!(variable = ENV_SOURCE_TOKEN, "Source token taken from environment");
            self.source.token = token;
        }
        if let Some(password) = lookup(ENV_REMOTE_PASSWORD).filter(|v| !v.is_empty()) {
            tracing::debug!(
                variable = ENV_REMOTE_PASSWORD,
                "Remote password taken from environment"
            );
            self.remote.password = password;
        }
    }

    /// Copy of this configuration with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.source.token.is_empty() {
            copy.source.token = REDACTED.to_string();
        }
        if !copy.remote.password.is_empty() {
            copy.remote.password = REDACTED.to_string();
        }
        copy
    }
}

impl RemoteConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SourceConfig {
    pub fn scan_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_shutdown_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            per_page: 100,
            scan_concurrency: 8,
            scan_shutdown_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            authenticate_with_token: false,
            session_ttl_secs: 600,
            max_consecutive_failures: 3,
            failure_backoff_secs: 300,
            request_timeout_secs: 120,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("scriptmirror")
                .join("state.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"remote.session_ttl_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn require_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    } else if !(value.starts_with("http://") || value.starts_with("https://")) {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("must be an http(s) URL, got '{}'", value),
        });
    }
}

fn require_non_empty(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    }
}

fn require_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError {
            field: field.into(),
            message: "must be greater than 0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- source ---
        require_url(&mut errors, "source.url", &self.source.url);
        require_non_empty(&mut errors, "source.token", &self.source.token);
        require_positive(&mut errors, "source.per_page", u64::from(self.source.per_page));
        if self.source.scan_concurrency == 0 || self.source.scan_concurrency > 64 {
            errors.push(ValidationError {
                field: "source.scan_concurrency".into(),
                message: "must be in range 1..=64".into(),
            });
        }
        require_positive(
            &mut errors,
            "source.request_timeout_secs",
            self.source.request_timeout_secs,
        );

        // --- remote ---
        require_url(&mut errors, "remote.url", &self.remote.url);
        require_non_empty(&mut errors, "remote.username", &self.remote.username);
        require_non_empty(&mut errors, "remote.password", &self.remote.password);
        require_positive(
            &mut errors,
            "remote.session_ttl_secs",
            self.remote.session_ttl_secs,
        );
        require_positive(
            &mut errors,
            "remote.max_consecutive_failures",
            u64::from(self.remote.max_consecutive_failures),
        );
        require_positive(
            &mut errors,
            "remote.failure_backoff_secs",
            self.remote.failure_backoff_secs,
        );
        require_positive(
            &mut errors,
            "remote.request_timeout_secs",
            self.remote.request_timeout_secs,
        );

        // --- state ---
        if self.state.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "state.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- packaging ---
        if let Some(dir) = &self.packaging.work_dir {
            if dir.exists() && !dir.is_dir() {
                errors.push(ValidationError {
                    field: "packaging.work_dir".into(),
                    message: format!("not a directory: {}", dir.display()),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use scriptmirror_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .source_url("https://gitlab.example.com/api/v4")
///     .source_token("glpat-xxxx")
///     .remote_url("https://perf.example.com")
///     .remote_credentials("svc-sync", "secret")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- source ---

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.source.url = url.into();
        self
    }

    pub fn source_token(mut self, token: impl Into<String>) -> Self {
        self.config.source.token = token.into();
        self
    }

    pub fn source_per_page(mut self, n: u32) -> Self {
        self.config.source.per_page = n;
        self
    }

    pub fn source_scan_concurrency(mut self, n: usize) -> Self {
        self.config.source.scan_concurrency = n;
        self
    }

    pub fn source_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.source.request_timeout_secs = secs;
        self
    }

    // --- remote ---

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = url.into();
        self
    }

    pub fn remote_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.remote.username = username.into();
        self.config.remote.password = password.into();
        self
    }

    pub fn remote_authenticate_with_token(mut self, enabled: bool) -> Self {
        self.config.remote.authenticate_with_token = enabled;
        self
    }

    pub fn remote_session_ttl_secs(mut self, seconds: u64) -> Self {
        self.config.remote.session_ttl_secs = seconds;
        self
    }

    pub fn remote_max_consecutive_failures(mut self, n: u32) -> Self {
        self.config.remote.max_consecutive_failures = n;
        self
    }

    pub fn remote_failure_backoff_secs(mut self, seconds: u64) -> Self {
        self.config.remote.failure_backoff_secs = seconds;
        self
    }

    // --- state / packaging ---

    pub fn state_database(mut self, path: PathBuf) -> Self {
        self.config.state.database = path;
        self
    }

    pub fn packaging_work_dir(mut self, dir: PathBuf) -> Self {
        self.config.packaging.work_dir = Some(dir);
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
