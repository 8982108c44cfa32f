//! Session guard for the remote script server
//!
//! The remote server keeps one authenticated session per process. The
//! guard decides when a new login is needed and protects the server from
//! repeated invalid-credential attempts.
//!
//! ## Login lifecycle
//!
//! ```text
//! LOGGED_OUT --ensure_logged_in--> LOGGING_IN --ok--> LOGGED_IN
//!      ^                               |                  |
//!      +-------- failure (+1) ---------+      TTL expired -+
//! ```
//!
//! - A login younger than the session TTL is reused without I/O.
//! - After `max_consecutive_failures` failures, logins are suppressed until
//!   the backoff window since the last failure has elapsed.
//! - Concurrent callers coalesce on one login lock; state is re-checked
//!   once the lock is held.
//!
//! ## Project bindings
//!
//! Each case-insensitive `domain/project` key has its own lock and its own
//! freshness stamp, so binding one project never waits on another. A fresh
//! login drops every binding.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use scriptmirror_core::config::RemoteConfig;
use scriptmirror_core::domain::target::binding_key;
use scriptmirror_core::domain::SyncFailure;
use scriptmirror_core::ports::IRemoteScriptSystem;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Login credentials for the remote server
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Authenticate as an API client (id/secret) instead of a user
    pub use_token: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .field("use_token", &self.use_token)
            .finish()
    }
}

/// Timing and threshold settings of a [`SessionGuard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// How long a login (and a project binding) stays fresh
    pub session_ttl: chrono::Duration,
    /// Failures after which logins are suppressed
    pub max_consecutive_failures: u32,
    /// Suppression window after the last failure
    pub failure_backoff: chrono::Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_ttl: chrono::Duration::seconds(600),
            max_consecutive_failures: 3,
            failure_backoff: chrono::Duration::seconds(300),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self {
            session_ttl: to_chrono(config.session_ttl()),
            max_consecutive_failures: config.max_consecutive_failures,
            failure_backoff: to_chrono(config.failure_backoff()),
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

// ============================================================================
// Session state
// ============================================================================

#[derive(Debug, Default)]
struct SessionState {
    last_login_at: Option<DateTime<Utc>>,
    last_login_failure_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl SessionState {
    fn is_fresh(&self, now: DateTime<Utc>, settings: &SessionSettings) -> bool {
        self.last_login_at
            .is_some_and(|at| now - at < settings.session_ttl)
    }

    /// Instant at which logins resume, when currently suppressed
    fn backoff_until(&self, now: DateTime<Utc>, settings: &SessionSettings) -> Option<DateTime<Utc>> {
        if self.consecutive_failures < settings.max_consecutive_failures {
            return None;
        }
        let retry_after = self.last_login_failure_at? + settings.failure_backoff;
        (now < retry_after).then_some(retry_after)
    }

    fn reset_if_backoff_elapsed(&mut self, now: DateTime<Utc>, settings: &SessionSettings) {
        if self.consecutive_failures >= settings.max_consecutive_failures
            && self.backoff_until(now, settings).is_none()
        {
            info!(
                failures = self.consecutive_failures,
                "Login backoff window elapsed, allowing a new attempt"
            );
            self.consecutive_failures = 0;
        }
    }
}

/// Snapshot of the guard's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// True while a login is within its TTL
    pub logged_in: bool,
    /// Set while logins are suppressed
    pub backoff_until: Option<DateTime<Utc>>,
    pub bound_projects: usize,
}

// ============================================================================
// SessionGuard
// ============================================================================

type BindingSlot = Arc<tokio::sync::Mutex<Option<DateTime<Utc>>>>;

/// Login lifecycle and project bindings for one remote server session
pub struct SessionGuard {
    remote: Arc<dyn IRemoteScriptSystem + Send + Sync>,
    credentials: Credentials,
    settings: SessionSettings,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    login_lock: tokio::sync::Mutex<()>,
    bindings: DashMap<String, BindingSlot>,
}

impl SessionGuard {
    pub fn new(
        remote: Arc<dyn IRemoteScriptSystem + Send + Sync>,
        credentials: Credentials,
        settings: SessionSettings,
    ) -> Self {
        Self::with_clock(remote, credentials, settings, Arc::new(SystemClock))
    }

    /// Creates a guard reading time from `clock`
    pub fn with_clock(
        remote: Arc<dyn IRemoteScriptSystem + Send + Sync>,
        credentials: Credentials,
        settings: SessionSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote,
            credentials,
            settings,
            clock,
            state: Mutex::new(SessionState::default()),
            login_lock: tokio::sync::Mutex::new(()),
            bindings: DashMap::new(),
        }
    }

    /// Creates a guard from the `remote` configuration section
    pub fn from_config(remote: Arc<dyn IRemoteScriptSystem + Send + Sync>, config: &RemoteConfig) -> Self {
        let credentials = Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
            use_token: config.authenticate_with_token,
        };
        Self::new(remote, credentials, SessionSettings::from_config(config))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes sure the shared session is authenticated
    ///
    /// Returns `true` when this call performed a fresh login.
    ///
    /// # Errors
    ///
    /// - [`SyncFailure::AuthenticationBackoff`] while logins are suppressed
    /// - [`SyncFailure::AuthenticationFailure`] when the login is rejected
    ///   or the call fails
    pub async fn ensure_logged_in(&self) -> Result<bool, SyncFailure> {
        if self.check_session()? {
            return Ok(false);
        }

        let _login = self.login_lock.lock().await;

        if self.check_session()? {
            debug!("Session refreshed by a concurrent caller");
            return Ok(false);
        }

        debug!(use_token = self.credentials.use_token, "Logging in to remote server");
        let outcome = self
            .remote
            .login(
                &self.credentials.username,
                &self.credentials.password,
                self.credentials.use_token,
            )
            .await;

        match outcome {
            Ok(true) => {
                {
                    let mut state = self.state();
                    state.consecutive_failures = 0;
                    state.last_login_at = Some(self.clock.now());
                }
                self.clear_all_bindings();
                info!(username = %self.credentials.username, "Logged in to remote server");
                Ok(true)
            }
            Ok(false) => Err(self.record_failure("invalid credentials".to_string())),
            Err(e) => Err(self.record_failure(e.to_string())),
        }
    }

    /// `Ok(true)` when the session is fresh, `Ok(false)` when a login is due
    fn check_session(&self) -> Result<bool, SyncFailure> {
        let now = self.clock.now();
        let mut state = self.state();
        state.reset_if_backoff_elapsed(now, &self.settings);

        if state.is_fresh(now, &self.settings) {
            return Ok(true);
        }
        if let Some(retry_after) = state.backoff_until(now, &self.settings) {
            return Err(SyncFailure::AuthenticationBackoff {
                failures: state.consecutive_failures,
                retry_after,
            });
        }
        Ok(false)
    }

    fn record_failure(&self, reason: String) -> SyncFailure {
        let mut state = self.state();
        state.consecutive_failures += 1;
        state.last_login_failure_at = Some(self.clock.now());
        state.last_login_at = None;

        let failures = state.consecutive_failures;
        if failures >= self.settings.max_consecutive_failures {
            error!(
                failures,
                backoff_secs = self.settings.failure_backoff.num_seconds(),
                reason = %reason,
                "Login failed, entering backoff"
            );
        } else {
            warn!(failures, reason = %reason, "Login failed");
        }
        SyncFailure::AuthenticationFailure(reason)
    }

    /// Makes sure the session is bound to `domain`/`project`
    ///
    /// # Errors
    ///
    /// Returns [`SyncFailure::ProjectBinding`] when the bind call fails.
    pub async fn ensure_project_bound(&self, domain: &str, project: &str) -> Result<(), SyncFailure> {
        let key = binding_key(domain, project);
        let slot = self
            .bindings
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone();

        let mut bound_at = slot.lock().await;
        let now = self.clock.now();
        if bound_at.is_some_and(|at| now - at < self.settings.session_ttl) {
            return Ok(());
        }

        self.remote
            .bind_project(domain, project)
            .await
            .map_err(|e| SyncFailure::ProjectBinding {
                domain: domain.to_string(),
                project: project.to_string(),
                reason: e.to_string(),
            })?;

        *bound_at = Some(self.clock.now());
        debug!(binding = %key, "Project bound");
        Ok(())
    }

    /// Forgets every project binding
    pub fn clear_all_bindings(&self) {
        if !self.bindings.is_empty() {
            debug!(count = self.bindings.len(), "Clearing project bindings");
        }
        self.bindings.clear();
    }

    /// Logs in if needed, logging the outcome instead of returning it
    pub async fn warm_up(&self) {
        match self.ensure_logged_in().await {
            Ok(true) => info!("Login warm-up successful"),
            Ok(false) => info!("Login warm-up: already logged in"),
            Err(e) => warn!(error = %e, "Login warm-up failed"),
        }
    }

    /// Ends the remote session and forgets local session state
    pub async fn logout(&self) {
        let _login = self.login_lock.lock().await;
        if self.state().last_login_at.is_none() {
            return;
        }
        if let Err(e) = self.remote.logout().await {
            warn!(error = %e, "Logout failed");
        }
        self.state().last_login_at = None;
        self.clear_all_bindings();
        debug!("Session closed");
    }

    pub fn status(&self) -> SessionStatus {
        let now = self.clock.now();
        let state = self.state();
        SessionStatus {
            last_login_at: state.last_login_at,
            last_login_failure_at: state.last_login_failure_at,
            consecutive_failures: state.consecutive_failures,
            logged_in: state.is_fresh(now, &self.settings),
            backoff_until: state.backoff_until(now, &self.settings),
            bound_projects: self.bindings.len(),
        }
    }
}
