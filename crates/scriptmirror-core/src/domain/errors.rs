//! Domain error types
//!
//! This module defines the error types shared by every layer:
//! - [`DomainError`] for validation of domain values
//! - [`RemoteCallError`] for typed failures of remote-system calls
//! - [`SyncFailure`] for phase-level failures of a sync cycle
//!
//! ## Propagation
//!
//! Item-level failures (one unit's upload or delete) never leave the
//! applier as errors; they become failed change records. Phase-level
//! failures surface as [`SyncFailure`] and are converted into a single
//! synthetic failed record by the coordinator, tagged with the
//! [`SyncPhase`] returned by [`SyncFailure::phase`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A target key component is missing or blank
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// A repository ref (branch, tag or commit) is missing or blank
    #[error("Invalid ref: {0}")]
    InvalidRef(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Typed failure of a call to one of the remote systems
///
/// Adapters map HTTP status codes onto these variants so that callers can
/// branch on the failure kind instead of parsing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteCallError {
    /// Credentials were rejected or the session is no longer valid (401/403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other 4xx response
    #[error("Client error ({status}): {message}")]
    Client {
        /// HTTP status code
        status: u16,
        /// Summarised error body
        message: String,
    },

    /// A 5xx response
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Summarised error body
        message: String,
    },

    /// Connection, DNS, TLS or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be decoded or was incomplete
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// The phase of a sync cycle a phase-level failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// The per-target lock could not be taken
    Lock,
    /// Login or project binding failed
    Session,
    /// Anything after the session was established
    SyncException,
}

impl SyncPhase {
    /// Label used in the action field of a synthetic change record
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Lock => "LOCK",
            SyncPhase::Session => "SESSION",
            SyncPhase::SyncException => "SYNC_EXCEPTION",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase-level failures of a sync cycle
#[derive(Debug, Error)]
pub enum SyncFailure {
    /// Another sync for the same target holds the lock
    #[error("Could not acquire sync lock for {target}: another sync is in progress")]
    LockContention {
        /// Display form of the target key
        target: String,
    },

    /// Too many recent login failures; logins are suppressed until `retry_after`
    #[error(
        "Authentication temporarily disabled due to {failures} consecutive failures. Will retry after {retry_after}"
    )]
    AuthenticationBackoff {
        /// Consecutive failures counted so far
        failures: u32,
        /// Instant at which login attempts resume
        retry_after: DateTime<Utc>,
    },

    /// Bad credentials or a rejected session
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The session could not be bound to the requested project
    #[error("Failed to bind to project {domain}/{project}: {reason}")]
    ProjectBinding {
        /// Remote domain
        domain: String,
        /// Remote project
        project: String,
        /// Underlying failure
        reason: String,
    },

    /// A single unit's upload or delete failed
    #[error("Remote operation failed for {path}: {reason}")]
    RemoteItemFailure {
        /// Unit path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The repository could not be enumerated
    #[error("Repository scan failed: {0}")]
    ScanFailure(String),

    /// Persisted state could not be loaded or saved
    #[error("State persistence failed: {0}")]
    PersistenceFailure(String),

    /// The sync request itself is invalid
    #[error(transparent)]
    InvalidRequest(#[from] DomainError),
}

impl SyncFailure {
    /// Returns the report phase this failure is attributed to
    pub fn phase(&self) -> SyncPhase {
        match self {
            SyncFailure::LockContention { .. } => SyncPhase::Lock,
            SyncFailure::AuthenticationBackoff { .. }
            | SyncFailure::AuthenticationFailure(_)
            | SyncFailure::ProjectBinding { .. } => SyncPhase::Session,
            SyncFailure::RemoteItemFailure { .. }
            | SyncFailure::ScanFailure(_)
            | SyncFailure::PersistenceFailure(_)
            | SyncFailure::InvalidRequest(_) => SyncPhase::SyncException,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidTarget("domain must not be blank".to_string());
        assert_eq!(err.to_string(), "Invalid target: domain must not be blank");

        let err = RemoteCallError::Server {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Server error (503): unavailable");

        let err = SyncFailure::AuthenticationBackoff {
            failures: 3,
            retry_after: Utc.with_ymd_and_hms(2026, 3, 10, 12, 5, 0).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication temporarily disabled due to 3 consecutive failures. Will retry after 2026-03-10 12:05:00 UTC"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = RemoteCallError::NotFound("script 7".to_string());
        let err2 = RemoteCallError::NotFound("script 7".to_string());
        let err3 = RemoteCallError::NotFound("script 8".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_phase_mapping() {
        let lock = SyncFailure::LockContention {
            target: "1:d/p".to_string(),
        };
        assert_eq!(lock.phase(), SyncPhase::Lock);

        let auth = SyncFailure::AuthenticationFailure("invalid credentials".to_string());
        assert_eq!(auth.phase(), SyncPhase::Session);

        let bind = SyncFailure::ProjectBinding {
            domain: "d".to_string(),
            project: "p".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(bind.phase(), SyncPhase::Session);

        let scan = SyncFailure::ScanFailure("tree listing failed".to_string());
        assert_eq!(scan.phase(), SyncPhase::SyncException);

        let invalid: SyncFailure = DomainError::InvalidRef("blank".to_string()).into();
        assert_eq!(invalid.phase(), SyncPhase::SyncException);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(SyncPhase::Lock.as_str(), "LOCK");
        assert_eq!(SyncPhase::Session.as_str(), "SESSION");
        assert_eq!(SyncPhase::SyncException.to_string(), "SYNC_EXCEPTION");
    }
}
