//! ScriptMirror Sync - Synchronization and session-resilience engine
//!
//! Provides:
//! - Change detection between a persisted and a freshly scanned inventory
//! - Failure-isolating upload/delete application against the remote system
//! - Failure-preserving reconciliation of the persisted inventory
//! - Login lifecycle with TTL, coalesced logins and failure backoff
//! - Per-target locking and initial/incremental mode selection
//!
//! ## Modules
//!
//! - [`analyzer`] - Pure previous/current inventory comparison
//! - [`reconciler`] - Builds the next persisted inventory from outcomes
//! - [`applier`] - Uploads and deletes with per-item failure isolation
//! - [`scanner`] - Repository walk with a bounded version-lookup pool
//! - [`session`] - Session guard and per-project bindings
//! - [`packager`] - Temporary upload artifacts
//! - [`coordinator`] - The `sync` entry point

pub mod analyzer;
pub mod applier;
pub mod coordinator;
pub mod packager;
pub mod reconciler;
pub mod scanner;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::analyze;
pub use applier::RemoteApplier;
pub use coordinator::SyncCoordinator;
pub use packager::ScriptPackager;
pub use reconciler::reconcile;
pub use scanner::{RepositoryScanner, ScanOutcome};
pub use session::{Clock, Credentials, SessionGuard, SessionSettings, SessionStatus, SystemClock};
