//! Domain entities and business logic
//!
//! This module contains the core domain types for ScriptMirror:
//! - Target keys identifying one synchronization destination
//! - Inventory entries (tracked script units and their version stamps)
//! - Change sets, change records and the externally visible sync report
//! - Remote path naming rules
//! - Domain-specific error types

pub mod change;
pub mod errors;
pub mod inventory;
pub mod paths;
pub mod report;
pub mod target;

// Re-export commonly used types
pub use change::{ChangeAction, ChangeRecord, ChangeSet, ChangeStatus};
pub use errors::{DomainError, RemoteCallError, SyncFailure, SyncPhase};
pub use inventory::{Inventory, InventoryEntry};
pub use paths::UnitLocation;
pub use report::{CategorizedChanges, SyncReport, SyncRun, SyncSummary};
pub use target::{SyncRequest, TargetKey};
