//! State store port (driven/secondary port)
//!
//! Persists the previous inventory per target, provides the cross-process
//! sync lock, and keeps an audit of sync runs.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific and
//!   don't need domain-level classification.
//! - `save` replaces the whole snapshot for a target atomically.
//! - `acquire_lock` never blocks: it reports whether the lock was taken.

use crate::domain::{Inventory, SyncRun, TargetKey};

#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    /// Loads the persisted inventory for a target (empty when never synced)
    async fn load(&self, target: &TargetKey) -> anyhow::Result<Inventory>;

    /// Atomically replaces the persisted inventory for a target
    async fn save(&self, target: &TargetKey, inventory: &Inventory) -> anyhow::Result<()>;

    /// Tries to take the sync lock; `Ok(false)` when another holder has it
    async fn acquire_lock(&self, target: &TargetKey) -> anyhow::Result<bool>;

    /// Releases the sync lock (no-op when not held)
    async fn release_lock(&self, target: &TargetKey) -> anyhow::Result<()>;

    /// Appends a sync-run audit row
    async fn record_run(&self, run: &SyncRun) -> anyhow::Result<()>;

    /// Most recent runs for a target, newest first
    async fn recent_runs(&self, target: &TargetKey, limit: u32) -> anyhow::Result<Vec<SyncRun>>;
}
