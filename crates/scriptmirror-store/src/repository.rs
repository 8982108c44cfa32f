//! SQLite implementation of IStateStore
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                                     |
//! |----------------------|----------|----------------------------------------------|
//! | source project id    | INTEGER  | `u64` checked into `i64`                      |
//! | remote object id     | INTEGER  | nullable                                     |
//! | DateTime<Utc>        | TEXT     | ISO 8601 via `to_rfc3339()`                   |
//! | run id               | TEXT     | UUID string chosen by the caller             |
//! | success              | INTEGER  | 0 / 1                                        |

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use scriptmirror_core::domain::{Inventory, InventoryEntry, SyncRun, SyncSummary, TargetKey};
use scriptmirror_core::ports::IStateStore;

use crate::StoreError;

/// SQLite-based implementation of the state store port
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// When the lock for `target` was taken, if it is currently held
    pub async fn locked_since(&self, target: &TargetKey) -> anyhow::Result<Option<DateTime<Utc>>> {
        let locked_at: Option<String> = sqlx::query_scalar(
            "SELECT locked_at FROM sync_lock \
             WHERE source_project_id = ? AND remote_domain = ? AND remote_project = ?",
        )
        .bind(project_id_to_sql(target.source_project_id())?)
        .bind(target.domain())
        .bind(target.project())
        .fetch_optional(&self.pool)
        .await?;

        match locked_at {
            Some(s) => Ok(Some(parse_datetime(&s)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn project_id_to_sql(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| {
        StoreError::SerializationError(format!("Source project id {} out of range", id))
    })
}

fn project_id_from_sql(id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| {
        StoreError::SerializationError(format!("Negative source project id {} in store", id))
    })
}

fn count_from_sql(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn sortable_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime stored either as RFC 3339 or in SQLite's default format
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn entry_from_row(row: &SqliteRow) -> InventoryEntry {
    let path: String = row.get("path");
    let version_stamp: String = row.get("version_stamp");
    let changed_at: String = row.get("changed_at");
    let remote_object_id: Option<i64> = row.get("remote_object_id");

    InventoryEntry::new(path, version_stamp, changed_at).with_remote_object_id(remote_object_id)
}

fn run_from_row(row: &SqliteRow) -> Result<SyncRun, StoreError> {
    let run_id: String = row.get("id");
    let source_project_id: i64 = row.get("source_project_id");
    let domain: String = row.get("remote_domain");
    let project: String = row.get("remote_project");
    let git_ref: String = row.get("git_ref");
    let started_at: String = row.get("started_at");
    let finished_at: String = row.get("finished_at");
    let success: bool = row.get("success");

    let target = TargetKey::new(project_id_from_sql(source_project_id)?, domain, project)
        .map_err(|e| StoreError::SerializationError(format!("Invalid stored target: {}", e)))?;

    Ok(SyncRun {
        run_id,
        target,
        git_ref,
        started_at: parse_datetime(&started_at)?,
        finished_at: parse_datetime(&finished_at)?,
        success,
        summary: SyncSummary {
            uploaded: count_from_sql(row.get("uploaded")),
            deleted: count_from_sql(row.get("deleted")),
            unchanged: count_from_sql(row.get("unchanged")),
            failed: count_from_sql(row.get("failed")),
        },
    })
}

// ============================================================================
// IStateStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateStore for SqliteStateStore {
    async fn load(&self, target: &TargetKey) -> anyhow::Result<Inventory> {
        let rows = sqlx::query(
            "SELECT path, version_stamp, changed_at, remote_object_id FROM sync_state \
             WHERE source_project_id = ? AND remote_domain = ? AND remote_project = ? \
             ORDER BY path",
        )
        .bind(project_id_to_sql(target.source_project_id())?)
        .bind(target.domain())
        .bind(target.project())
        .fetch_all(&self.pool)
        .await?;

        let inventory: Inventory = rows.iter().map(entry_from_row).collect();
        tracing::debug!(target = %target, entries = inventory.len(), "Loaded previous inventory");
        Ok(inventory)
    }

    async fn save(&self, target: &TargetKey, inventory: &Inventory) -> anyhow::Result<()> {
        let project_id = project_id_to_sql(target.source_project_id())?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM sync_state \
             WHERE source_project_id = ? AND remote_domain = ? AND remote_project = ?",
        )
        .bind(project_id)
        .bind(target.domain())
        .bind(target.project())
        .execute(&mut *tx)
        .await?;

        for entry in inventory {
            // duplicate paths keep the first occurrence
            sqlx::query(
                "INSERT OR IGNORE INTO sync_state \
                 (source_project_id, remote_domain, remote_project, path, \
                  version_stamp, changed_at, remote_object_id, last_synced_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(project_id)
            .bind(target.domain())
            .bind(target.project())
            .bind(&entry.path)
            .bind(&entry.version_stamp)
            .bind(&entry.changed_at)
            .bind(entry.remote_object_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(target = %target, entries = inventory.len(), "Saved inventory");
        Ok(())
    }

    async fn acquire_lock(&self, target: &TargetKey) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO sync_lock \
             (source_project_id, remote_domain, remote_project, locked_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(project_id_to_sql(target.source_project_id())?)
        .bind(target.domain())
        .bind(target.project())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let acquired = result.rows_affected() == 1;
        tracing::trace!(target = %target, acquired, "Sync lock acquisition");
        Ok(acquired)
    }

    async fn release_lock(&self, target: &TargetKey) -> anyhow::Result<()> {
        sqlx::query(
            "DELETE FROM sync_lock \
             WHERE source_project_id = ? AND remote_domain = ? AND remote_project = ?",
        )
        .bind(project_id_to_sql(target.source_project_id())?)
        .bind(target.domain())
        .bind(target.project())
        .execute(&self.pool)
        .await?;

        tracing::trace!(target = %target, "Sync lock released");
        Ok(())
    }

    async fn record_run(&self, run: &SyncRun) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sync_run \
             (id, source_project_id, remote_domain, remote_project, git_ref, \
              started_at, finished_at, success, uploaded, deleted, unchanged, failed) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.run_id)
        .bind(project_id_to_sql(run.target.source_project_id())?)
        .bind(run.target.domain())
        .bind(run.target.project())
        .bind(&run.git_ref)
        .bind(sortable_timestamp(&run.started_at))
        .bind(sortable_timestamp(&run.finished_at))
        .bind(run.success)
        .bind(run.summary.uploaded as i64)
        .bind(run.summary.deleted as i64)
        .bind(run.summary.unchanged as i64)
        .bind(run.summary.failed as i64)
        .execute(&self.pool)
        .await?;

        tracing::trace!(run_id = %run.run_id, "Recorded sync run");
        Ok(())
    }

    async fn recent_runs(&self, target: &TargetKey, limit: u32) -> anyhow::Result<Vec<SyncRun>> {
        let rows = sqlx::query(
            "SELECT * FROM sync_run \
             WHERE source_project_id = ? AND remote_domain = ? AND remote_project = ? \
             ORDER BY started_at DESC LIMIT ?",
        )
        .bind(project_id_to_sql(target.source_project_id())?)
        .bind(target.domain())
        .bind(target.project())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let runs = rows
            .iter()
            .map(run_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
