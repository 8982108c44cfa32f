//! In-memory port implementations for unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use scriptmirror_core::domain::{Inventory, InventoryEntry, RemoteCallError, SyncRun, TargetKey};
use scriptmirror_core::ports::{
    IRemoteScriptSystem, IScriptPackager, ISourceRepository, IStateStore, PackagedUnit,
    RemoteFolder, RemoteUnit, TreeItem, TreeItemKind, VersionStamp,
};

use crate::session::Clock;

const COMMITTED_AT: &str = "2026-03-01T08:00:00Z";
const PACKAGE_ROOT: &str = "/mock-packages";

// ============================================================================
// Clock
// ============================================================================

pub struct ManualClock {
    start: DateTime<Utc>,
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        Self {
            start,
            now: Mutex::new(start),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn advance_secs(&self, seconds: i64) {
        *self.now.lock().unwrap() += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Remote script system
// ============================================================================

pub struct MockRemote {
    calls: Mutex<Vec<String>>,
    login_results: Mutex<VecDeque<Result<bool, RemoteCallError>>>,
    bind_error: Mutex<Option<RemoteCallError>>,
    folders: Mutex<Vec<RemoteFolder>>,
    list_folders_fails: AtomicBool,
    failing_uploads: Mutex<HashMap<String, String>>,
    failing_deletes: Mutex<HashSet<i64>>,
    created: Mutex<Vec<(String, String)>>,
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<i64>>,
    next_id: AtomicI64,
    next_folder_id: AtomicI64,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            login_results: Mutex::new(VecDeque::new()),
            bind_error: Mutex::new(None),
            folders: Mutex::new(vec![RemoteFolder {
                id: 1,
                parent_id: 0,
                name: "Subject".to_string(),
                full_path: "Subject".to_string(),
            }]),
            list_folders_fails: AtomicBool::new(false),
            failing_uploads: Mutex::new(HashMap::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            created: Mutex::new(Vec::new()),
            uploaded: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
            next_folder_id: AtomicI64::new(100),
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    /// Queues the outcome of the next login; logins succeed once drained
    pub fn push_login_result(&self, result: Result<bool, RemoteCallError>) {
        self.login_results.lock().unwrap().push_back(result);
    }

    pub fn fail_bind(&self, error: RemoteCallError) {
        *self.bind_error.lock().unwrap() = Some(error);
    }

    pub fn add_folder(&self, full_path: &str) {
        let mut folders = self.folders.lock().unwrap();
        let id = folders.len() as i64 + 1;
        folders.push(RemoteFolder {
            id,
            parent_id: 1,
            name: full_path.rsplit('\\').next().unwrap_or(full_path).to_string(),
            full_path: full_path.to_string(),
        });
    }

    pub fn fail_list_folders(&self) {
        self.list_folders_fails.store(true, Ordering::SeqCst);
    }

    /// Makes the upload of the unit at `unit_path` fail
    pub fn fail_upload(&self, unit_path: &str) {
        self.fail_upload_with(unit_path, "upload rejected".to_string());
    }

    pub fn fail_upload_with(&self, unit_path: &str, message: String) {
        self.failing_uploads
            .lock()
            .unwrap()
            .insert(unit_path.to_string(), message);
    }

    pub fn fail_delete(&self, id: i64) {
        self.failing_deletes.lock().unwrap().insert(id);
    }

    pub fn created_folders(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn uploaded_folders(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<i64> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IRemoteScriptSystem for MockRemote {
    async fn login(&self, _user: &str, _secret: &str, _use_token: bool) -> Result<bool, RemoteCallError> {
        self.record("login");
        self.login_results.lock().unwrap().pop_front().unwrap_or(Ok(true))
    }

    async fn logout(&self) -> Result<(), RemoteCallError> {
        self.record("logout");
        Ok(())
    }

    async fn bind_project(&self, _domain: &str, _project: &str) -> Result<(), RemoteCallError> {
        self.record("bind_project");
        match self.bind_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn list_units(&self, _domain: &str, _project: &str) -> Result<Vec<RemoteUnit>, RemoteCallError> {
        self.record("list_units");
        Ok(Vec::new())
    }

    async fn upload_unit(
        &self,
        _domain: &str,
        _project: &str,
        folder_path: &str,
        archive: &Path,
    ) -> Result<RemoteUnit, RemoteCallError> {
        self.record("upload_unit");
        let unit_path = archive
            .strip_prefix(PACKAGE_ROOT)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(message) = self.failing_uploads.lock().unwrap().get(&unit_path) {
            return Err(RemoteCallError::Server {
                status: 500,
                message: message.clone(),
            });
        }
        self.uploaded.lock().unwrap().push(folder_path.to_string());
        Ok(RemoteUnit {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: unit_path,
            folder_path: folder_path.to_string(),
        })
    }

    async fn delete_unit(&self, _domain: &str, _project: &str, id: i64) -> Result<(), RemoteCallError> {
        self.record("delete_unit");
        if self.failing_deletes.lock().unwrap().contains(&id) {
            return Err(RemoteCallError::NotFound(format!("delete script {}: gone", id)));
        }
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }

    async fn list_folders(&self, _domain: &str, _project: &str) -> Result<Vec<RemoteFolder>, RemoteCallError> {
        self.record("list_folders");
        if self.list_folders_fails.load(Ordering::SeqCst) {
            return Err(RemoteCallError::Transport("list folders: connection reset".to_string()));
        }
        Ok(self.folders.lock().unwrap().clone())
    }

    async fn create_folder(
        &self,
        _domain: &str,
        _project: &str,
        parent_path: &str,
        name: &str,
    ) -> Result<RemoteFolder, RemoteCallError> {
        self.record("create_folder");
        self.created
            .lock()
            .unwrap()
            .push((parent_path.to_string(), name.to_string()));
        Ok(RemoteFolder {
            id: self.next_folder_id.fetch_add(1, Ordering::SeqCst),
            parent_id: 1,
            name: name.to_string(),
            full_path: format!("{}\\{}", parent_path, name),
        })
    }
}

// ============================================================================
// Source repository
// ============================================================================

/// Decrements the in-flight counter when a lookup ends or is aborted
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSource {
    items: Mutex<Vec<TreeItem>>,
    versions: Mutex<HashMap<String, VersionStamp>>,
    failing_versions: Mutex<HashSet<String>>,
    tree_fails: AtomicBool,
    tree_pages: Mutex<Vec<u32>>,
    tree_gate: Mutex<Option<Arc<Notify>>>,
    archives: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<(String, String)>>,
    version_delay: Mutex<Option<Duration>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            versions: Mutex::new(HashMap::new()),
            failing_versions: Mutex::new(HashSet::new()),
            tree_fails: AtomicBool::new(false),
            tree_pages: Mutex::new(Vec::new()),
            tree_gate: Mutex::new(None),
            archives: Mutex::new(HashMap::new()),
            downloads: Mutex::new(Vec::new()),
            version_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn push_item(&self, path: &str, kind: TreeItemKind) {
        self.items.lock().unwrap().push(TreeItem {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            kind,
        });
    }

    /// Adds a `.usr` blob; its directory resolves to `sha` (empty stamp when blank)
    pub fn add_marker(&self, marker_path: &str, sha: &str) {
        self.push_item(marker_path, TreeItemKind::Blob);
        if let Some((dir, _)) = marker_path.rsplit_once('/') {
            let stamp = if sha.is_empty() {
                VersionStamp::default()
            } else {
                VersionStamp {
                    sha: sha.to_string(),
                    committed_at: COMMITTED_AT.to_string(),
                }
            };
            self.versions.lock().unwrap().insert(dir.to_string(), stamp);
            self.archives
                .lock()
                .unwrap()
                .entry(dir.to_string())
                .or_insert_with(|| b"PK\x03\x04".to_vec());
        }
    }

    pub fn add_file(&self, path: &str) {
        self.push_item(path, TreeItemKind::Blob);
    }

    pub fn add_dir(&self, path: &str) {
        self.push_item(path, TreeItemKind::Tree);
    }

    pub fn fail_version(&self, unit_path: &str) {
        self.failing_versions.lock().unwrap().insert(unit_path.to_string());
    }

    pub fn fail_tree(&self) {
        self.tree_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_tree_gate(&self, gate: Arc<Notify>) {
        *self.tree_gate.lock().unwrap() = Some(gate);
    }

    pub fn set_version_delay(&self, delay: Duration) {
        *self.version_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_archive(&self, unit_path: &str, bytes: Vec<u8>) {
        self.archives.lock().unwrap().insert(unit_path.to_string(), bytes);
    }

    pub fn tree_pages(&self) -> Vec<u32> {
        self.tree_pages.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, String)> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ISourceRepository for MockSource {
    async fn list_tree(
        &self,
        _project_id: u64,
        _git_ref: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<TreeItem>, RemoteCallError> {
        self.tree_pages.lock().unwrap().push(page);
        let gate = self.tree_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.tree_fails.load(Ordering::SeqCst) {
            return Err(RemoteCallError::Server {
                status: 503,
                message: "list tree: upstream down".to_string(),
            });
        }

        let items = self.items.lock().unwrap();
        let start = ((page.saturating_sub(1)) * per_page) as usize;
        let end = (start + per_page as usize).min(items.len());
        Ok(items.get(start..end).map(<[TreeItem]>::to_vec).unwrap_or_default())
    }

    async fn latest_version(
        &self,
        _project_id: u64,
        _git_ref: &str,
        path: &str,
    ) -> Result<Option<VersionStamp>, RemoteCallError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.version_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_versions.lock().unwrap().contains(path) {
            return Err(RemoteCallError::Transport(format!("latest commit of {}: timed out", path)));
        }
        Ok(self.versions.lock().unwrap().get(path).cloned())
    }

    async fn download_archive(
        &self,
        _project_id: u64,
        sha: &str,
        path: &str,
    ) -> Result<Vec<u8>, RemoteCallError> {
        self.downloads
            .lock()
            .unwrap()
            .push((sha.to_string(), path.to_string()));
        self.archives
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteCallError::NotFound(format!("download archive of {}: 404", path)))
    }
}

// ============================================================================
// Packager
// ============================================================================

pub struct MockPackager {
    failing: Mutex<HashSet<String>>,
    packaged: AtomicUsize,
    cleaned: AtomicUsize,
}

impl MockPackager {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            packaged: AtomicUsize::new(0),
            cleaned: AtomicUsize::new(0),
        }
    }

    pub fn fail_for(&self, unit_path: &str) {
        self.failing.lock().unwrap().insert(unit_path.to_string());
    }

    /// Number of package attempts
    pub fn packaged(&self) -> usize {
        self.packaged.load(Ordering::SeqCst)
    }

    pub fn cleaned(&self) -> usize {
        self.cleaned.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IScriptPackager for MockPackager {
    async fn package(&self, _source_project_id: u64, entry: &InventoryEntry) -> anyhow::Result<PackagedUnit> {
        self.packaged.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&entry.path) {
            return Err(anyhow!("archive download failed"));
        }
        Ok(PackagedUnit {
            archive_path: PathBuf::from(PACKAGE_ROOT).join(&entry.path),
            temp_dir: tempfile::tempdir()?,
        })
    }

    async fn cleanup(&self, _unit: PackagedUnit) {
        self.cleaned.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// State store
// ============================================================================

pub struct MemoryStore {
    inventories: Mutex<HashMap<TargetKey, Inventory>>,
    locks: Mutex<HashSet<TargetKey>>,
    runs: Mutex<Vec<SyncRun>>,
    save_fails: AtomicBool,
    record_fails: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inventories: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashSet::new()),
            runs: Mutex::new(Vec::new()),
            save_fails: AtomicBool::new(false),
            record_fails: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn put_inventory(&self, target: &TargetKey, inventory: Inventory) {
        self.inventories
            .lock()
            .unwrap()
            .insert(target.clone(), inventory);
    }

    pub fn inventory(&self, target: &TargetKey) -> Option<Inventory> {
        self.inventories.lock().unwrap().get(target).cloned()
    }

    pub fn hold_lock(&self, target: &TargetKey) {
        self.locks.lock().unwrap().insert(target.clone());
    }

    pub fn is_locked(&self, target: &TargetKey) -> bool {
        self.locks.lock().unwrap().contains(target)
    }

    pub fn fail_saves(&self) {
        self.save_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_record_run(&self) {
        self.record_fails.store(true, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IStateStore for MemoryStore {
    async fn load(&self, target: &TargetKey) -> anyhow::Result<Inventory> {
        Ok(self.inventory(target).unwrap_or_default())
    }

    async fn save(&self, target: &TargetKey, inventory: &Inventory) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.save_fails.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        self.put_inventory(target, inventory.clone());
        Ok(())
    }

    async fn acquire_lock(&self, target: &TargetKey) -> anyhow::Result<bool> {
        Ok(self.locks.lock().unwrap().insert(target.clone()))
    }

    async fn release_lock(&self, target: &TargetKey) -> anyhow::Result<()> {
        self.locks.lock().unwrap().remove(target);
        Ok(())
    }

    async fn record_run(&self, run: &SyncRun) -> anyhow::Result<()> {
        if self.record_fails.load(Ordering::SeqCst) {
            return Err(anyhow!("disk full"));
        }
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn recent_runs(&self, target: &TargetKey, limit: u32) -> anyhow::Result<Vec<SyncRun>> {
        Ok(self
            .runs()
            .into_iter()
            .rev()
            .filter(|run| &run.target == target)
            .take(limit as usize)
            .collect())
    }
}
