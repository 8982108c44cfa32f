//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The sync engine depends on these traits; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteScriptSystem`] - Session-authenticated script server (login, folders, upload, delete)
//! - [`ISourceRepository`] - Repository tree, per-path version stamps and archives
//! - [`IStateStore`] - Persisted previous inventory, sync lock and sync-run audit
//! - [`IScriptPackager`] - Temporary archive preparation for uploads

pub mod packager;
pub mod remote_system;
pub mod source_repository;
pub mod state_store;

pub use packager::{IScriptPackager, PackagedUnit};
pub use remote_system::{IRemoteScriptSystem, RemoteFolder, RemoteUnit};
pub use source_repository::{ISourceRepository, TreeItem, TreeItemKind, VersionStamp};
pub use state_store::IStateStore;
