//! ScriptMirror Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `InventoryEntry`, `Inventory`, `TargetKey`, `ChangeSet`,
//!   `ChangeRecord`, `SyncReport`
//! - **Port definitions** - Traits for adapters: `IRemoteScriptSystem`,
//!   `ISourceRepository`, `IStateStore`, `IScriptPackager`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`scriptmirror-store`, `scriptmirror-remote`), and the sync engine in
//! `scriptmirror-sync` orchestrates domain entities through those ports.

pub mod config;
pub mod domain;
pub mod ports;
