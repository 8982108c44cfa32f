//! ScriptMirror Remote - HTTP adapters
//!
//! Provides async clients for:
//! - The source repository (GitLab-compatible REST API v4)
//! - The remote script server (cookie-session `LoadTest/rest` API)
//!
//! ## Modules
//!
//! - [`repository`] - `ISourceRepository` over the repository REST API
//! - [`script_server`] - `IRemoteScriptSystem` over the script server API
//! - [`http`] - status and transport error mapping shared by both clients
//!
//! Every call returns [`scriptmirror_core::domain::RemoteCallError`], so the
//! sync engine can isolate failures per item by matching on the variant.

pub mod http;
pub mod repository;
pub mod script_server;

pub use repository::SourceRepositoryClient;
pub use script_server::ScriptServerClient;
