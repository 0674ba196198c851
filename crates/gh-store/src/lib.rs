//! `gh-store`: treat a hosted issue tracker as a durable, auditable JSON object store.
//!
//! This crate holds the replay/alias/dedup/access-control logic built on top
//! of [`gh_store_core`]; it is transport-agnostic — callers supply a
//! [`gateway::RepoGateway`] implementation talking to whichever tracker API
//! they use.

pub mod access;
pub mod alias;
pub mod config;
pub mod dedup;
pub mod error;
pub mod gateway;
pub mod issue_store;
pub mod processor;
pub mod retry;
pub mod snapshot;
pub mod store;

pub use access::AccessControl;
pub use alias::AliasResolver;
pub use config::StoreConfig;
pub use dedup::{DeduplicationSummary, Deduplicator, DeprecationReason, DuplicateReport};
pub use error::{Result, StoreError};
pub use gateway::RepoGateway;
pub use issue_store::IssueStore;
pub use processor::UpdateProcessor;
pub use snapshot::Snapshot;
pub use store::Store;

/// Identifies this crate as the author of a system envelope's `client_version`
/// field.
pub const CLIENT_VERSION: &str = concat!("gh-store/", env!("CARGO_PKG_VERSION"));
