//! The public error surface and its retry/skip/surface disposition.

use thiserror::Error;

/// Errors surfaced to callers of the [`crate::Store`] façade.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `get`/`update`/`delete`/`history` found no anchor for the given id.
    #[error("no object found for id {0:?}")]
    ObjectNotFound(String),

    /// `create` found a non-deprecated anchor already carrying this uid.
    #[error("object {0:?} already exists (issue #{1})")]
    DuplicateUid(String, u64),

    /// `update` was called while the anchor was already open (a process cycle is pending).
    #[error("anchor for {0:?} has a pending update; process it before posting another")]
    ConcurrentUpdate(String),

    /// `process` refused to run because the anchor's creator is not authorized.
    #[error("anchor issue #{0} was not created by an authorized author")]
    AccessDenied(u64),

    /// An alias operation was attempted against an id that is already an alias.
    #[error("{0:?} is already an alias")]
    AliasedObjectError(String),

    /// Alias resolution detected a cycle it could not resolve.
    #[error("circular alias reference detected while resolving {0:?}")]
    CircularReferenceError(String),

    /// A canonical-object invariant was violated.
    #[error("canonical object error: {0}")]
    CanonicalObjectError(String),

    /// A configuration file failed to load or parse.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Envelope decoding failed in a context where the caller needs to know.
    #[error("malformed comment body: {0}")]
    Malformed(#[from] gh_store_core::EnvelopeError),

    /// A gateway call failed for a reason other than rate limiting.
    #[error("repository gateway error")]
    Transport(#[source] anyhow::Error),
}

/// Convenience alias for [`StoreError`]-returning results.
pub type Result<T> = std::result::Result<T, StoreError>;
