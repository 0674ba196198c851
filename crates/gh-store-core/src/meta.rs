//! [`ObjectMeta`] and [`StoredObject`] — the envelope around every object's data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Metadata carried alongside every object's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// The caller-supplied identifier, without any label prefix.
    pub object_id: String,
    /// The anchor issue's creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// The latest consumed comment's timestamp, or `created_at` if none yet.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Count of consumed comments, plus one.
    pub version: u64,
    /// The anchor issue's number on the tracker.
    pub issue_number: u64,
}

/// An object as the store sees it: metadata plus the caller's arbitrary JSON tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object metadata.
    pub meta: ObjectMeta,
    /// The caller's data, as currently merged.
    pub data: Value,
}
