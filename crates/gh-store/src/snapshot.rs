//! The on-disk snapshot file format: a point-in-time export of every object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use gh_store_core::StoredObject;

/// One object's entry within a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotObject {
    /// The object's data.
    pub data: Value,
    /// The object's metadata, serialized without `object_id`/`issue_number`
    /// (the map key and the tracker already carry those).
    pub meta: SnapshotMeta,
}

/// Metadata carried in a snapshot entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Anchor creation time, RFC3339.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Latest consumed update time, RFC3339.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Consumed-comment count plus one.
    pub version: u64,
}

/// A point-in-time view of every object in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When this snapshot was taken.
    #[serde(with = "time::serde::rfc3339")]
    pub snapshot_time: OffsetDateTime,
    /// `<owner>/<repo>`.
    pub repository: String,
    /// Every object's data and metadata, keyed by object id.
    pub objects: BTreeMap<String, SnapshotObject>,
}

impl Snapshot {
    /// Build a snapshot from a repository slug and a list of objects taken at `now`.
    #[must_use]
    pub fn from_objects(repository: String, now: OffsetDateTime, objects: Vec<StoredObject>) -> Self {
        let objects = objects
            .into_iter()
            .map(|obj| {
                (
                    obj.meta.object_id,
                    SnapshotObject {
                        data: obj.data,
                        meta: SnapshotMeta {
                            created_at: obj.meta.created_at,
                            updated_at: obj.meta.updated_at,
                            version: obj.meta.version,
                        },
                    },
                )
            })
            .collect();
        Self {
            snapshot_time: now,
            repository,
            objects,
        }
    }

    /// Merge newer objects into this snapshot in place, replacing any entry
    /// with the same id and inserting new ones, then rewriting `snapshot_time`.
    pub fn update(&mut self, now: OffsetDateTime, newer: Vec<StoredObject>) {
        for obj in newer {
            self.objects.insert(
                obj.meta.object_id,
                SnapshotObject {
                    data: obj.data,
                    meta: SnapshotMeta {
                        created_at: obj.meta.created_at,
                        updated_at: obj.meta.updated_at,
                        version: obj.meta.version,
                    },
                },
            );
        }
        self.snapshot_time = now;
    }

    /// Parse a snapshot from its JSON text form.
    ///
    /// # Errors
    /// Returns an error if the text is not valid JSON or does not match the schema.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize this snapshot to its JSON text form.
    ///
    /// # Errors
    /// Returns an error if serialization fails (should not happen for this type).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
