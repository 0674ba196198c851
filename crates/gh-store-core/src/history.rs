//! [`HistoryEntry`] — one decoded comment in an object's audit trail.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::envelope::{EnvelopeMeta, EnvelopeType};

/// One entry in the history projection over an anchor's comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Effective timestamp of the comment, as computed by
    /// [`crate::envelope::effective_timestamp`].
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Envelope discriminator, if any.
    pub r#type: Option<EnvelopeType>,
    /// The payload carried by the comment.
    pub data: Value,
    /// The tracker-assigned comment id this entry was derived from.
    pub comment_id: u64,
    /// The full envelope metadata for this comment.
    pub metadata: EnvelopeMeta,
}
