//! The `UpdateEnvelope` wire format and the tolerant decoder for comment bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// `append` merges recursively into the current state; `replace` overwrites it wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Recursive merge into the current state.
    Append,
    /// Whole-state overwrite.
    Replace,
}

/// The discriminator carried in `type`. Absent/`null` means a normal user update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    /// The seed comment written by `createAnchor`.
    InitialState,
    /// Written on a newly created alias issue.
    SystemAlias,
    /// Written on the canonical issue when an alias is created against it.
    SystemAliasReference,
    /// Written on a deprecated (loser) issue.
    SystemDeprecation,
    /// Written on the winning issue of a deduplication.
    SystemReference,
    /// Reserved for relationship bookkeeping between objects.
    SystemRelationship,
}

impl EnvelopeType {
    /// True for every variant except [`EnvelopeType::InitialState`] — the
    /// `system_`-prefixed discriminators the update processor must ignore
    /// when replaying.
    #[must_use]
    pub fn is_system(self) -> bool {
        !matches!(self, EnvelopeType::InitialState)
    }
}

/// `_meta` block of an [`UpdateEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    /// Producer version string, e.g. `"gh-store/0.1.0"`.
    pub client_version: String,
    /// RFC3339 UTC timestamp, stored as the raw string so a malformed value can
    /// be detected and degraded to the comment's `created_at` rather than
    /// failing the whole decode.
    pub timestamp: String,
    /// `append` or `replace`.
    pub update_mode: UpdateMode,
    /// Explicit system marker, independent of `type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

/// The serialized form of one update comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    /// User payload, or `{}`.
    #[serde(rename = "_data")]
    pub data: Value,
    /// Envelope metadata.
    #[serde(rename = "_meta")]
    pub meta: EnvelopeMeta,
    /// Discriminator; absent/null for a normal user update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<EnvelopeType>,
}

impl UpdateEnvelope {
    /// Build a new envelope, stamping `_meta.timestamp` at the given instant.
    #[must_use]
    pub fn encode(
        data: Value,
        mode: UpdateMode,
        envelope_type: Option<EnvelopeType>,
        client_version: &str,
        now: OffsetDateTime,
    ) -> Self {
        let timestamp = now
            .to_offset(time::UtcOffset::UTC)
            .format(&Rfc3339)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        Self {
            data,
            meta: EnvelopeMeta {
                client_version: client_version.to_string(),
                timestamp,
                update_mode: mode,
                system: envelope_type.map(EnvelopeType::is_system),
            },
            r#type: envelope_type,
        }
    }
}

/// A decoded comment, normalized from any of the three historical shapes.
#[derive(Debug, Clone)]
pub struct ParsedComment {
    /// User payload.
    pub data: Value,
    /// Envelope metadata (synthesized for legacy shapes).
    pub meta: EnvelopeMeta,
    /// Discriminator, if any.
    pub r#type: Option<EnvelopeType>,
    /// The tracker-assigned id of the comment this was decoded from.
    pub comment_id: u64,
}

/// Errors raised while decoding a comment body.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The comment body was not JSON at all.
    #[error("comment body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Legacy shape 2: `{"type": "initial_state", "data": <Json>, ...}`.
#[derive(Debug, Deserialize)]
struct LegacyInitialState {
    data: Value,
}

/// Decode a raw comment body into a [`ParsedComment`], tolerating three
/// historical shapes: the modern envelope, a legacy initial-state comment
/// with an inline `data` field, and a legacy update whose body is the
/// payload itself with no envelope at all.
///
/// # Errors
/// Returns [`EnvelopeError::Malformed`] if `raw_body` is not valid JSON at all.
/// A body that parses as JSON but does not match any known envelope shape is
/// treated as legacy shape 3 (the body *is* the payload) rather than an error.
pub fn decode(raw_body: &str, created_at: OffsetDateTime, comment_id: u64) -> Result<ParsedComment, EnvelopeError> {
    let value: Value = serde_json::from_str(raw_body)?;

    // Shape 1: modern envelope.
    if let Some(obj) = value.as_object() {
        if obj.contains_key("_data") && obj.contains_key("_meta") {
            let envelope: UpdateEnvelope = serde_json::from_value(value)?;
            return Ok(ParsedComment {
                data: envelope.data,
                meta: envelope.meta,
                r#type: envelope.r#type,
                comment_id,
            });
        }

        // Shape 2: legacy initial-state with inline `data`.
        if obj.get("type").and_then(Value::as_str) == Some("initial_state") {
            if let Ok(legacy) = serde_json::from_value::<LegacyInitialState>(value.clone()) {
                return Ok(ParsedComment {
                    data: legacy.data,
                    meta: legacy_meta(created_at, UpdateMode::Replace),
                    r#type: Some(EnvelopeType::InitialState),
                    comment_id,
                });
            }
        }
    }

    // Shape 3: legacy update, body is the payload itself.
    Ok(ParsedComment {
        data: value,
        meta: legacy_meta(created_at, UpdateMode::Append),
        r#type: None,
        comment_id,
    })
}

fn legacy_meta(created_at: OffsetDateTime, mode: UpdateMode) -> EnvelopeMeta {
    EnvelopeMeta {
        client_version: "legacy".to_string(),
        timestamp: created_at
            .to_offset(time::UtcOffset::UTC)
            .format(&Rfc3339)
            .unwrap_or_else(|_| created_at.unix_timestamp().to_string()),
        update_mode: mode,
        system: None,
    }
}

/// Resolve the instant a parsed comment should be ordered by: the strictly
/// parsed `_meta.timestamp`, falling back to the tracker's `created_at` if
/// absent or malformed.
#[must_use]
pub fn effective_timestamp(parsed: &ParsedComment, created_at: OffsetDateTime) -> OffsetDateTime {
    OffsetDateTime::parse(&parsed.meta.timestamp, &Rfc3339).unwrap_or(created_at)
}

/// `type` starts with `system_`, or `_meta.system == true`.
#[must_use]
pub fn is_system(parsed: &ParsedComment) -> bool {
    parsed.r#type.is_some_and(EnvelopeType::is_system) || parsed.meta.system == Some(true)
}

/// `type == initial_state`.
#[must_use]
pub fn is_initial_state(parsed: &ParsedComment) -> bool {
    parsed.r#type == Some(EnvelopeType::InitialState)
}
