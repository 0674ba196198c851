//! IssueStore (C4): CRUD over a single issue as the anchor of one object.

use std::sync::Arc;

use gh_store_core::envelope::{self, EnvelopeType, UpdateEnvelope, UpdateMode};
use gh_store_core::label;
use gh_store_core::{HistoryEntry, ObjectMeta, StoredObject};
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::{ReactionsConfig, StoreSection};
use crate::error::{Result, StoreError};
use crate::gateway::{Issue, IssueEdit, IssueQueryState, IssueState, ListIssuesQuery, RepoGateway};
use crate::retry::with_retry;

const CANONICAL_COLOR: &str = "0e8a16";
const ALIAS_COLOR: &str = "fbca04";
const DEPRECATED_COLOR: &str = "d4c5f9";
const ARCHIVED_COLOR: &str = "cfd3d7";
const BASE_COLOR: &str = "1d76db";

/// CRUD over the anchor issue for one object.
pub struct IssueStore<G: RepoGateway> {
    gateway: Arc<G>,
    config: StoreSection,
}

impl<G: RepoGateway> IssueStore<G> {
    /// Build a new `IssueStore` over the given gateway and configuration.
    #[must_use]
    pub fn new(gateway: Arc<G>, config: StoreSection) -> Self {
        Self { gateway, config }
    }

    fn retry_config(&self) -> crate::config::RetryConfig {
        self.config.retries
    }

    /// Ensure the store's special labels exist on the repository, creating
    /// any that are missing with a default color.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the label listing or creation fails.
    pub async fn ensure_labels_exist(&self) -> Result<()> {
        let existing = with_retry(&self.retry_config(), || self.gateway.list_labels())
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        let existing: std::collections::HashSet<_> = existing.into_iter().collect();

        let wanted = [
            (self.config.base_label.as_str(), BASE_COLOR, None),
            (label::CANONICAL_LABEL, CANONICAL_COLOR, Some("Canonical anchor among duplicates")),
            (label::ALIAS_LABEL, ALIAS_COLOR, Some("Redirects to a canonical anchor")),
            (label::DEPRECATED_LABEL, DEPRECATED_COLOR, Some("Superseded by another anchor")),
            (label::ARCHIVED_LABEL, ARCHIVED_COLOR, Some("Soft-deleted, excluded from listings")),
        ];

        for (name, color, description) in wanted {
            if !existing.contains(name) {
                with_retry(&self.retry_config(), || self.gateway.create_label(name, color, description))
                    .await
                    .map_err(|e| StoreError::Transport(e.into()))?;
            }
        }
        Ok(())
    }

    /// Create a new anchor issue for `id` with `data` as its initial state.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateUid`] if a non-deprecated anchor with
    /// this uid already exists, or [`StoreError::Transport`] on gateway failure.
    pub async fn create_anchor(&self, id: &str, data: Value) -> Result<StoredObject> {
        if let Ok(existing) = self.find_anchor(id).await {
            return Err(StoreError::DuplicateUid(id.to_string(), existing.number));
        }

        self.ensure_labels_exist().await?;

        let labels = label::query_labels(&self.config.base_label, &self.config.uid_prefix, id);
        let body = serde_json::to_string_pretty(&data).map_err(|e| StoreError::Transport(e.into()))?;
        let title = format!("Stored Object: {id}");
        let issue = with_retry(&self.retry_config(), || self.gateway.create_issue(&title, &body, &labels))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        let envelope = UpdateEnvelope::encode(
            Value::Object(serde_json::Map::new()),
            UpdateMode::Replace,
            Some(EnvelopeType::InitialState),
            crate::CLIENT_VERSION,
            issue.created_at,
        );
        let envelope_body = serde_json::to_string(&envelope).map_err(|e| StoreError::Transport(e.into()))?;
        let comment = with_retry(&self.retry_config(), || self.gateway.create_comment(issue.number, &envelope_body))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        mark_processed(&self.gateway, &self.retry_config(), &self.config.reactions, comment.id).await?;
        with_retry(&self.retry_config(), || self.gateway.create_reaction(comment.id, &self.config.reactions.initial_state))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        with_retry(&self.retry_config(), || {
            self.gateway.edit_issue(
                issue.number,
                IssueEdit {
                    state: Some(IssueState::Closed),
                    ..IssueEdit::default()
                },
            )
        })
        .await
        .map_err(|e| StoreError::Transport(e.into()))?;

        Ok(StoredObject {
            meta: ObjectMeta {
                object_id: id.to_string(),
                created_at: issue.created_at,
                updated_at: issue.created_at,
                version: 1,
                issue_number: issue.number,
            },
            data,
        })
    }

    /// Locate the anchor issue for `id`. Queries `state=closed` first and
    /// falls back to `state=all`, since anchors spend almost all their time
    /// closed and the fallback only costs a second request in the rare case.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if no anchor carries this uid.
    pub async fn find_anchor(&self, id: &str) -> Result<Issue> {
        let labels = label::query_labels(&self.config.base_label, &self.config.uid_prefix, id);

        let closed_query = ListIssuesQuery::with_labels(labels.clone()).state(IssueQueryState::Closed);
        let mut candidates = with_retry(&self.retry_config(), || self.gateway.list_issues(&closed_query))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        if candidates.is_empty() {
            let all_query = ListIssuesQuery::with_labels(labels).state(IssueQueryState::All);
            candidates = with_retry(&self.retry_config(), || self.gateway.list_issues(&all_query))
                .await
                .map_err(|e| StoreError::Transport(e.into()))?;
        }

        if candidates.is_empty() {
            return Err(StoreError::ObjectNotFound(id.to_string()));
        }

        if candidates.len() > 1 {
            if let Some(canonical) = candidates.iter().find(|i| i.labels.iter().any(|l| l == label::CANONICAL_LABEL)) {
                return Ok(canonical.clone());
            }
            candidates.sort_by_key(|i| i.number);
            tracing::warn!(id, count = candidates.len(), "multiple anchors share a uid; picking the oldest");
        }

        candidates.into_iter().next().ok_or_else(|| StoreError::ObjectNotFound(id.to_string()))
    }

    /// Fetch an issue by its number. Performs no alias redirection; callers
    /// that need the canonical issue resolve it first via
    /// [`crate::alias::AliasResolver::resolve_canonical`].
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the gateway call fails.
    pub async fn get_issue(&self, number: u64) -> Result<Issue> {
        with_retry(&self.retry_config(), || self.gateway.get_issue(number))
            .await
            .map_err(|e| StoreError::Transport(e.into()))
    }

    /// Materialize a [`StoredObject`] from an already-fetched anchor issue.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the body is not valid JSON or the
    /// comment count cannot be fetched.
    pub async fn read_object(&self, issue: &Issue) -> Result<StoredObject> {
        let data: Value = serde_json::from_str(&issue.body).map_err(|e| StoreError::Transport(e.into()))?;
        let comments = with_retry(&self.retry_config(), || self.gateway.list_comments(issue.number))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        let object_id = label::extract_uid(&self.config.uid_prefix, &issue.labels)
            .map_err(|_| StoreError::ObjectNotFound(issue.number.to_string()))?
            .to_string();
        Ok(StoredObject {
            meta: ObjectMeta {
                object_id,
                created_at: issue.created_at,
                updated_at: issue.updated_at,
                version: u64::try_from(comments.len()).unwrap_or(u64::MAX) + 1,
                issue_number: issue.number,
            },
            data,
        })
    }

    /// Overwrite the anchor's body and close it.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if serialization or the gateway call fails.
    pub async fn write_body(&self, issue_number: u64, data: &Value) -> Result<()> {
        let body = serde_json::to_string_pretty(data).map_err(|e| StoreError::Transport(e.into()))?;
        with_retry(&self.retry_config(), || {
            self.gateway.edit_issue(
                issue_number,
                IssueEdit {
                    body: Some(body.clone()),
                    state: Some(IssueState::Closed),
                    ..IssueEdit::default()
                },
            )
        })
        .await
        .map_err(|e| StoreError::Transport(e.into()))
    }

    /// Reopen the anchor so the next process cycle picks up a new update.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the gateway call fails.
    pub async fn reopen(&self, issue_number: u64) -> Result<()> {
        with_retry(&self.retry_config(), || {
            self.gateway.edit_issue(
                issue_number,
                IssueEdit {
                    state: Some(IssueState::Open),
                    ..IssueEdit::default()
                },
            )
        })
        .await
        .map_err(|e| StoreError::Transport(e.into()))
    }

    /// Soft-delete: add `archived`, remove the base label, close the anchor.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if `id` has no anchor.
    pub async fn archive(&self, id: &str) -> Result<()> {
        let issue = self.find_anchor(id).await?;
        let archived_label = vec![label::ARCHIVED_LABEL.to_string()];
        with_retry(&self.retry_config(), || self.gateway.add_labels(issue.number, &archived_label))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        with_retry(&self.retry_config(), || self.gateway.remove_label(issue.number, &self.config.base_label))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        with_retry(&self.retry_config(), || {
            self.gateway.edit_issue(
                issue.number,
                IssueEdit {
                    state: Some(IssueState::Closed),
                    ..IssueEdit::default()
                },
            )
        })
        .await
        .map_err(|e| StoreError::Transport(e.into()))
    }

    /// Decode every comment on the anchor chronologically. Malformed comments
    /// are skipped with a warning rather than failing the whole call.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the comment listing fails.
    pub async fn history(&self, issue: &Issue) -> Result<Vec<HistoryEntry>> {
        let comments = with_retry(&self.retry_config(), || self.gateway.list_comments(issue.number))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        let mut entries = Vec::with_capacity(comments.len());
        for comment in comments {
            match envelope::decode(&comment.body, comment.created_at, comment.id) {
                Ok(parsed) => {
                    let timestamp = envelope::effective_timestamp(&parsed, comment.created_at);
                    entries.push(HistoryEntry {
                        timestamp,
                        r#type: parsed.r#type,
                        data: parsed.data,
                        comment_id: parsed.comment_id,
                        metadata: parsed.meta,
                    });
                }
                Err(err) => {
                    tracing::warn!(comment_id = comment.id, error = %err, "skipping malformed comment in history");
                }
            }
        }
        Ok(entries)
    }

    /// Whether `issue` is an alias per its labels.
    #[must_use]
    pub fn is_alias(&self, issue: &Issue) -> bool {
        issue.labels.iter().any(|l| l == label::ALIAS_LABEL)
    }

    /// The canonical issue number an alias points to, if any.
    #[must_use]
    pub fn alias_target(&self, issue: &Issue) -> Option<u64> {
        label::find_alias_target(&issue.labels)
    }
}

async fn mark_processed<G: RepoGateway>(
    gateway: &Arc<G>,
    retry: &crate::config::RetryConfig,
    reactions: &ReactionsConfig,
    comment_id: u64,
) -> Result<()> {
    with_retry(retry, || gateway.create_reaction(comment_id, &reactions.processed))
        .await
        .map_err(|e| StoreError::Transport(e.into()))
}

/// The current instant, for stamping system comments that have no anchor
/// creation time to reuse.
#[must_use]
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
