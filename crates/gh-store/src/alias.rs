//! AliasResolver (C6): alias/canonicalization resolution and creation.

use std::sync::Arc;

use gh_store_core::envelope::{EnvelopeType, UpdateEnvelope, UpdateMode};
use gh_store_core::label;
use gh_store_core::{StoredObject, MAX_ALIAS_DEPTH};
use serde_json::{json, Value};

use crate::config::StoreSection;
use crate::error::{Result, StoreError};
use crate::gateway::{Issue, IssueEdit, IssueQueryState, ListIssuesQuery, RepoGateway};
use crate::issue_store::{self, IssueStore};
use crate::retry::with_retry;

/// Whether `issue` carries the `alias-object` label.
#[must_use]
pub fn is_alias(issue: &Issue) -> bool {
    issue.labels.iter().any(|l| l == label::ALIAS_LABEL)
}

/// Whether `issue` carries the `canonical-object` label.
#[must_use]
pub fn is_canonical(issue: &Issue) -> bool {
    issue.labels.iter().any(|l| l == label::CANONICAL_LABEL)
}

/// The issue number an alias points to, if `issue` is one.
#[must_use]
pub fn alias_target(issue: &Issue) -> Option<u64> {
    label::find_alias_target(&issue.labels)
}

/// Detects and resolves alias/canonicalization relationships.
pub struct AliasResolver<G: RepoGateway> {
    gateway: Arc<G>,
    config: StoreSection,
    issues: Arc<IssueStore<G>>,
}

impl<G: RepoGateway> AliasResolver<G> {
    /// Build a new `AliasResolver`.
    #[must_use]
    pub fn new(gateway: Arc<G>, config: StoreSection, issues: Arc<IssueStore<G>>) -> Self {
        Self { gateway, config, issues }
    }

    /// Resolve `id` to its canonical object id, bounded to [`MAX_ALIAS_DEPTH`]
    /// hops. Never errors: a cycle or missing anchor degrades to
    /// returning the last id reached.
    pub async fn resolve_canonical(&self, id: &str) -> String {
        self.resolve_canonical_depth(id, MAX_ALIAS_DEPTH).await
    }

    async fn resolve_canonical_depth(&self, id: &str, depth: u32) -> String {
        if depth == 0 {
            tracing::warn!(id, "alias resolution depth exhausted, treating as canonical");
            return id.to_string();
        }

        let Ok(issue) = self.issues.find_anchor(id).await else {
            return id.to_string();
        };

        if !is_alias(&issue) {
            return id.to_string();
        }

        let Some(target_number) = alias_target(&issue) else {
            return id.to_string();
        };

        let Ok(target_issue) = self.issues.get_issue(target_number).await else {
            return id.to_string();
        };

        let Ok(target_id) = label::extract_uid(&self.config.uid_prefix, &target_issue.labels) else {
            return id.to_string();
        };

        if target_id == id {
            return id.to_string();
        }

        Box::pin(self.resolve_canonical_depth(target_id, depth - 1)).await
    }

    /// Enumerate the issue numbers of every alias pointing at `issue_number`.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the underlying query fails.
    pub async fn find_aliases(&self, issue_number: u64) -> Result<Vec<Issue>> {
        let query = ListIssuesQuery::with_labels(vec![label::alias_to_label(issue_number)]).state(IssueQueryState::All);
        with_retry(&self.config.retries, || self.gateway.list_issues(&query))
            .await
            .map_err(|e| StoreError::Transport(e.into()))
    }

    /// Create a new alias issue for `alias_id` pointing at `canonical_id`.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if the canonical id has no
    /// anchor, [`StoreError::AliasedObjectError`] if `alias_id` is already an
    /// alias, or [`StoreError::CircularReferenceError`] if `alias_id` equals
    /// `canonical_id`.
    pub async fn create_alias(&self, canonical_id: &str, alias_id: &str) -> Result<StoredObject> {
        if canonical_id == alias_id {
            return Err(StoreError::CircularReferenceError(alias_id.to_string()));
        }

        let canonical_issue = self.issues.find_anchor(canonical_id).await?;

        if let Ok(existing) = self.issues.find_anchor(alias_id).await {
            if is_alias(&existing) {
                return Err(StoreError::AliasedObjectError(alias_id.to_string()));
            }
            return Err(StoreError::DuplicateUid(alias_id.to_string(), existing.number));
        }

        let labels = vec![
            self.config.base_label.clone(),
            label::encode_uid(&self.config.uid_prefix, alias_id),
            label::ALIAS_LABEL.to_string(),
            label::alias_to_label(canonical_issue.number),
        ];
        let body = serde_json::to_string_pretty(&json!({"alias_to": canonical_id})).map_err(|e| StoreError::Transport(e.into()))?;
        let title = format!("Stored Object: {alias_id}");
        let alias_issue = with_retry(&self.config.retries, || self.gateway.create_issue(&title, &body, &labels))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        if !is_canonical(&canonical_issue) {
            let canonical_label = vec![label::CANONICAL_LABEL.to_string()];
            with_retry(&self.config.retries, || self.gateway.add_labels(canonical_issue.number, &canonical_label))
                .await
                .map_err(|e| StoreError::Transport(e.into()))?;
        }

        self.post_system_envelope(
            alias_issue.number,
            json!({"alias_to": canonical_id}),
            EnvelopeType::SystemAlias,
        )
        .await?;
        self.post_system_envelope(
            canonical_issue.number,
            json!({"alias": alias_id}),
            EnvelopeType::SystemAliasReference,
        )
        .await?;

        with_retry(&self.config.retries, || {
            self.gateway.edit_issue(
                alias_issue.number,
                IssueEdit {
                    state: Some(crate::gateway::IssueState::Closed),
                    ..IssueEdit::default()
                },
            )
        })
        .await
        .map_err(|e| StoreError::Transport(e.into()))?;

        Ok(StoredObject {
            meta: gh_store_core::ObjectMeta {
                object_id: alias_id.to_string(),
                created_at: alias_issue.created_at,
                updated_at: alias_issue.created_at,
                version: 1,
                issue_number: alias_issue.number,
            },
            data: json!({"alias_to": canonical_id}),
        })
    }

    async fn post_system_envelope(&self, issue_number: u64, data: Value, envelope_type: EnvelopeType) -> Result<()> {
        let envelope = UpdateEnvelope::encode(data, UpdateMode::Replace, Some(envelope_type), crate::CLIENT_VERSION, issue_store::now());
        let body = serde_json::to_string(&envelope).map_err(|e| StoreError::Transport(e.into()))?;
        with_retry(&self.config.retries, || self.gateway.create_comment(issue_number, &body))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        Ok(())
    }
}
