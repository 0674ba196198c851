//! UpdateProcessor (C5): replay unprocessed comments into the anchor body.

use std::sync::Arc;

use gh_store_core::envelope;
use gh_store_core::merge::apply_update;
use gh_store_core::{HistoryEntry, ObjectMeta, StoredObject};
use serde_json::Value;

use crate::access::AccessControl;
use crate::alias::AliasResolver;
use crate::config::StoreSection;
use crate::error::{Result, StoreError};
use crate::gateway::{Comment, Issue, RepoGateway};
use crate::issue_store::IssueStore;
use crate::retry::with_retry;

struct CandidateUpdate {
    source_issue: u64,
    comment: Comment,
}

/// Replays unprocessed, authorized comments into the current state.
pub struct UpdateProcessor<G: RepoGateway> {
    gateway: Arc<G>,
    config: StoreSection,
    access: Arc<AccessControl<G>>,
    issues: Arc<IssueStore<G>>,
    aliases: Arc<AliasResolver<G>>,
}

impl<G: RepoGateway> UpdateProcessor<G> {
    /// Build a new `UpdateProcessor`.
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        config: StoreSection,
        access: Arc<AccessControl<G>>,
        issues: Arc<IssueStore<G>>,
        aliases: Arc<AliasResolver<G>>,
    ) -> Self {
        Self { gateway, config, access, issues, aliases }
    }

    /// Run one process cycle for the anchor identified by `issue_number`.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if the issue does not exist,
    /// [`StoreError::AccessDenied`] if the anchor's creator is not authorized,
    /// or [`StoreError::Transport`] on gateway failure.
    pub async fn process(&self, issue_number: u64) -> Result<StoredObject> {
        Box::pin(self.process_inner(issue_number)).await
    }

    async fn process_inner(&self, issue_number: u64) -> Result<StoredObject> {
        let issue = self
            .issues
            .get_issue(issue_number)
            .await
            .map_err(|_| StoreError::ObjectNotFound(issue_number.to_string()))?;

        if self.issues.is_alias(&issue) {
            let Some(target) = self.issues.alias_target(&issue) else {
                return Err(StoreError::CanonicalObjectError(format!(
                    "issue #{issue_number} is marked alias-object but carries no ALIAS-TO label"
                )));
            };
            return self.process(target).await;
        }

        if !self.access.validate_issue_creator(&issue).await {
            return Err(StoreError::AccessDenied(issue_number));
        }

        let is_canonical = crate::alias::is_canonical(&issue);

        let mut pool = Vec::new();
        for comment in self.unprocessed_comments(issue_number).await? {
            pool.push(CandidateUpdate { source_issue: issue_number, comment });
        }

        if is_canonical {
            for alias_issue in self.aliases.find_aliases(issue_number).await? {
                if !self.access.validate_issue_creator(&alias_issue).await {
                    tracing::warn!(alias = alias_issue.number, anchor = issue_number, "skipping alias with unauthorized creator");
                    continue;
                }
                for comment in self.unprocessed_comments(alias_issue.number).await? {
                    pool.push(CandidateUpdate { source_issue: alias_issue.number, comment });
                }
            }
        }

        let mut ordered = Vec::new();
        for candidate in pool {
            let comment = &candidate.comment;
            match envelope::decode(&comment.body, comment.created_at, comment.id) {
                Ok(parsed) => {
                    if envelope::is_system(&parsed) || envelope::is_initial_state(&parsed) {
                        continue;
                    }
                    let authorized = self
                        .access
                        .is_authorized(comment.user.as_ref().map(|u| u.login.as_str()))
                        .await;
                    if !authorized {
                        tracing::warn!(comment_id = comment.id, "skipping comment from unauthorized author");
                        continue;
                    }
                    let ts = envelope::effective_timestamp(&parsed, comment.created_at);
                    ordered.push((ts, candidate.source_issue, comment.id, parsed));
                }
                Err(err) => {
                    tracing::warn!(comment_id = comment.id, error = %err, "skipping malformed comment");
                }
            }
        }

        ordered.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

        let mut state: Value = serde_json::from_str(&issue.body).map_err(|e| StoreError::Transport(e.into()))?;
        let mut latest_ts = issue.created_at;
        let mut consumed_ids = Vec::new();
        for (ts, _source, comment_id, parsed) in &ordered {
            state = apply_update(&state, &parsed.data, parsed.meta.update_mode);
            if *ts > latest_ts {
                latest_ts = *ts;
            }
            consumed_ids.push(*comment_id);
        }

        self.issues.write_body(issue_number, &state).await?;

        for comment_id in &consumed_ids {
            if let Err(err) = with_retry(&self.config.retries, || self.gateway.create_reaction(*comment_id, &self.config.reactions.processed)).await {
                tracing::warn!(comment_id, error = %err, "failed to mark comment processed, will be re-applied next cycle");
            }
        }

        let object_id = gh_store_core::label::extract_uid(&self.config.uid_prefix, &issue.labels)
            .map_err(|_| StoreError::ObjectNotFound(issue_number.to_string()))?
            .to_string();

        let comment_count = with_retry(&self.config.retries, || self.gateway.list_comments(issue_number))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?
            .len();

        Ok(StoredObject {
            meta: ObjectMeta {
                object_id,
                created_at: issue.created_at,
                updated_at: latest_ts,
                version: u64::try_from(comment_count).unwrap_or(u64::MAX) + 1,
                issue_number,
            },
            data: state,
        })
    }

    async fn unprocessed_comments(&self, issue_number: u64) -> Result<Vec<Comment>> {
        let comments = with_retry(&self.config.retries, || self.gateway.list_comments(issue_number))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        let mut unprocessed = Vec::with_capacity(comments.len());
        for comment in comments {
            let reactions = with_retry(&self.config.retries, || self.gateway.list_reactions(comment.id))
                .await
                .map_err(|e| StoreError::Transport(e.into()))?;
            let already_processed = reactions.iter().any(|r| r.content == self.config.reactions.processed);
            if !already_processed {
                unprocessed.push(comment);
            }
        }
        Ok(unprocessed)
    }

    /// Decode every comment on the given anchor issue into history entries,
    /// regardless of processed status.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the comment listing fails.
    pub async fn history(&self, issue: &Issue) -> Result<Vec<HistoryEntry>> {
        self.issues.history(issue).await
    }
}
