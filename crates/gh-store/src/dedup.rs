//! Deduplicator (C7): reconcile multiple anchors sharing one uid.

use std::collections::BTreeMap;
use std::sync::Arc;

use gh_store_core::envelope::{EnvelopeType, UpdateEnvelope, UpdateMode};
use gh_store_core::label;
use serde_json::json;

use crate::config::StoreSection;
use crate::error::Result;
use crate::gateway::{IssueEdit, IssueQueryState, ListIssuesQuery, RepoGateway};
use crate::issue_store;
use crate::processor::UpdateProcessor;
use crate::retry::with_retry;

/// Why a losing issue was deprecated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeprecationReason {
    /// Plain duplicate of another anchor.
    Duplicate,
    /// Merged as part of a broader reconciliation.
    Merged,
    /// Replaced by a newer canonical object.
    Replaced,
}

impl DeprecationReason {
    fn as_str(self) -> &'static str {
        match self {
            DeprecationReason::Duplicate => "duplicate",
            DeprecationReason::Merged => "merged",
            DeprecationReason::Replaced => "replaced",
        }
    }
}

/// The outcome of reconciling one uid's duplicate group.
#[derive(Debug, Clone)]
pub struct DuplicateReport {
    /// The object id that was deduplicated.
    pub uid: String,
    /// The issue number that won (kept the uid label).
    pub winner: u64,
    /// The issue numbers that were deprecated.
    pub losers: Vec<u64>,
}

/// The outcome of a full repository-wide deduplication sweep.
#[derive(Debug, Clone)]
pub struct DeduplicationSummary {
    /// One report per duplicate group found.
    pub reports: Vec<DuplicateReport>,
}

/// Finds and reconciles duplicate anchors.
pub struct Deduplicator<G: RepoGateway> {
    gateway: Arc<G>,
    config: StoreSection,
    processor: Arc<UpdateProcessor<G>>,
}

impl<G: RepoGateway> Deduplicator<G> {
    /// Build a new `Deduplicator`.
    #[must_use]
    pub fn new(gateway: Arc<G>, config: StoreSection, processor: Arc<UpdateProcessor<G>>) -> Self {
        Self { gateway, config, processor }
    }

    /// Sweep every non-archived anchor, grouped by uid, keeping only groups of
    /// size ≥ 2.
    ///
    /// # Errors
    /// Returns [`crate::error::StoreError::Transport`] if the listing fails.
    pub async fn find_duplicates(&self) -> Result<BTreeMap<String, Vec<u64>>> {
        let query = ListIssuesQuery::with_labels(vec![self.config.base_label.clone()]).state(IssueQueryState::All);
        let issues = with_retry(&self.config.retries, || self.gateway.list_issues(&query))
            .await
            .map_err(|e| crate::error::StoreError::Transport(e.into()))?;

        let mut groups: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for issue in issues {
            if issue.labels.iter().any(|l| l == label::ARCHIVED_LABEL) {
                continue;
            }
            if let Ok(uid) = label::extract_uid(&self.config.uid_prefix, &issue.labels) {
                groups.entry(uid.to_string()).or_default().push(issue.number);
            }
        }
        groups.retain(|_, numbers| numbers.len() >= 2);
        for numbers in groups.values_mut() {
            numbers.sort_unstable();
        }
        Ok(groups)
    }

    /// Reconcile the duplicate group for `uid`: the oldest issue wins unless
    /// `canonical_override` names a different one; the rest are deprecated.
    ///
    /// # Errors
    /// Returns [`crate::error::StoreError::Transport`] if listing or label
    /// edits fail.
    pub async fn deduplicate(&self, uid: &str, canonical_override: Option<u64>) -> Result<DuplicateReport> {
        let groups = self.find_duplicates().await?;
        let mut numbers = groups.get(uid).cloned().unwrap_or_default();
        numbers.sort_unstable();

        let winner = canonical_override.unwrap_or_else(|| numbers[0]);
        let losers: Vec<u64> = numbers.into_iter().filter(|&n| n != winner).collect();

        for loser in &losers {
            self.deprecate(*loser, uid, winner, DeprecationReason::Duplicate).await?;
        }

        Ok(DuplicateReport {
            uid: uid.to_string(),
            winner,
            losers,
        })
    }

    /// Demote a single losing issue in favor of `winner_id`/`winner_number`.
    /// Label changes are the source of truth: if they succeed but writing the
    /// system comments fails, the deprecation is still considered successful.
    ///
    /// # Errors
    /// Returns [`crate::error::StoreError::Transport`] if the label edits fail.
    pub async fn deprecate(&self, loser: u64, winner_id: &str, winner_number: u64, reason: DeprecationReason) -> Result<()> {
        let uid_label = label::encode_uid(&self.config.uid_prefix, winner_id);
        with_retry(&self.config.retries, || self.gateway.remove_label(loser, &uid_label))
            .await
            .map_err(|e| crate::error::StoreError::Transport(e.into()))?;

        let new_labels = vec![label::DEPRECATED_LABEL.to_string(), label::merged_into_label(winner_id)];
        with_retry(&self.config.retries, || self.gateway.add_labels(loser, &new_labels))
            .await
            .map_err(|e| crate::error::StoreError::Transport(e.into()))?;

        with_retry(&self.config.retries, || {
            self.gateway.edit_issue(
                loser,
                IssueEdit {
                    state: Some(crate::gateway::IssueState::Closed),
                    ..IssueEdit::default()
                },
            )
        })
        .await
        .map_err(|e| crate::error::StoreError::Transport(e.into()))?;

        if let Err(err) = self
            .post_system_envelope(loser, json!({"reason": reason.as_str(), "merged_into": winner_id}), EnvelopeType::SystemDeprecation)
            .await
        {
            tracing::warn!(loser, error = %err, "failed to write deprecation comment; labels are authoritative");
        }
        if let Err(err) = self
            .post_system_envelope(winner_number, json!({"reason": reason.as_str(), "absorbed": loser}), EnvelopeType::SystemReference)
            .await
        {
            tracing::warn!(winner_number, error = %err, "failed to write reference comment on winner");
        }

        if let Err(err) = self.processor.process(winner_number).await {
            tracing::warn!(winner_number, error = %err, "post-deprecation process cycle failed");
        }

        Ok(())
    }

    async fn post_system_envelope(&self, issue_number: u64, data: serde_json::Value, envelope_type: EnvelopeType) -> Result<()> {
        let envelope = UpdateEnvelope::encode(data, UpdateMode::Replace, Some(envelope_type), crate::CLIENT_VERSION, issue_store::now());
        let body = serde_json::to_string(&envelope).map_err(|e| crate::error::StoreError::Transport(e.into()))?;
        with_retry(&self.config.retries, || self.gateway.create_comment(issue_number, &body))
            .await
            .map_err(|e| crate::error::StoreError::Transport(e.into()))?;
        Ok(())
    }
}
