//! Store façade (C8): the public surface composed from the other components.

use std::sync::Arc;

use gh_store_core::envelope::{UpdateEnvelope, UpdateMode};
use gh_store_core::merge::apply_update;
use gh_store_core::{HistoryEntry, StoredObject};
use serde_json::Value;

use crate::access::AccessControl;
use crate::alias::AliasResolver;
use crate::config::StoreConfig;
use crate::dedup::{DeduplicationSummary, Deduplicator};
use crate::error::{Result, StoreError};
use crate::gateway::{IssueQueryState, IssueState, ListIssuesQuery, RepoGateway};
use crate::issue_store::{self, IssueStore};
use crate::processor::UpdateProcessor;
use crate::snapshot::Snapshot;
use time::OffsetDateTime;

/// The public surface of the object store.
pub struct Store<G: RepoGateway> {
    gateway: Arc<G>,
    config: StoreConfig,
    access: Arc<AccessControl<G>>,
    issues: Arc<IssueStore<G>>,
    aliases: Arc<AliasResolver<G>>,
    processor: Arc<UpdateProcessor<G>>,
    dedup: Arc<Deduplicator<G>>,
}

impl<G: RepoGateway> Store<G> {
    /// Build a new `Store` over the given gateway and configuration.
    #[must_use]
    pub fn new(gateway: G, config: StoreConfig) -> Self {
        let gateway = Arc::new(gateway);
        let access = Arc::new(AccessControl::new(Arc::clone(&gateway), config.store.retries));
        let issues = Arc::new(IssueStore::new(Arc::clone(&gateway), config.store.clone()));
        let aliases = Arc::new(AliasResolver::new(Arc::clone(&gateway), config.store.clone(), Arc::clone(&issues)));
        let processor = Arc::new(UpdateProcessor::new(
            Arc::clone(&gateway),
            config.store.clone(),
            Arc::clone(&access),
            Arc::clone(&issues),
            Arc::clone(&aliases),
        ));
        let dedup = Arc::new(Deduplicator::new(Arc::clone(&gateway), config.store.clone(), Arc::clone(&processor)));
        Self {
            gateway,
            config,
            access,
            issues,
            aliases,
            processor,
            dedup,
        }
    }

    /// Create a new object. Fails if a non-deprecated anchor with this id
    /// already exists.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateUid`] or [`StoreError::Transport`].
    pub async fn create(&self, id: &str, data: Value) -> Result<StoredObject> {
        self.issues.create_anchor(id, data).await
    }

    /// Read an object by id, following alias redirection.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if `id` has no anchor.
    pub async fn get(&self, id: &str) -> Result<StoredObject> {
        let canonical_id = self.aliases.resolve_canonical(id).await;
        let issue = self.issues.find_anchor(&canonical_id).await?;
        let mut object = self.issues.read_object(&issue).await?;
        object.meta.object_id = canonical_id;
        Ok(object)
    }

    /// Post a new update envelope. Resolves `id` to its canonical object
    /// first and always posts to the canonical issue, never an alias.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if `id` has no anchor, or
    /// [`StoreError::ConcurrentUpdate`] if the anchor already has a pending
    /// update.
    pub async fn update(&self, id: &str, changes: Value) -> Result<()> {
        let canonical_id = self.aliases.resolve_canonical(id).await;
        let issue = self.issues.find_anchor(&canonical_id).await?;

        if issue.state == IssueState::Open {
            return Err(StoreError::ConcurrentUpdate(canonical_id));
        }

        let envelope = UpdateEnvelope::encode(changes, UpdateMode::Append, None, crate::CLIENT_VERSION, issue_store::now());
        let body = serde_json::to_string(&envelope).map_err(|e| StoreError::Transport(e.into()))?;
        self.create_comment_and_reopen(issue.number, &body).await
    }

    /// Post a `replace`-mode update envelope, overwriting the entire object state.
    ///
    /// # Errors
    /// See [`Store::update`].
    pub async fn replace(&self, id: &str, data: Value) -> Result<()> {
        let canonical_id = self.aliases.resolve_canonical(id).await;
        let issue = self.issues.find_anchor(&canonical_id).await?;

        if issue.state == IssueState::Open {
            return Err(StoreError::ConcurrentUpdate(canonical_id));
        }

        let envelope = UpdateEnvelope::encode(data, UpdateMode::Replace, None, crate::CLIENT_VERSION, issue_store::now());
        let body = serde_json::to_string(&envelope).map_err(|e| StoreError::Transport(e.into()))?;
        self.create_comment_and_reopen(issue.number, &body).await
    }

    async fn create_comment_and_reopen(&self, issue_number: u64, body: &str) -> Result<()> {
        crate::retry::with_retry(&self.config.store.retries, || self.gateway.create_comment(issue_number, body))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;
        self.issues.reopen(issue_number).await
    }

    /// Soft-delete an object.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if `id` has no anchor.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let canonical_id = self.aliases.resolve_canonical(id).await;
        self.issues.archive(&canonical_id).await
    }

    /// List every non-archived, non-alias, non-deprecated object.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the listing fails.
    pub async fn list(&self) -> Result<Vec<StoredObject>> {
        let query = ListIssuesQuery::with_labels(vec![self.config.store.base_label.clone()]).state(IssueQueryState::Closed);
        let issues = crate::retry::with_retry(&self.config.store.retries, || self.gateway.list_issues(&query))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        let mut objects = Vec::new();
        for issue in issues {
            if !self.is_listable(&issue) {
                continue;
            }
            objects.push(self.issues.read_object(&issue).await?);
        }
        Ok(objects)
    }

    fn is_listable(&self, issue: &crate::gateway::Issue) -> bool {
        use gh_store_core::label::{self, LabelKind};
        !issue.labels.iter().any(|l| {
            matches!(
                label::classify(l, &self.config.store.base_label, &self.config.store.uid_prefix),
                LabelKind::Archived | LabelKind::Alias | LabelKind::Deprecated
            )
        })
    }

    /// List every object whose computed `updated_at` is strictly after `since`.
    ///
    /// The tracker's own `since` filter includes comment activity, so this
    /// re-checks each candidate's computed `updated_at` against `since`.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the listing fails.
    pub async fn list_updated_since(&self, since: OffsetDateTime) -> Result<Vec<StoredObject>> {
        let query = ListIssuesQuery::with_labels(vec![self.config.store.base_label.clone()])
            .state(IssueQueryState::Closed)
            .since(since);
        let issues = crate::retry::with_retry(&self.config.store.retries, || self.gateway.list_issues(&query))
            .await
            .map_err(|e| StoreError::Transport(e.into()))?;

        let mut objects = Vec::new();
        for issue in issues {
            if !self.is_listable(&issue) {
                continue;
            }
            let object = self.issues.read_object(&issue).await?;
            if object.meta.updated_at > since {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    /// Project an object's full comment history, following alias redirection.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if `id` has no anchor.
    pub async fn history(&self, id: &str) -> Result<Vec<HistoryEntry>> {
        let canonical_id = self.aliases.resolve_canonical(id).await;
        let issue = self.issues.find_anchor(&canonical_id).await?;
        self.issues.history(&issue).await
    }

    /// Run a process cycle for the given anchor issue number.
    ///
    /// # Errors
    /// See [`UpdateProcessor::process`].
    pub async fn process_updates(&self, issue_number: u64) -> Result<StoredObject> {
        self.processor.process(issue_number).await
    }

    /// Create a new alias for `canonical_id` under `alias_id`.
    ///
    /// # Errors
    /// See [`AliasResolver::create_alias`].
    pub async fn create_alias(&self, canonical_id: &str, alias_id: &str) -> Result<StoredObject> {
        self.aliases.create_alias(canonical_id, alias_id).await
    }

    /// List the object ids of every alias pointing at `canonical_id`.
    ///
    /// # Errors
    /// Returns [`StoreError::ObjectNotFound`] if `canonical_id` has no anchor.
    pub async fn list_aliases(&self, canonical_id: &str) -> Result<Vec<String>> {
        let issue = self.issues.find_anchor(canonical_id).await?;
        let aliases = self.aliases.find_aliases(issue.number).await?;
        Ok(aliases
            .iter()
            .filter_map(|i| gh_store_core::label::extract_uid(&self.config.store.uid_prefix, &i.labels).ok())
            .map(str::to_string)
            .collect())
    }

    /// Sweep for duplicate anchors and reconcile every group found.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if the sweep fails.
    pub async fn deduplicate_all(&self) -> Result<DeduplicationSummary> {
        let groups = self.dedup.find_duplicates().await?;
        let mut reports = Vec::with_capacity(groups.len());
        for uid in groups.keys() {
            reports.push(self.dedup.deduplicate(uid, None).await?);
        }
        Ok(DeduplicationSummary { reports })
    }

    /// Take a full snapshot of every object in the store.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if listing objects fails.
    pub async fn snapshot(&self, repository: String, now: OffsetDateTime) -> Result<Snapshot> {
        let objects = self.list().await?;
        Ok(Snapshot::from_objects(repository, now, objects))
    }

    /// Refresh an existing snapshot with everything updated since it was taken.
    ///
    /// # Errors
    /// Returns [`StoreError::Transport`] if listing objects fails.
    pub async fn update_snapshot(&self, snapshot: &mut Snapshot, now: OffsetDateTime) -> Result<()> {
        let newer = self.list_updated_since(snapshot.snapshot_time).await?;
        snapshot.update(now, newer);
        Ok(())
    }

    /// Invalidate the [`AccessControl`] cache.
    pub async fn clear_access_cache(&self) {
        self.access.clear_cache().await;
    }

    /// Preview the effect of an update against a base state without posting
    /// or persisting anything.
    #[must_use]
    pub fn preview_update(base: &Value, update: &Value, mode: UpdateMode) -> Value {
        apply_update(base, update, mode)
    }
}
