//! AccessControl (C3): who may create anchors and post updates.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RetryConfig;
use crate::gateway::{Comment, Issue, RepoGateway};
use crate::retry::with_retry;

const CODEOWNERS_PATHS: [&str; 3] = [".github/CODEOWNERS", "docs/CODEOWNERS", "CODEOWNERS"];

#[derive(Default)]
struct AccessCache {
    owner: Option<String>,
    codeowners: Option<HashSet<String>>,
}

/// Decides whether a given author may create issues or post updates. Owner
/// identity and the codeowner set are fetched once and cached for the
/// lifetime of the instance; call [`AccessControl::clear_cache`] to force a
/// refresh.
pub struct AccessControl<G: RepoGateway> {
    gateway: Arc<G>,
    retry: RetryConfig,
    cache: Mutex<AccessCache>,
}

impl<G: RepoGateway> AccessControl<G> {
    /// Build a new, empty-cached `AccessControl`.
    #[must_use]
    pub fn new(gateway: Arc<G>, retry: RetryConfig) -> Self {
        Self {
            gateway,
            retry,
            cache: Mutex::new(AccessCache::default()),
        }
    }

    /// Discard cached owner/codeowner data.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        *cache = AccessCache::default();
    }

    async fn owner_login(&self) -> Option<String> {
        {
            let cache = self.cache.lock().await;
            if let Some(login) = &cache.owner {
                return Some(login.clone());
            }
        }
        let result = with_retry(&self.retry, || self.gateway.get_owner()).await;
        match result {
            Ok(owner) => {
                let mut cache = self.cache.lock().await;
                cache.owner = Some(owner.login.clone());
                Some(owner.login)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch repository owner");
                None
            }
        }
    }

    async fn codeowners(&self) -> HashSet<String> {
        {
            let cache = self.cache.lock().await;
            if let Some(set) = &cache.codeowners {
                return set.clone();
            }
        }

        let mut contents = None;
        for path in CODEOWNERS_PATHS {
            match with_retry(&self.retry, || self.gateway.get_file(path)).await {
                Ok(Some(bytes)) => {
                    contents = Some(String::from_utf8_lossy(&bytes).into_owned());
                    break;
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, path, "failed to fetch CODEOWNERS candidate");
                }
            }
        }

        let set = match contents {
            Some(text) => self.parse_codeowners(&text).await,
            None => HashSet::new(),
        };

        let mut cache = self.cache.lock().await;
        cache.codeowners = Some(set.clone());
        set
    }

    async fn parse_codeowners(&self, text: &str) -> HashSet<String> {
        let mut users = HashSet::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for token in line.split_whitespace().skip(1) {
                let Some(handle) = token.strip_prefix('@') else {
                    continue;
                };
                if let Some((org, team)) = handle.split_once('/') {
                    match with_retry(&self.retry, || self.gateway.get_team_members(org, team)).await {
                        Ok(members) => users.extend(members),
                        Err(err) => {
                            tracing::warn!(error = %err, org, team, "failed to resolve team members, treating as empty");
                        }
                    }
                } else {
                    users.insert(handle.to_string());
                }
            }
        }
        users
    }

    /// `username` is the repository owner or appears in CODEOWNERS.
    pub async fn is_authorized(&self, username: Option<&str>) -> bool {
        let Some(username) = username else {
            return false;
        };
        if self.owner_login().await.as_deref() == Some(username) {
            return true;
        }
        self.codeowners().await.contains(username)
    }

    /// Authorize the author who opened `issue`.
    pub async fn validate_issue_creator(&self, issue: &Issue) -> bool {
        self.is_authorized(issue.user.as_ref().map(|u| u.login.as_str())).await
    }

    /// Retain only comments whose author is authorized. Never fails; an
    /// unauthorized comment is simply dropped from the returned list.
    pub async fn filter_authorized_comments(&self, comments: Vec<Comment>) -> Vec<Comment> {
        let mut kept = Vec::with_capacity(comments.len());
        for comment in comments {
            if self.is_authorized(comment.user.as_ref().map(|u| u.login.as_str())).await {
                kept.push(comment);
            }
        }
        kept
    }
}
