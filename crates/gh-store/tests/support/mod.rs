//! An in-memory `RepoGateway` double used by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use gh_store::gateway::{
    Comment, GatewayError, GatewayUser, Issue, IssueEdit, IssueQueryState, IssueState, ListIssuesQuery, Owner, OwnerKind, Reaction,
    RepoGateway,
};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
#[error("in-memory gateway error: {0}")]
pub struct MockError(pub String);

impl GatewayError for MockError {}

struct CommentRecord {
    issue_number: u64,
    comment: Comment,
    reactions: Vec<Reaction>,
}

#[derive(Default)]
struct State {
    issues: HashMap<u64, Issue>,
    comments: HashMap<u64, CommentRecord>,
    labels: Vec<String>,
    files: HashMap<String, Vec<u8>>,
    teams: HashMap<(String, String), Vec<String>>,
    owner: Option<Owner>,
}

/// An in-memory tracker double: every anchor issue, comment and reaction lives
/// in a guarded map rather than over the network.
pub struct InMemoryGateway {
    state: Mutex<State>,
    next_issue: AtomicU64,
    next_comment: AtomicU64,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_issue: AtomicU64::new(1),
            next_comment: AtomicU64::new(1),
        }
    }
}

impl InMemoryGateway {
    /// Build a gateway whose repository is owned by `login`.
    #[must_use]
    pub fn new(owner_login: &str) -> Self {
        let gateway = Self::default();
        gateway.state.try_lock().expect("uncontended at construction").owner = Some(Owner {
            login: owner_login.to_string(),
            kind: OwnerKind::User,
        });
        gateway
    }

    /// Seed a CODEOWNERS file at the canonical path.
    pub async fn set_codeowners(&self, contents: &str) {
        let mut state = self.state.lock().await;
        state.files.insert(".github/CODEOWNERS".to_string(), contents.as_bytes().to_vec());
    }

    /// Seed a team's membership for CODEOWNERS team-handle resolution.
    pub async fn set_team(&self, org: &str, team: &str, members: Vec<String>) {
        let mut state = self.state.lock().await;
        state.teams.insert((org.to_string(), team.to_string()), members);
    }

    /// Directly fetch an issue's current labels, for test assertions.
    pub async fn labels_of(&self, issue_number: u64) -> Vec<String> {
        self.state.lock().await.issues[&issue_number].labels.clone()
    }

    /// Directly fetch an issue's current state, for test assertions.
    pub async fn state_of(&self, issue_number: u64) -> IssueState {
        self.state.lock().await.issues[&issue_number].state
    }

    /// Post a raw comment as a given author, bypassing any envelope encoding —
    /// used to simulate comments from unauthorized or malicious actors.
    pub async fn post_raw_comment(&self, issue_number: u64, body: &str, author: &str) -> Comment {
        let id = self.next_comment.fetch_add(1, Ordering::SeqCst);
        let comment = Comment {
            id,
            body: body.to_string(),
            created_at: OffsetDateTime::now_utc(),
            user: Some(GatewayUser { login: author.to_string() }),
        };
        let mut state = self.state.lock().await;
        state.comments.insert(
            id,
            CommentRecord {
                issue_number,
                comment: comment.clone(),
                reactions: Vec::new(),
            },
        );
        comment
    }
}

impl RepoGateway for InMemoryGateway {
    type Error = MockError;

    async fn get_owner(&self) -> Result<Owner, Self::Error> {
        self.state.lock().await.owner.clone().ok_or_else(|| MockError("no owner set".to_string()))
    }

    async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.state.lock().await.files.get(path).cloned())
    }

    async fn list_issues(&self, query: &ListIssuesQuery) -> Result<Vec<Issue>, Self::Error> {
        let state = self.state.lock().await;
        let mut matches: Vec<Issue> = state
            .issues
            .values()
            .filter(|issue| query.labels.iter().all(|l| issue.labels.contains(l)))
            .filter(|issue| match query.state {
                IssueQueryState::Open => issue.state == IssueState::Open,
                IssueQueryState::Closed => issue.state == IssueState::Closed,
                IssueQueryState::All => true,
            })
            .filter(|issue| query.since.is_none_or(|since| issue.updated_at > since))
            .cloned()
            .collect();
        matches.sort_by_key(|i| i.number);
        Ok(matches)
    }

    async fn get_issue(&self, number: u64) -> Result<Issue, Self::Error> {
        self.state
            .lock()
            .await
            .issues
            .get(&number)
            .cloned()
            .ok_or_else(|| MockError(format!("no issue #{number}")))
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Issue, Self::Error> {
        let number = self.next_issue.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        let issue = Issue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            state: IssueState::Open,
            created_at: now,
            updated_at: now,
            labels: labels.to_vec(),
            user: self.state.lock().await.owner.clone().map(|o| GatewayUser { login: o.login }),
        };
        self.state.lock().await.issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn edit_issue(&self, number: u64, edit: IssueEdit) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        let issue = state.issues.get_mut(&number).ok_or_else(|| MockError(format!("no issue #{number}")))?;
        if let Some(body) = edit.body {
            issue.body = body;
        }
        if let Some(issue_state) = edit.state {
            issue.state = issue_state;
        }
        if let Some(labels) = edit.labels {
            issue.labels = labels;
        }
        issue.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn create_label(&self, name: &str, _color: &str, _description: Option<&str>) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        if !state.labels.iter().any(|l| l == name) {
            state.labels.push(name.to_string());
        }
        Ok(())
    }

    async fn list_labels(&self) -> Result<Vec<String>, Self::Error> {
        Ok(self.state.lock().await.labels.clone())
    }

    async fn add_labels(&self, issue: u64, labels: &[String]) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        let issue = state.issues.get_mut(&issue).ok_or_else(|| MockError("no such issue".to_string()))?;
        for label in labels {
            if !issue.labels.contains(label) {
                issue.labels.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(&self, issue: u64, label: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        let issue = state.issues.get_mut(&issue).ok_or_else(|| MockError("no such issue".to_string()))?;
        issue.labels.retain(|l| l != label);
        Ok(())
    }

    async fn list_comments(&self, issue: u64) -> Result<Vec<Comment>, Self::Error> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|record| record.issue_number == issue)
            .map(|record| record.comment.clone())
            .collect();
        comments.sort_by_key(|c| c.id);
        Ok(comments)
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<Comment, Self::Error> {
        let id = self.next_comment.fetch_add(1, Ordering::SeqCst);
        let comment = Comment {
            id,
            body: body.to_string(),
            created_at: OffsetDateTime::now_utc(),
            user: self.state.lock().await.owner.clone().map(|o| GatewayUser { login: o.login }),
        };
        self.state.lock().await.comments.insert(
            id,
            CommentRecord {
                issue_number: issue,
                comment: comment.clone(),
                reactions: Vec::new(),
            },
        );
        Ok(comment)
    }

    async fn list_reactions(&self, comment: u64) -> Result<Vec<Reaction>, Self::Error> {
        Ok(self
            .state
            .lock()
            .await
            .comments
            .get(&comment)
            .map(|record| record.reactions.clone())
            .unwrap_or_default())
    }

    async fn create_reaction(&self, comment: u64, content: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        let record = state.comments.get_mut(&comment).ok_or_else(|| MockError("no such comment".to_string()))?;
        record.reactions.push(Reaction { content: content.to_string() });
        Ok(())
    }

    async fn get_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, Self::Error> {
        Ok(self
            .state
            .lock()
            .await
            .teams
            .get(&(org.to_string(), team.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

