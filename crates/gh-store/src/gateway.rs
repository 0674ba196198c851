//! `RepoGateway`: the abstract interface the store consumes to talk to a tracker.
//!
//! No concrete HTTP client lives in this crate; callers supply their own
//! [`RepoGateway`] implementation.

use std::sync::Arc;

use time::OffsetDateTime;

/// Who owns the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    /// A single user account.
    User,
    /// An organization.
    Organization,
}

/// The repository owner's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    /// Login name.
    pub login: String,
    /// User or organization.
    pub kind: OwnerKind,
}

/// An issue's open/closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    /// Has unprocessed updates, please process.
    Open,
    /// Quiescent: no pending updates.
    Closed,
}

/// The author of an issue or comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayUser {
    /// Login name.
    pub login: String,
}

/// An issue as exposed by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Tracker-assigned issue number.
    pub number: u64,
    /// Issue title.
    pub title: String,
    /// Issue body (the anchor's current serialized state).
    pub body: String,
    /// Open or closed.
    pub state: IssueState,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// Last-modified time as reported by the tracker.
    pub updated_at: OffsetDateTime,
    /// Labels currently attached.
    pub labels: Vec<String>,
    /// The issue's author, if known.
    pub user: Option<GatewayUser>,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Tracker-assigned comment id.
    pub id: u64,
    /// Raw comment body.
    pub body: String,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// The comment's author, if known.
    pub user: Option<GatewayUser>,
}

/// A reaction placed on a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Reaction content, e.g. `"+1"` or `"rocket"`.
    pub content: String,
}

/// Which state a `listIssues` query should match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueQueryState {
    /// Only open issues.
    Open,
    /// Only closed issues.
    Closed,
    /// Every issue regardless of state.
    #[default]
    All,
}

/// Parameters for a `listIssues` call.
#[derive(Debug, Clone, Default)]
pub struct ListIssuesQuery {
    /// Labels every returned issue must carry.
    pub labels: Vec<String>,
    /// State filter.
    pub state: IssueQueryState,
    /// Only return issues touched since this instant, if set.
    pub since: Option<OffsetDateTime>,
}

impl ListIssuesQuery {
    /// Build a query for the given labels with state defaulted to `All`.
    #[must_use]
    pub fn with_labels(labels: Vec<String>) -> Self {
        Self {
            labels,
            state: IssueQueryState::All,
            since: None,
        }
    }

    /// Restrict the query to a specific state.
    #[must_use]
    pub fn state(mut self, state: IssueQueryState) -> Self {
        self.state = state;
        self
    }

    /// Restrict the query to issues touched since `since`.
    #[must_use]
    pub fn since(mut self, since: OffsetDateTime) -> Self {
        self.since = Some(since);
        self
    }
}

/// Fields an `editIssue` call may update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct IssueEdit {
    /// New body, if changing.
    pub body: Option<String>,
    /// New state, if changing.
    pub state: Option<IssueState>,
    /// New label set, if changing (replaces the whole set).
    pub labels: Option<Vec<String>>,
}

/// Gateway errors must be able to identify rate limiting so the retry helper
/// can recognize it without depending on a specific transport crate.
pub trait GatewayError: std::error::Error + Send + Sync + 'static {
    /// Whether this error represents a transport-level rate limit that is
    /// worth retrying with backoff.
    fn is_rate_limited(&self) -> bool {
        false
    }
}

/// The abstract interface the store consumes.
///
/// Deliberately modeled as a native `async fn` trait rather than boxed
/// futures: every method may suspend on network I/O, and there is no
/// blocking work in this crate that needs offloading to a thread pool the way
/// a disk-backed store would.
#[allow(async_fn_in_trait)]
pub trait RepoGateway: Send + Sync {
    /// Error type surfaced by every gateway call.
    type Error: GatewayError;

    /// Fetch the repository owner's identity.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the lookup fails.
    async fn get_owner(&self) -> Result<Owner, Self::Error>;

    /// Fetch a file's raw contents, or `None` if it does not exist.
    ///
    /// # Errors
    /// Returns a gateway-specific error for failures other than "not found".
    async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// List issues matching the given query.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the query fails.
    async fn list_issues(&self, query: &ListIssuesQuery) -> Result<Vec<Issue>, Self::Error>;

    /// Fetch a single issue by number.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the issue cannot be read.
    async fn get_issue(&self, number: u64) -> Result<Issue, Self::Error>;

    /// Create a new issue.
    ///
    /// # Errors
    /// Returns a gateway-specific error if creation fails.
    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Issue, Self::Error>;

    /// Apply an edit to an existing issue.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the edit fails.
    async fn edit_issue(&self, number: u64, edit: IssueEdit) -> Result<(), Self::Error>;

    /// Create a label if it does not already exist.
    ///
    /// # Errors
    /// Returns a gateway-specific error if creation fails for a reason other
    /// than the label already existing.
    async fn create_label(&self, name: &str, color: &str, description: Option<&str>) -> Result<(), Self::Error>;

    /// List every label defined on the repository.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the query fails.
    async fn list_labels(&self) -> Result<Vec<String>, Self::Error>;

    /// Add labels to an issue, preserving existing ones.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the call fails.
    async fn add_labels(&self, issue: u64, labels: &[String]) -> Result<(), Self::Error>;

    /// Remove a single label from an issue.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the call fails.
    async fn remove_label(&self, issue: u64, label: &str) -> Result<(), Self::Error>;

    /// List every comment on an issue, in tracker order.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the query fails.
    async fn list_comments(&self, issue: u64) -> Result<Vec<Comment>, Self::Error>;

    /// Post a new comment on an issue.
    ///
    /// # Errors
    /// Returns a gateway-specific error if posting fails.
    async fn create_comment(&self, issue: u64, body: &str) -> Result<Comment, Self::Error>;

    /// List every reaction on a comment.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the query fails.
    async fn list_reactions(&self, comment: u64) -> Result<Vec<Reaction>, Self::Error>;

    /// Add a reaction to a comment.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the call fails.
    async fn create_reaction(&self, comment: u64, content: &str) -> Result<(), Self::Error>;

    /// Best-effort enumeration of a team's members.
    ///
    /// # Errors
    /// Returns a gateway-specific error if the lookup fails outright; callers
    /// are expected to treat failure as "empty set" rather than propagate it.
    async fn get_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, Self::Error>;
}

/// Lets a test keep its own handle to the gateway (to seed comments, inspect
/// labels, ...) while also handing a clone to a [`crate::store::Store`].
impl<G: RepoGateway> RepoGateway for Arc<G> {
    type Error = G::Error;

    async fn get_owner(&self) -> Result<Owner, Self::Error> {
        (**self).get_owner().await
    }

    async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).get_file(path).await
    }

    async fn list_issues(&self, query: &ListIssuesQuery) -> Result<Vec<Issue>, Self::Error> {
        (**self).list_issues(query).await
    }

    async fn get_issue(&self, number: u64) -> Result<Issue, Self::Error> {
        (**self).get_issue(number).await
    }

    async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Issue, Self::Error> {
        (**self).create_issue(title, body, labels).await
    }

    async fn edit_issue(&self, number: u64, edit: IssueEdit) -> Result<(), Self::Error> {
        (**self).edit_issue(number, edit).await
    }

    async fn create_label(&self, name: &str, color: &str, description: Option<&str>) -> Result<(), Self::Error> {
        (**self).create_label(name, color, description).await
    }

    async fn list_labels(&self) -> Result<Vec<String>, Self::Error> {
        (**self).list_labels().await
    }

    async fn add_labels(&self, issue: u64, labels: &[String]) -> Result<(), Self::Error> {
        (**self).add_labels(issue, labels).await
    }

    async fn remove_label(&self, issue: u64, label: &str) -> Result<(), Self::Error> {
        (**self).remove_label(issue, label).await
    }

    async fn list_comments(&self, issue: u64) -> Result<Vec<Comment>, Self::Error> {
        (**self).list_comments(issue).await
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<Comment, Self::Error> {
        (**self).create_comment(issue, body).await
    }

    async fn list_reactions(&self, comment: u64) -> Result<Vec<Reaction>, Self::Error> {
        (**self).list_reactions(comment).await
    }

    async fn create_reaction(&self, comment: u64, content: &str) -> Result<(), Self::Error> {
        (**self).create_reaction(comment, content).await
    }

    async fn get_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, Self::Error> {
        (**self).get_team_members(org, team).await
    }
}
