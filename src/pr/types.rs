use chrono::{DateTime, Utc};
use std::fmt;

/// Identity of a pull request, extracted from its URL by `parse_pr_url()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    /// Always greater than zero.
    pub number: u64,
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Title block of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestHeader {
    pub title: String,
    /// Author's GitHub login
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// PR description; `None` when the author left it blank
    pub body: Option<String>,
}

/// A conversation comment on the PR, not tied to any line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

/// A comment anchored to a file in the PR diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    /// File the comment is attached to (e.g., "src/auth/config.rs")
    pub path: String,
    /// Position within the diff; `None` when the diff context is outdated
    pub position: Option<u64>,
}

/// Verdict attached to a submitted review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    /// Any state GitHub reports that this tool does not know about yet.
    Other(String),
}

impl From<String> for ReviewState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "APPROVED" => ReviewState::Approved,
            "CHANGES_REQUESTED" => ReviewState::ChangesRequested,
            "COMMENTED" => ReviewState::Commented,
            "DISMISSED" => ReviewState::Dismissed,
            "PENDING" => ReviewState::Pending,
            _ => ReviewState::Other(raw),
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewState::Approved => write!(f, "APPROVED"),
            ReviewState::ChangesRequested => write!(f, "CHANGES_REQUESTED"),
            ReviewState::Commented => write!(f, "COMMENTED"),
            ReviewState::Dismissed => write!(f, "DISMISSED"),
            ReviewState::Pending => write!(f, "PENDING"),
            ReviewState::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// A single review submission. One reviewer may submit several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub author: String,
    /// Pending reviews have not been submitted yet
    pub submitted_at: Option<DateTime<Utc>>,
    pub state: ReviewState,
    pub body: Option<String>,
}

/// One file touched by the PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub filename: String,
    /// Unified diff hunk; GitHub omits it for binary and oversized files
    pub patch: Option<String>,
}

/// Everything fetched for one PR, in the order GitHub returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecords {
    pub header: PullRequestHeader,
    pub issue_comments: Vec<IssueComment>,
    pub review_comments: Vec<ReviewComment>,
    pub reviews: Vec<Review>,
    pub files: Vec<FileChange>,
}
