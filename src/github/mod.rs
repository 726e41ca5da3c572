pub mod client;

pub use client::GitHubSession;

use async_trait::async_trait;
use thiserror::Error;

use crate::pr::{FileChange, IssueComment, PullRequestHeader, Review, ReviewComment};

/// Default REST endpoint for github.com.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("GitHub API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("GitHub API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected GitHub API response: {0}")]
    Decode(String),
}

/// A repository as GitHub knows it. Owner and name are the canonical
/// spelling returned by the API, which may differ from the URL after a
/// rename or transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Read-only view of the code-hosting API.
///
/// Each list method returns every record across all pages, in the order the
/// API produced them.
#[async_trait]
pub trait Session: Send + Sync {
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, SessionError>;

    async fn get_pull_request(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<PullRequestHeader, SessionError>;

    async fn list_issue_comments(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<IssueComment>, SessionError>;

    async fn list_review_comments(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<ReviewComment>, SessionError>;

    async fn list_reviews(&self, repo: &Repository, number: u64)
        -> Result<Vec<Review>, SessionError>;

    async fn list_file_changes(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<FileChange>, SessionError>;
}
