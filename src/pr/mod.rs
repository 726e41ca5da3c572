pub mod types;

pub use types::{
    FileChange, IssueComment, PullRequestHeader, PullRequestRecords, PullRequestRef, Review,
    ReviewComment, ReviewState,
};

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PR_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([^/]+)/([^/]+)/pull/(\d+)").expect("PR URL pattern is valid")
});

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Invalid PR URL format: {0}")]
    InvalidUrlFormat(String),

    #[error("{0}")]
    FetchFailure(String),
}

/// Locate `github.com/{owner}/{repo}/pull/{number}` anywhere in `input`.
///
/// The match is not anchored, so schemes, trailing path segments
/// (`/files`, `/commits`) and query strings are tolerated. A PR number of
/// zero or one that does not fit in a `u64` is rejected.
pub fn parse_pr_url(input: &str) -> Result<PullRequestRef, PrError> {
    let invalid = || PrError::InvalidUrlFormat(input.to_string());

    let captures = PR_URL_PATTERN.captures(input).ok_or_else(invalid)?;
    let (_, [owner, repo, number]) = captures.extract();

    let number = number.parse::<u64>().map_err(|_| invalid())?;
    if number == 0 {
        return Err(invalid());
    }

    Ok(PullRequestRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number,
    })
}
