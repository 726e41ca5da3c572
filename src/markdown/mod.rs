pub mod render;

pub use render::render;

use std::io::Write;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::{Session, SessionError};
use crate::pr::{PrError, PullRequestRecords, PullRequestRef};

/// MIME type to offer alongside a downloaded document.
pub const MARKDOWN_MIME: &str = "text/markdown";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write markdown: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Fetch everything about `pr` and render it as one Markdown document.
///
/// Calls are issued one after another. The first failure aborts the whole
/// assembly with `PrError::FetchFailure`; nothing is rendered from a partial
/// fetch.
#[instrument(skip(session), fields(pr = %pr))]
pub async fn assemble(session: &dyn Session, pr: &PullRequestRef) -> Result<String, PrError> {
    let records = fetch_records(session, pr)
        .await
        .map_err(|e| PrError::FetchFailure(e.to_string()))?;
    debug!(
        issue_comments = records.issue_comments.len(),
        review_comments = records.review_comments.len(),
        reviews = records.reviews.len(),
        files = records.files.len(),
        "fetched PR records"
    );
    Ok(render(&records))
}

/// `assemble()` bounded by a wall-clock limit. Running out of time is a
/// fetch failure like any other.
pub async fn assemble_within(
    session: &dyn Session,
    pr: &PullRequestRef,
    limit: Duration,
) -> Result<String, PrError> {
    tokio::time::timeout(limit, assemble(session, pr))
        .await
        .map_err(|_| PrError::FetchFailure(format!("timed out after {}s", limit.as_secs())))?
}

async fn fetch_records(
    session: &dyn Session,
    pr: &PullRequestRef,
) -> Result<PullRequestRecords, SessionError> {
    let repo = session.get_repository(&pr.owner, &pr.repo).await?;
    let header = session.get_pull_request(&repo, pr.number).await?;
    let issue_comments = session.list_issue_comments(&repo, pr.number).await?;
    let review_comments = session.list_review_comments(&repo, pr.number).await?;
    let reviews = session.list_reviews(&repo, pr.number).await?;
    let files = session.list_file_changes(&repo, pr.number).await?;

    Ok(PullRequestRecords {
        header,
        issue_comments,
        review_comments,
        reviews,
        files,
    })
}

/// File name offered when the document is downloaded, e.g. `PR_42.md`.
pub fn suggested_file_name(pr: &PullRequestRef) -> String {
    format!("PR_{}.md", pr.number)
}

/// Write the document to stdout (default) or to a file.
#[instrument(skip(markdown), fields(bytes = markdown.len()))]
pub fn output(markdown: &str, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing markdown to stdout");
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(markdown.as_bytes())?;
            if !markdown.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()?;
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing markdown to file");
            std::fs::write(path, markdown)?;
            Ok(())
        }
    }
}
