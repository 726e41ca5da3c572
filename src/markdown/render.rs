use chrono::{DateTime, Utc};

use crate::pr::{
    FileChange, IssueComment, PullRequestHeader, PullRequestRecords, Review, ReviewComment,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render fetched records into a single Markdown document.
///
/// Sections always appear in the same order with the same headers; an empty
/// list renders its placeholder sentence instead of subheadings. Lines are
/// joined with `\n`, and lines ending in `\n` produce the blank separators.
pub fn render(records: &PullRequestRecords) -> String {
    let mut lines = Vec::new();
    push_header(&mut lines, &records.header);
    push_description(&mut lines, &records.header);
    push_issue_comments(&mut lines, &records.issue_comments);
    push_review_comments(&mut lines, &records.review_comments);
    push_reviews(&mut lines, &records.reviews);
    push_file_changes(&mut lines, &records.files);
    lines.join("\n")
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// GitHub reports cleared text fields as `""` rather than null.
fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

fn push_header(lines: &mut Vec<String>, header: &PullRequestHeader) {
    lines.push(format!("# {}\n", header.title));
    // Two trailing spaces force a Markdown line break.
    lines.push(format!("**Author:** {}  ", header.author));
    lines.push(format!("**Created:** {}\n", timestamp(&header.created_at)));
}

fn push_description(lines: &mut Vec<String>, header: &PullRequestHeader) {
    lines.push("## Description\n".to_string());
    match non_empty(header.body.as_deref()) {
        Some(body) => lines.push(format!("{}\n", body)),
        None => lines.push("_No description provided._\n".to_string()),
    }
}

fn push_issue_comments(lines: &mut Vec<String>, comments: &[IssueComment]) {
    lines.push("## Issue Comments\n".to_string());
    if comments.is_empty() {
        lines.push("_No issue comments._\n".to_string());
        return;
    }
    for comment in comments {
        lines.push(format!(
            "### Comment by {} on {}\n",
            comment.author,
            timestamp(&comment.created_at)
        ));
        lines.push(format!("{}\n", comment.body));
    }
}

fn push_review_comments(lines: &mut Vec<String>, comments: &[ReviewComment]) {
    lines.push("## Inline Review Comments\n".to_string());
    if comments.is_empty() {
        lines.push("_No inline review comments._\n".to_string());
        return;
    }
    for comment in comments {
        let position = match comment.position {
            Some(line) => format!(" at line {}", line),
            None => String::new(),
        };
        lines.push(format!(
            "### Comment by {} on {} in `{}`{}\n",
            comment.author,
            timestamp(&comment.created_at),
            comment.path,
            position
        ));
        lines.push(format!("{}\n", comment.body));
    }
}

fn push_reviews(lines: &mut Vec<String>, reviews: &[Review]) {
    lines.push("## Reviews\n".to_string());
    if reviews.is_empty() {
        lines.push("_No reviews provided._\n".to_string());
        return;
    }
    for review in reviews {
        let submitted = review
            .submitted_at
            .as_ref()
            .map_or_else(|| "N/A".to_string(), timestamp);
        lines.push(format!("### Review by {} on {}\n", review.author, submitted));
        lines.push(format!("**State:** {}\n", review.state));
        if let Some(body) = non_empty(review.body.as_deref()) {
            lines.push(format!("{}\n", body));
        }
    }
}

fn push_file_changes(lines: &mut Vec<String>, files: &[FileChange]) {
    lines.push("## File Changes\n".to_string());
    if files.is_empty() {
        lines.push("_No file changes available._\n".to_string());
        return;
    }
    for file in files {
        lines.push(format!("### {}\n", file.filename));
        match non_empty(file.patch.as_deref()) {
            Some(patch) => {
                lines.push("```diff".to_string());
                lines.push(patch.to_string());
                lines.push("```".to_string());
            }
            None => lines.push("_No diff available for this file._\n".to_string()),
        }
    }
}
