use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Repository, Session, SessionError};
use crate::pr::{FileChange, IssueComment, PullRequestHeader, Review, ReviewComment};

/// GitHub's maximum page size for list endpoints.
const PER_PAGE: usize = 100;

/// Login GitHub shows for comments whose author account was deleted.
const GHOST_LOGIN: &str = "ghost";

/// `Session` backed by the GitHub REST API.
///
/// Build one per invocation; it holds nothing but the HTTP client and the
/// API base.
pub struct GitHubSession {
    client: Client,
    api_base: String,
}

impl GitHubSession {
    /// Create a session. A `None` or blank token makes anonymous requests,
    /// which GitHub rate-limits far more aggressively.
    pub fn new(token: Option<&str>, api_base: &str) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let token = token.map(str::trim).filter(|t| !t.is_empty());
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| SessionError::Auth("token contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        debug!(authenticated = token.is_some(), api_base, "creating GitHub session");

        let client = Client::builder()
            .user_agent("pr2md")
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SessionError> {
        let url = format!("{}{}", self.api_base, path);
        let response = self.client.get(&url).query(query).send().await?;
        let text = check_status(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| SessionError::Decode(format!("{}: {}", path, e)))
    }

    /// Walk `page=1,2,...` until GitHub returns a short page.
    async fn get_all_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, SessionError> {
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let batch: Vec<T> = self.get_json(path, &query).await?;
            let batch_len = batch.len();
            records.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(path, pages = page, records = records.len(), "fetched list");
        Ok(records)
    }
}

#[async_trait]
impl Session for GitHubSession {
    #[instrument(skip(self))]
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, SessionError> {
        let path = format!("/repos/{}/{}", owner, name);
        let repo: ApiRepository = self.get_json(&path, &[]).await?;
        Ok(Repository {
            owner: repo.owner.login,
            name: repo.name,
        })
    }

    #[instrument(skip(self, repo), fields(repository = %repo.full_name()))]
    async fn get_pull_request(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<PullRequestHeader, SessionError> {
        let path = format!("/repos/{}/pulls/{}", repo.full_name(), number);
        let pull: ApiPullRequest = self.get_json(&path, &[]).await?;
        debug!(title = %pull.title, "received PR metadata");
        Ok(pull.into())
    }

    #[instrument(skip(self, repo), fields(repository = %repo.full_name()))]
    async fn list_issue_comments(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<IssueComment>, SessionError> {
        let path = format!("/repos/{}/issues/{}/comments", repo.full_name(), number);
        let comments: Vec<ApiIssueComment> = self.get_all_pages(&path).await?;
        Ok(comments.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, repo), fields(repository = %repo.full_name()))]
    async fn list_review_comments(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<ReviewComment>, SessionError> {
        let path = format!("/repos/{}/pulls/{}/comments", repo.full_name(), number);
        let comments: Vec<ApiReviewComment> = self.get_all_pages(&path).await?;
        Ok(comments.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, repo), fields(repository = %repo.full_name()))]
    async fn list_reviews(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<Review>, SessionError> {
        let path = format!("/repos/{}/pulls/{}/reviews", repo.full_name(), number);
        let reviews: Vec<ApiReview> = self.get_all_pages(&path).await?;
        Ok(reviews.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, repo), fields(repository = %repo.full_name()))]
    async fn list_file_changes(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<FileChange>, SessionError> {
        let path = format!("/repos/{}/pulls/{}/files", repo.full_name(), number);
        let files: Vec<ApiFile> = self.get_all_pages(&path).await?;
        Ok(files.into_iter().map(Into::into).collect())
    }
}

/// Turn a non-2xx response into a `SessionError`, keeping GitHub's message.
async fn check_status(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        == Some("0");
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => parsed.message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };

    debug!(status = status.as_u16(), quota_exhausted, %message, "GitHub API error");
    Err(classify_error(status, quota_exhausted, message))
}

fn classify_error(status: StatusCode, quota_exhausted: bool, message: String) -> SessionError {
    let mentions_rate_limit = message.to_ascii_lowercase().contains("rate limit");
    match status {
        StatusCode::NOT_FOUND => SessionError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => SessionError::RateLimited(message),
        StatusCode::FORBIDDEN if quota_exhausted || mentions_rate_limit => {
            SessionError::RateLimited(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SessionError::Auth(message),
        _ => SessionError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct ApiUser {
    login: String,
}

fn login_of(user: Option<ApiUser>) -> String {
    user.map(|u| u.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

#[derive(Deserialize)]
struct ApiRepository {
    name: String,
    owner: ApiUser,
}

#[derive(Deserialize)]
struct ApiPullRequest {
    title: String,
    user: Option<ApiUser>,
    created_at: DateTime<Utc>,
    body: Option<String>,
}

impl From<ApiPullRequest> for PullRequestHeader {
    fn from(pull: ApiPullRequest) -> Self {
        PullRequestHeader {
            title: pull.title,
            author: login_of(pull.user),
            created_at: pull.created_at,
            body: pull.body,
        }
    }
}

#[derive(Deserialize)]
struct ApiIssueComment {
    user: Option<ApiUser>,
    created_at: DateTime<Utc>,
    body: Option<String>,
}

impl From<ApiIssueComment> for IssueComment {
    fn from(comment: ApiIssueComment) -> Self {
        IssueComment {
            author: login_of(comment.user),
            created_at: comment.created_at,
            body: comment.body.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct ApiReviewComment {
    user: Option<ApiUser>,
    created_at: DateTime<Utc>,
    body: Option<String>,
    path: String,
    position: Option<u64>,
}

impl From<ApiReviewComment> for ReviewComment {
    fn from(comment: ApiReviewComment) -> Self {
        ReviewComment {
            author: login_of(comment.user),
            created_at: comment.created_at,
            body: comment.body.unwrap_or_default(),
            path: comment.path,
            position: comment.position,
        }
    }
}

#[derive(Deserialize)]
struct ApiReview {
    user: Option<ApiUser>,
    submitted_at: Option<DateTime<Utc>>,
    state: String,
    body: Option<String>,
}

impl From<ApiReview> for Review {
    fn from(review: ApiReview) -> Self {
        Review {
            author: login_of(review.user),
            submitted_at: review.submitted_at,
            state: review.state.into(),
            body: review.body,
        }
    }
}

#[derive(Deserialize)]
struct ApiFile {
    filename: String,
    patch: Option<String>,
}

impl From<ApiFile> for FileChange {
    fn from(file: ApiFile) -> Self {
        FileChange {
            filename: file.filename,
            patch: file.patch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::ReviewState;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn widget_repo() -> Repository {
        Repository {
            owner: "acme".to_string(),
            name: "widget".to_string(),
        }
    }

    async fn mount_json(server: &MockServer, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_repository_uses_canonical_names() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/Acme/Widget",
            json!({ "name": "widget", "owner": { "login": "acme" } }),
        )
        .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let repo = session.get_repository("Acme", "Widget").await.unwrap();
        assert_eq!(repo, widget_repo());
    }

    #[tokio::test]
    async fn test_get_pull_request_decodes_header() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/acme/widget/pulls/42",
            json!({
                "number": 42,
                "title": "Add OAuth2 login flow",
                "user": { "login": "alice" },
                "created_at": "2024-03-05T14:07:09Z",
                "body": null
            }),
        )
        .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let header = session.get_pull_request(&widget_repo(), 42).await.unwrap();
        assert_eq!(header.title, "Add OAuth2 login flow");
        assert_eq!(header.author, "alice");
        assert_eq!(
            header.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-03-05 14:07:09"
        );
        assert!(header.body.is_none());
    }

    #[tokio::test]
    async fn test_token_sent_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "name": "widget", "owner": { "login": "acme" } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = GitHubSession::new(Some("  secret-token \n"), &server.uri()).unwrap();
        session.get_repository("acme", "widget").await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_token_is_anonymous() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/acme/widget",
            json!({ "name": "widget", "owner": { "login": "acme" } }),
        )
        .await;

        let session = GitHubSession::new(Some("   "), &server.uri()).unwrap();
        session.get_repository("acme", "widget").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
        assert_eq!(
            requests[0].headers.get("user-agent").unwrap().to_str().unwrap(),
            "pr2md"
        );
    }

    #[tokio::test]
    async fn test_list_paginates_in_order() {
        let server = MockServer::start().await;
        let route = "/repos/acme/widget/pulls/42/files";

        let first_page: Vec<Value> = (0..PER_PAGE)
            .map(|i| json!({ "filename": format!("src/file_{}.rs", i), "patch": "@@ -1 +1 @@" }))
            .collect();
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(first_page)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "filename": "assets/logo.png" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let files = session.list_file_changes(&widget_repo(), 42).await.unwrap();

        assert_eq!(files.len(), PER_PAGE + 1);
        assert_eq!(files[0].filename, "src/file_0.rs");
        assert_eq!(files[PER_PAGE - 1].filename, "src/file_99.rs");
        assert_eq!(files[PER_PAGE].filename, "assets/logo.png");
        assert!(files[PER_PAGE].patch.is_none());
    }

    #[tokio::test]
    async fn test_list_review_comments_and_reviews() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/acme/widget/pulls/42/comments",
            json!([
                {
                    "user": { "login": "bob" },
                    "created_at": "2024-03-06T09:00:00Z",
                    "body": "Rename this",
                    "path": "src/lib.rs",
                    "position": 17
                },
                {
                    "user": null,
                    "created_at": "2024-03-06T10:00:00Z",
                    "body": "Outdated",
                    "path": "src/main.rs",
                    "position": null
                }
            ]),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/widget/pulls/42/reviews",
            json!([
                {
                    "user": { "login": "carol" },
                    "submitted_at": "2024-03-07T08:30:00Z",
                    "state": "CHANGES_REQUESTED",
                    "body": "See inline notes"
                },
                {
                    "user": { "login": "carol" },
                    "state": "PENDING",
                    "body": ""
                }
            ]),
        )
        .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();

        let comments = session.list_review_comments(&widget_repo(), 42).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].position, Some(17));
        assert_eq!(comments[1].author, GHOST_LOGIN);
        assert!(comments[1].position.is_none());

        let reviews = session.list_reviews(&widget_repo(), 42).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].state, ReviewState::ChangesRequested);
        assert!(reviews[1].submitted_at.is_none());
        assert_eq!(reviews[1].state, ReviewState::Pending);
    }

    #[tokio::test]
    async fn test_list_issue_comments() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/acme/widget/issues/42/comments",
            json!([
                { "user": { "login": "alice" }, "created_at": "2024-03-05T15:00:00Z", "body": "First" },
                { "user": { "login": "dave" }, "created_at": "2024-03-05T16:00:00Z", "body": "Second" }
            ]),
        )
        .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let comments = session.list_issue_comments(&widget_repo(), 42).await.unwrap();
        let bodies: Vec<&str> = comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, ["First", "Second"]);
    }

    #[tokio::test]
    async fn test_not_found_keeps_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest/repos/repos#get-a-repository"
            })))
            .mount(&server)
            .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let err = session.get_repository("acme", "missing").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(ref m) if m == "Not Found"));
    }

    #[tokio::test]
    async fn test_rate_limit_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_json(json!({ "message": "API rate limit exceeded for 203.0.113.9." })),
            )
            .mount(&server)
            .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let err = session.get_repository("acme", "widget").await.unwrap_err();
        assert!(matches!(err, SessionError::RateLimited(_)));
        assert!(err.to_string().contains("API rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_bad_credentials_classified_as_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let session = GitHubSession::new(Some("expired"), &server.uri()).unwrap();
        let err = session.get_repository("acme", "widget").await.unwrap_err();
        assert!(matches!(err, SessionError::Auth(ref m) if m == "Bad credentials"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let session = GitHubSession::new(None, &server.uri()).unwrap();
        let err = session.get_repository("acme", "widget").await.unwrap_err();
        assert!(matches!(err, SessionError::Decode(_)));
    }

    #[test]
    fn test_classify_error() {
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, false, "Resource not accessible".to_string()),
            SessionError::Auth(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, false, "secondary rate limit".to_string()),
            SessionError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, false, "slow down".to_string()),
            SessionError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, false, "Bad Gateway".to_string()),
            SessionError::Api { status: 502, .. }
        ));
    }
}
