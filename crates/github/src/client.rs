//! GitHub REST client.
//!
//! Every call is a single request. Failures come back as [`HostError`] whose
//! display text is GitHub's own `message`, which is what the action handlers
//! narrate to the model.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use repobot_core::error::HostError;
use repobot_core::host::{
    Contents, DirEntry, EntryKind, FileWrite, ItemState, ItemSummary, ItemUpdate, LineComment,
    NewPullRequest, RepoHost, RepoRef, TreeEntry,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{
    ApiErrorBody, Branch, ChangedFile, ContentsResponse, Created, GitRef, Issue, PullRequest,
    Repository, Review, Tree,
};

const API_VERSION: &str = "2022-11-28";
const PER_PAGE: &str = "100";

/// Authenticated GitHub REST client.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: Url,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl GithubClient {
    /// Create a client for `api_base` authenticating with `token`.
    pub fn new(api_base: &str, token: &str) -> Result<Self, HostError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("repobot"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| HostError::Network("invalid github authorization header".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HostError::Network(format!("failed to create github client: {e}")))?;

        let api_base = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|e| HostError::Network(format!("invalid github api url '{api_base}': {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(HostError::Network(format!(
                "invalid github api url '{api_base}'"
            )));
        }

        Ok(Self { http, api_base })
    }

    /// Build from the `[github]` configuration section.
    pub fn from_config(config: &repobot_config::GithubConfig) -> Result<Self, HostError> {
        let token = config.token.as_deref().ok_or_else(|| {
            HostError::Network("no GitHub token (set github.token or GITHUB_TOKEN)".into())
        })?;
        Self::new(&config.api_url, token)
    }

    /// `{api_base}/repos/{owner}/{name}/{segments...}` with each segment
    /// percent-encoded. Segments containing `/` are split so file paths
    /// keep their directory structure.
    pub(crate) fn endpoint(&self, repo: &RepoRef, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(["repos", repo.owner.as_str(), repo.name.as_str()]);
            for segment in segments {
                path.extend(segment.split('/').filter(|s| !s.is_empty()));
            }
        }
        url
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<reqwest::Response, HostError> {
        let response = request
            .send()
            .await
            .map_err(|e| HostError::Network(format!("github api {operation} request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| truncate(&body, 400));
        debug!(operation, status = code, %message, "GitHub API error");

        if code == 404 {
            Err(HostError::NotFound)
        } else {
            Err(HostError::Api {
                status: code,
                message,
            })
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, HostError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| HostError::Decode(format!("github {operation}: {e}")))
    }

    async fn request_empty(&self, operation: &str, request: RequestBuilder) -> Result<(), HostError> {
        self.send(operation, request).await.map(|_| ())
    }

    // --- event enrichment reads ---

    pub async fn repository(&self, repo: &RepoRef) -> Result<Repository, HostError> {
        self.request_json("get repository", self.http.get(self.endpoint(repo, &[])))
            .await
    }

    /// Name of the repository's default branch.
    pub async fn default_branch(&self, repo: &RepoRef) -> Result<String, HostError> {
        let repository = self.repository(repo).await?;
        repository
            .default_branch
            .ok_or_else(|| HostError::Decode("repository has no default_branch".into()))
    }

    pub async fn issue(&self, repo: &RepoRef, number: u64) -> Result<Issue, HostError> {
        let url = self.endpoint(repo, &["issues", &number.to_string()]);
        self.request_json("get issue", self.http.get(url)).await
    }

    pub async fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequest, HostError> {
        let url = self.endpoint(repo, &["pulls", &number.to_string()]);
        self.request_json("get pull request", self.http.get(url)).await
    }

    pub async fn pull_request_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<ChangedFile>, HostError> {
        let url = self.endpoint(repo, &["pulls", &number.to_string(), "files"]);
        self.request_json(
            "list pull request files",
            self.http.get(url).query(&[("per_page", PER_PAGE)]),
        )
        .await
    }

    pub async fn review(&self, repo: &RepoRef, number: u64, review_id: u64) -> Result<Review, HostError> {
        let url = self.endpoint(repo, &[
            "pulls",
            &number.to_string(),
            "reviews",
            &review_id.to_string(),
        ]);
        self.request_json("get review", self.http.get(url)).await
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Decode a contents-API payload (base64 with embedded newlines).
pub(crate) fn decode_content(encoded: &str) -> Result<String, HostError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| HostError::Decode(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes).map_err(|_| HostError::Decode("file is not valid UTF-8".into()))
}

fn entry_kind(kind: &str) -> EntryKind {
    match kind {
        "dir" => EntryKind::Dir,
        "symlink" => EntryKind::Symlink,
        "submodule" => EntryKind::Submodule,
        _ => EntryKind::File,
    }
}

fn item_update_body(update: &ItemUpdate) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(title) = &update.title {
        body.insert("title".into(), json!(title));
    }
    if let Some(text) = &update.body {
        body.insert("body".into(), json!(text));
    }
    if let Some(state) = update.state {
        body.insert("state".into(), json!(state.as_str()));
    }
    serde_json::Value::Object(body)
}

#[async_trait]
impl RepoHost for GithubClient {
    fn name(&self) -> &str {
        "github"
    }

    async fn branch_sha(&self, repo: &RepoRef, branch: &str) -> Result<String, HostError> {
        let url = self.endpoint(repo, &["git", "refs", "heads", branch]);
        let reference: GitRef = self.request_json("get ref", self.http.get(url)).await?;
        Ok(reference.object.sha)
    }

    async fn create_branch_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["git", "refs"]);
        let body = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        self.request_empty("create ref", self.http.post(url).json(&body)).await
    }

    async fn update_branch_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["git", "refs", "heads", branch]);
        self.request_empty("update ref", self.http.patch(url).json(&json!({ "sha": sha })))
            .await
    }

    async fn delete_branch_ref(&self, repo: &RepoRef, branch: &str) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["git", "refs", "heads", branch]);
        self.request_empty("delete ref", self.http.delete(url)).await
    }

    async fn list_branches(&self, repo: &RepoRef) -> Result<Vec<String>, HostError> {
        let url = self.endpoint(repo, &["branches"]);
        let branches: Vec<Branch> = self
            .request_json("list branches", self.http.get(url).query(&[("per_page", PER_PAGE)]))
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn file_tree(&self, repo: &RepoRef, branch: &str, start_path: &str) -> Result<Vec<TreeEntry>, HostError> {
        let start = start_path.trim_matches('/');
        let tree_ish = if start.is_empty() {
            branch.to_string()
        } else {
            format!("{branch}:{start}")
        };
        let mut url = self.endpoint(repo, &["git", "trees"]);
        if let Ok(mut path) = url.path_segments_mut() {
            path.push(&tree_ish);
        }
        let tree: Tree = self
            .request_json("get tree", self.http.get(url).query(&[("recursive", "1")]))
            .await?;
        Ok(tree
            .tree
            .into_iter()
            .filter_map(|item| {
                Some(TreeEntry {
                    path: item.path?,
                    kind: item.kind?,
                    sha: item.sha?,
                })
            })
            .collect())
    }

    async fn contents(&self, repo: &RepoRef, branch: &str, path: &str) -> Result<Contents, HostError> {
        let url = self.endpoint(repo, &["contents", path]);
        let response: ContentsResponse = self
            .request_json("get contents", self.http.get(url).query(&[("ref", branch)]))
            .await?;
        match response {
            ContentsResponse::Directory(items) => Ok(Contents::Directory(
                items
                    .into_iter()
                    .map(|i| DirEntry {
                        kind: entry_kind(&i.kind),
                        path: i.path,
                        sha: i.sha,
                    })
                    .collect(),
            )),
            ContentsResponse::Item(item) if item.kind == "file" => {
                let content = match item.content.as_deref() {
                    Some(encoded) => decode_content(encoded)?,
                    None => String::new(),
                };
                Ok(Contents::File {
                    sha: item.sha,
                    content,
                })
            }
            ContentsResponse::Item(item) => {
                warn!(path = %item.path, kind = %item.kind, "Contents entry is not a file");
                Err(HostError::NotAFile)
            }
        }
    }

    async fn put_file(&self, repo: &RepoRef, write: FileWrite) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["contents", &write.path]);
        let mut body = json!({
            "message": write.message,
            "content": STANDARD.encode(write.content.as_bytes()),
            "branch": write.branch,
        });
        if let Some(sha) = write.sha {
            body["sha"] = json!(sha);
        }
        self.request_empty("put contents", self.http.put(url).json(&body)).await
    }

    async fn delete_file(&self, repo: &RepoRef, branch: &str, path: &str, sha: &str, message: &str) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["contents", path]);
        let body = json!({ "message": message, "sha": sha, "branch": branch });
        self.request_empty("delete contents", self.http.delete(url).json(&body))
            .await
    }

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<u64, HostError> {
        let url = self.endpoint(repo, &["issues"]);
        let created: Created = self
            .request_json(
                "create issue",
                self.http.post(url).json(&json!({ "title": title, "body": body })),
            )
            .await?;
        Ok(created.number)
    }

    async fn update_issue(&self, repo: &RepoRef, number: u64, update: ItemUpdate) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["issues", &number.to_string()]);
        self.request_empty("update issue", self.http.patch(url).json(&item_update_body(&update)))
            .await
    }

    async fn list_issues(&self, repo: &RepoRef, state: ItemState) -> Result<Vec<ItemSummary>, HostError> {
        let url = self.endpoint(repo, &["issues"]);
        let issues: Vec<Issue> = self
            .request_json(
                "list issues",
                self.http
                    .get(url)
                    .query(&[("state", state.as_str()), ("per_page", PER_PAGE)]),
            )
            .await?;
        // The issues endpoint also returns pull requests.
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(ItemSummary::from)
            .collect())
    }

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["issues", &number.to_string(), "comments"]);
        self.request_empty("create comment", self.http.post(url).json(&json!({ "body": body })))
            .await
    }

    async fn create_pull_request(&self, repo: &RepoRef, pr: NewPullRequest) -> Result<u64, HostError> {
        let url = self.endpoint(repo, &["pulls"]);
        let body = json!({ "title": pr.title, "body": pr.body, "head": pr.head, "base": pr.base });
        let created: Created = self
            .request_json("create pull request", self.http.post(url).json(&body))
            .await?;
        Ok(created.number)
    }

    async fn update_pull_request(&self, repo: &RepoRef, number: u64, update: ItemUpdate) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["pulls", &number.to_string()]);
        self.request_empty(
            "update pull request",
            self.http.patch(url).json(&item_update_body(&update)),
        )
        .await
    }

    async fn list_pull_requests(&self, repo: &RepoRef, state: ItemState) -> Result<Vec<ItemSummary>, HostError> {
        let url = self.endpoint(repo, &["pulls"]);
        let pulls: Vec<PullRequest> = self
            .request_json(
                "list pull requests",
                self.http
                    .get(url)
                    .query(&[("state", state.as_str()), ("per_page", PER_PAGE)]),
            )
            .await?;
        Ok(pulls.into_iter().map(ItemSummary::from).collect())
    }

    async fn create_line_comment(&self, repo: &RepoRef, number: u64, comment: LineComment) -> Result<(), HostError> {
        let url = self.endpoint(repo, &["pulls", &number.to_string(), "comments"]);
        let body = json!({
            "commit_id": comment.commit_id,
            "body": comment.body,
            "path": comment.path,
            "position": comment.position,
        });
        self.request_empty("create review comment", self.http.post(url).json(&body))
            .await
    }

    async fn reply_to_review_comment(&self, repo: &RepoRef, number: u64, comment_id: u64, body: &str) -> Result<(), HostError> {
        let url = self.endpoint(repo, &[
            "pulls",
            &number.to_string(),
            "comments",
            &comment_id.to_string(),
            "replies",
        ]);
        self.request_empty("reply to review comment", self.http.post(url).json(&json!({ "body": body })))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> GithubClient {
        GithubClient::new(base, "ghp_test").unwrap()
    }

    #[test]
    fn endpoint_builds_repo_paths() {
        let c = client("https://api.github.com");
        let repo = RepoRef::new("octo", "demo");
        assert_eq!(
            c.endpoint(&repo, &["git", "refs", "heads", "main"]).as_str(),
            "https://api.github.com/repos/octo/demo/git/refs/heads/main"
        );
    }

    #[test]
    fn endpoint_keeps_enterprise_prefix_and_encodes() {
        let c = client("https://ghe.example.com/api/v3/");
        let repo = RepoRef::new("octo", "demo");
        assert_eq!(
            c.endpoint(&repo, &["contents", "docs/my file.md"]).as_str(),
            "https://ghe.example.com/api/v3/repos/octo/demo/contents/docs/my%20file.md"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(GithubClient::new("not a url", "t").is_err());
    }

    #[test]
    fn from_config_requires_token() {
        let config = repobot_config::GithubConfig::default();
        assert!(GithubClient::from_config(&config).is_err());
    }

    #[test]
    fn decode_content_strips_newlines() {
        assert_eq!(decode_content("aGVs\nbG8=\n").unwrap(), "hello");
        assert!(decode_content("!!!").is_err());
    }

    #[test]
    fn update_body_only_carries_set_fields() {
        let body = item_update_body(&ItemUpdate {
            state: Some(ItemState::Closed),
            ..Default::default()
        });
        assert_eq!(body, json!({ "state": "closed" }));

        let body = item_update_body(&ItemUpdate {
            title: Some("t".into()),
            body: Some("b".into()),
            state: None,
        });
        assert_eq!(body, json!({ "title": "t", "body": "b" }));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "é".repeat(10);
        let t = truncate(&s, 5);
        assert!(t.ends_with("..."));
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn debug_hides_token() {
        let text = format!("{:?}", client("https://api.github.com"));
        assert!(!text.contains("ghp_test"));
    }

    // --- over the wire ---

    fn repo() -> RepoRef {
        RepoRef::new("octo", "demo")
    }

    #[tokio::test]
    async fn missing_file_is_not_found_and_write_creates_without_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/docs/new.md"))
            .and(query_param("ref", "fix-4"))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/octo/demo/contents/docs/new.md"))
            .and(body_json(json!({
                "message": "add docs",
                "content": STANDARD.encode("hello"),
                "branch": "fix-4",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server.uri());
        let err = c.contents(&repo(), "fix-4", "docs/new.md").await.unwrap_err();
        assert!(matches!(err, HostError::NotFound));

        c.put_file(&repo(), FileWrite {
            branch: "fix-4".into(),
            path: "docs/new.md".into(),
            content: "hello".into(),
            message: "add docs".into(),
            sha: None,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn existing_file_is_updated_with_its_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/contents/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "path": "README.md",
                "sha": "blob1",
                "type": "file",
                "content": "aGVs\nbG8=\n",
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/octo/demo/contents/README.md"))
            .and(body_partial_json(json!({ "sha": "blob1", "branch": "main" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server.uri());
        let sha = match c.contents(&repo(), "main", "README.md").await.unwrap() {
            Contents::File { sha, content } => {
                assert_eq!(content, "hello");
                sha
            }
            other => panic!("expected a file, got {other:?}"),
        };
        c.put_file(&repo(), FileWrite {
            branch: "main".into(),
            path: "README.md".into(),
            content: "hello again".into(),
            message: "update readme".into(),
            sha: Some(sha),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn error_message_comes_from_github_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/demo/git/refs"))
            .and(body_json(json!({ "ref": "refs/heads/fix-4", "sha": "abc" })))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({
                    "message": "Reference already exists",
                    "documentation_url": "https://docs.github.com/rest/git/refs#create-a-reference",
                })),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .create_branch_ref(&repo(), "fix-4", "abc")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Reference already exists");
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/branches"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).list_branches(&repo()).await.unwrap_err();
        assert!(matches!(err, HostError::Api { status: 502, ref message } if message == "Bad gateway"));
    }

    #[tokio::test]
    async fn line_comment_posts_position_on_pull_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/demo/pulls/7/comments"))
            .and(body_json(json!({
                "commit_id": "c1",
                "body": "Consider a constant here",
                "path": "src/lib.rs",
                "position": 3,
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .create_line_comment(&repo(), 7, LineComment {
                commit_id: "c1".into(),
                body: "Consider a constant here".into(),
                path: "src/lib.rs".into(),
                position: 3,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reply_targets_the_comment_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/demo/pulls/7/comments/99/replies"))
            .and(body_json(json!({ "body": "Fixed in the latest push" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 100 })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .reply_to_review_comment(&repo(), 7, 99, "Fixed in the latest push")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tree_is_recursive_from_start_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main:src"))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sha": "t1",
                "tree": [
                    { "path": "lib.rs", "type": "blob", "sha": "b1" },
                    { "path": "bin", "type": "tree", "sha": "b2" },
                ],
                "truncated": false,
            })))
            .mount(&server)
            .await;

        let entries = client(&server.uri())
            .file_tree(&repo(), "main", "/src/")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "lib.rs");
        assert_eq!(entries[1].kind, "tree");
    }
}
