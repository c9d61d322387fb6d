//! GitHub REST and webhook payload types.
//!
//! Only the fields Repobot reads are declared; serde ignores the rest.

use repobot_core::host::ItemSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: User,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

impl Repository {
    pub fn repo_ref(&self) -> repobot_core::RepoRef {
        repobot_core::RepoRef::new(&self.owner.login, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    /// Present when the issue is really a pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

/// A branch tip as seen from a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTip {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: User,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub head: BranchTip,
    pub base: BranchTip,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// Absent for binary or very large diffs
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub user: User,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub pull_request_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub user: User,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: u64,
}

pub(crate) fn label_names(labels: &[Label]) -> Vec<String> {
    labels.iter().map(|l| l.name.clone()).collect()
}

impl From<Issue> for ItemSummary {
    fn from(issue: Issue) -> Self {
        ItemSummary {
            number: issue.number,
            title: issue.title,
            state: issue.state.unwrap_or_else(|| "open".into()),
            author: Some(issue.user.login),
            labels: label_names(&issue.labels),
            url: issue.html_url,
        }
    }
}

impl From<PullRequest> for ItemSummary {
    fn from(pr: PullRequest) -> Self {
        ItemSummary {
            number: pr.number,
            title: pr.title,
            state: pr.state.unwrap_or_else(|| "open".into()),
            author: Some(pr.user.login),
            labels: label_names(&pr.labels),
            url: pr.html_url,
        }
    }
}

// --- internal REST shapes ---

#[derive(Debug, Deserialize)]
pub(crate) struct GitRef {
    pub object: GitObject,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitObject {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Branch {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Tree {
    #[serde(default)]
    pub tree: Vec<TreeItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeItem {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Directory(Vec<ContentItem>),
    Item(ContentItem),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentItem {
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Created {
    pub number: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_parses_with_missing_optional_fields() {
        let issue: Issue = serde_json::from_str(
            r#"{"number": 4, "title": "Typo", "user": {"login": "octocat"}, "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(issue.number, 4);
        assert!(issue.body.is_none());
        assert!(issue.labels.is_empty());
        assert!(issue.pull_request.is_none());
    }

    #[test]
    fn pull_request_ref_rename() {
        let pr: PullRequest = serde_json::from_str(
            r#"{
                "number": 7, "title": "Fix", "body": null,
                "user": {"login": "dev"},
                "labels": [{"name": "Repobot"}],
                "head": {"ref": "fix-4", "sha": "def456"},
                "base": {"ref": "main", "sha": "abc123"}
            }"#,
        )
        .unwrap();
        assert_eq!(pr.head.ref_name, "fix-4");
        assert_eq!(pr.base.ref_name, "main");
        let summary = ItemSummary::from(pr);
        assert_eq!(summary.labels, vec!["Repobot"]);
        assert_eq!(summary.author.as_deref(), Some("dev"));
    }

    #[test]
    fn contents_response_distinguishes_file_and_directory() {
        let file: ContentsResponse = serde_json::from_str(
            r#"{"path": "README.md", "sha": "s1", "type": "file", "content": "aGk=\n"}"#,
        )
        .unwrap();
        assert!(matches!(file, ContentsResponse::Item(ref i) if i.kind == "file"));

        let dir: ContentsResponse = serde_json::from_str(
            r#"[{"path": "docs/a.md", "sha": "s2", "type": "file"}, {"path": "docs/sub", "sha": "s3", "type": "dir"}]"#,
        )
        .unwrap();
        match dir {
            ContentsResponse::Directory(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected directory"),
        }
    }
}
