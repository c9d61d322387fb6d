//! RepoHost trait: the abstraction over a code-hosting platform.
//!
//! These are plain request/response wrappers: no retries, no caching, no
//! state. Composite behaviour (look up a base SHA then create a ref, recurse
//! through a folder) belongs to the action handlers built on top.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name`.
    pub fn parse(s: &str) -> Option<Self> {
        let (owner, name) = s.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The ambient binding threaded into every action invocation.
///
/// Built once per triggering event and never mutated afterwards.
#[derive(Clone)]
pub struct OperationContext {
    pub host: Arc<dyn RepoHost>,
    pub repo: RepoRef,
}

impl OperationContext {
    pub fn new(host: Arc<dyn RepoHost>, repo: RepoRef) -> Self {
        Self { host, repo }
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("host", &self.host.name())
            .field("repo", &self.repo)
            .finish()
    }
}

/// Issue / pull request state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Open,
    Closed,
    All,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Open => "open",
            ItemState::Closed => "closed",
            ItemState::All => "all",
        }
    }
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One entry of a single-level directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub path: String,
    pub kind: EntryKind,
    pub sha: String,
}

/// What lives at a path on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contents {
    File { sha: String, content: String },
    Directory(Vec<DirEntry>),
}

/// A file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
    /// Existing blob SHA when updating; `None` creates the file.
    pub sha: Option<String>,
}

/// Fields to change on an issue or pull request. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: Option<ItemState>,
}

/// A new pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// A comment anchored to a line of a pull request diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineComment {
    pub commit_id: String,
    pub body: String,
    pub path: String,
    pub position: u64,
}

/// Compact issue or pull request listing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The code-hosting operations action handlers are built on.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Platform name for logs (e.g. "github").
    fn name(&self) -> &str;

    // --- branches ---

    /// Commit SHA at the head of `branch`.
    async fn branch_sha(&self, repo: &RepoRef, branch: &str) -> Result<String, HostError>;
    async fn create_branch_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), HostError>;
    async fn update_branch_ref(&self, repo: &RepoRef, branch: &str, sha: &str) -> Result<(), HostError>;
    async fn delete_branch_ref(&self, repo: &RepoRef, branch: &str) -> Result<(), HostError>;
    async fn list_branches(&self, repo: &RepoRef) -> Result<Vec<String>, HostError>;

    // --- files ---

    async fn file_tree(
        &self,
        repo: &RepoRef,
        branch: &str,
        start_path: &str,
    ) -> Result<Vec<TreeEntry>, HostError>;
    async fn contents(&self, repo: &RepoRef, branch: &str, path: &str) -> Result<Contents, HostError>;
    async fn put_file(&self, repo: &RepoRef, write: FileWrite) -> Result<(), HostError>;
    async fn delete_file(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
        sha: &str,
        message: &str,
    ) -> Result<(), HostError>;

    // --- issues ---

    async fn create_issue(&self, repo: &RepoRef, title: &str, body: &str) -> Result<u64, HostError>;
    async fn update_issue(&self, repo: &RepoRef, number: u64, update: ItemUpdate) -> Result<(), HostError>;
    async fn list_issues(&self, repo: &RepoRef, state: ItemState) -> Result<Vec<ItemSummary>, HostError>;
    /// Post a conversation comment. Pull requests share the issue comment
    /// thread, so this serves both.
    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<(), HostError>;

    // --- pull requests ---

    async fn create_pull_request(&self, repo: &RepoRef, pr: NewPullRequest) -> Result<u64, HostError>;
    async fn update_pull_request(&self, repo: &RepoRef, number: u64, update: ItemUpdate) -> Result<(), HostError>;
    async fn list_pull_requests(&self, repo: &RepoRef, state: ItemState) -> Result<Vec<ItemSummary>, HostError>;
    async fn create_line_comment(&self, repo: &RepoRef, number: u64, comment: LineComment) -> Result<(), HostError>;
    async fn reply_to_review_comment(
        &self,
        repo: &RepoRef,
        number: u64,
        comment_id: u64,
        body: &str,
    ) -> Result<(), HostError>;
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! In-memory hosts for tests across the workspace.

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    /// A host that rejects every call.
    pub struct NullHost;

    fn unsupported<T>() -> Result<T, HostError> {
        Err(HostError::Network("null host".into()))
    }

    #[async_trait]
    impl RepoHost for NullHost {
        fn name(&self) -> &str {
            "null"
        }
        async fn branch_sha(&self, _: &RepoRef, _: &str) -> Result<String, HostError> {
            unsupported()
        }
        async fn create_branch_ref(&self, _: &RepoRef, _: &str, _: &str) -> Result<(), HostError> {
            unsupported()
        }
        async fn update_branch_ref(&self, _: &RepoRef, _: &str, _: &str) -> Result<(), HostError> {
            unsupported()
        }
        async fn delete_branch_ref(&self, _: &RepoRef, _: &str) -> Result<(), HostError> {
            unsupported()
        }
        async fn list_branches(&self, _: &RepoRef) -> Result<Vec<String>, HostError> {
            unsupported()
        }
        async fn file_tree(&self, _: &RepoRef, _: &str, _: &str) -> Result<Vec<TreeEntry>, HostError> {
            unsupported()
        }
        async fn contents(&self, _: &RepoRef, _: &str, _: &str) -> Result<Contents, HostError> {
            unsupported()
        }
        async fn put_file(&self, _: &RepoRef, _: FileWrite) -> Result<(), HostError> {
            unsupported()
        }
        async fn delete_file(&self, _: &RepoRef, _: &str, _: &str, _: &str, _: &str) -> Result<(), HostError> {
            unsupported()
        }
        async fn create_issue(&self, _: &RepoRef, _: &str, _: &str) -> Result<u64, HostError> {
            unsupported()
        }
        async fn update_issue(&self, _: &RepoRef, _: u64, _: ItemUpdate) -> Result<(), HostError> {
            unsupported()
        }
        async fn list_issues(&self, _: &RepoRef, _: ItemState) -> Result<Vec<ItemSummary>, HostError> {
            unsupported()
        }
        async fn create_comment(&self, _: &RepoRef, _: u64, _: &str) -> Result<(), HostError> {
            unsupported()
        }
        async fn create_pull_request(&self, _: &RepoRef, _: NewPullRequest) -> Result<u64, HostError> {
            unsupported()
        }
        async fn update_pull_request(&self, _: &RepoRef, _: u64, _: ItemUpdate) -> Result<(), HostError> {
            unsupported()
        }
        async fn list_pull_requests(&self, _: &RepoRef, _: ItemState) -> Result<Vec<ItemSummary>, HostError> {
            unsupported()
        }
        async fn create_line_comment(&self, _: &RepoRef, _: u64, _: LineComment) -> Result<(), HostError> {
            unsupported()
        }
        async fn reply_to_review_comment(&self, _: &RepoRef, _: u64, _: u64, _: &str) -> Result<(), HostError> {
            unsupported()
        }
    }

    #[derive(Debug, Clone)]
    struct StoredItem {
        title: String,
        body: String,
        state: ItemState,
        is_pull: bool,
    }

    #[derive(Default)]
    struct State {
        /// branch -> head sha
        branches: BTreeMap<String, String>,
        /// (branch, path) -> content
        files: BTreeMap<(String, String), String>,
        items: BTreeMap<u64, StoredItem>,
        comments: Vec<(u64, String)>,
        line_comments: Vec<(u64, LineComment)>,
        replies: Vec<(u64, u64, String)>,
        calls: Vec<String>,
        next_number: u64,
    }

    /// A stateful in-memory repository that records every call in order.
    ///
    /// Writes to a branch that does not exist fail the way the real platform
    /// does, so tests can observe ordering between dependent actions.
    pub struct InMemoryHost {
        state: Mutex<State>,
    }

    impl Default for InMemoryHost {
        fn default() -> Self {
            Self::new()
        }
    }

    fn blob_sha(content: &str) -> String {
        format!("blob{:08x}", content.len() * 2654435761 % 0xffff_ffff)
    }

    impl InMemoryHost {
        /// A repository with a single `main` branch at `abc123`.
        pub fn new() -> Self {
            let mut state = State {
                next_number: 1,
                ..State::default()
            };
            state.branches.insert("main".into(), "abc123".into());
            Self {
                state: Mutex::new(state),
            }
        }

        pub fn with_file(self, branch: &str, path: &str, content: &str) -> Self {
            self.lock()
                .files
                .insert((branch.into(), path.into()), content.into());
            self
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn record(&self, call: String) {
            self.lock().calls.push(call);
        }

        /// Every call made so far, e.g. `create_branch_ref(fix-4)`.
        pub fn calls(&self) -> Vec<String> {
            self.lock().calls.clone()
        }

        pub fn has_branch(&self, branch: &str) -> bool {
            self.lock().branches.contains_key(branch)
        }

        pub fn file(&self, branch: &str, path: &str) -> Option<String> {
            self.lock()
                .files
                .get(&(branch.to_string(), path.to_string()))
                .cloned()
        }

        pub fn comments(&self) -> Vec<(u64, String)> {
            self.lock().comments.clone()
        }

        pub fn line_comments(&self) -> Vec<(u64, LineComment)> {
            self.lock().line_comments.clone()
        }

        pub fn replies(&self) -> Vec<(u64, u64, String)> {
            self.lock().replies.clone()
        }

        pub fn item_state(&self, number: u64) -> Option<ItemState> {
            self.lock().items.get(&number).map(|i| i.state)
        }

        fn require_branch(state: &State, branch: &str) -> Result<(), HostError> {
            if state.branches.contains_key(branch) {
                Ok(())
            } else {
                Err(HostError::Api {
                    status: 404,
                    message: format!("Branch {branch} not found"),
                })
            }
        }

        fn summaries(&self, state: ItemState, pulls: bool) -> Vec<ItemSummary> {
            self.lock()
                .items
                .iter()
                .filter(|(_, i)| i.is_pull == pulls)
                .filter(|(_, i)| state == ItemState::All || i.state == state)
                .map(|(n, i)| ItemSummary {
                    number: *n,
                    title: i.title.clone(),
                    state: i.state.as_str().into(),
                    author: None,
                    labels: vec![],
                    url: None,
                })
                .collect()
        }

        fn update_item(&self, number: u64, update: ItemUpdate, pulls: bool) -> Result<(), HostError> {
            let mut s = self.lock();
            let item = s
                .items
                .get_mut(&number)
                .filter(|i| i.is_pull == pulls)
                .ok_or(HostError::NotFound)?;
            if let Some(title) = update.title {
                item.title = title;
            }
            if let Some(body) = update.body {
                item.body = body;
            }
            if let Some(state) = update.state {
                item.state = state;
            }
            Ok(())
        }

        fn insert_item(&self, title: &str, body: &str, is_pull: bool) -> u64 {
            let mut s = self.lock();
            let number = s.next_number;
            s.next_number += 1;
            s.items.insert(number, StoredItem {
                title: title.into(),
                body: body.into(),
                state: ItemState::Open,
                is_pull,
            });
            number
        }

        /// Body of an issue or pull request.
        pub fn item_body(&self, number: u64) -> Option<String> {
            self.lock().items.get(&number).map(|i| i.body.clone())
        }
    }

    #[async_trait]
    impl RepoHost for InMemoryHost {
        fn name(&self) -> &str {
            "in-memory"
        }

        async fn branch_sha(&self, _: &RepoRef, branch: &str) -> Result<String, HostError> {
            self.record(format!("branch_sha({branch})"));
            self.lock()
                .branches
                .get(branch)
                .cloned()
                .ok_or(HostError::NotFound)
        }

        async fn create_branch_ref(&self, _: &RepoRef, branch: &str, sha: &str) -> Result<(), HostError> {
            self.record(format!("create_branch_ref({branch})"));
            let mut s = self.lock();
            if s.branches.contains_key(branch) {
                return Err(HostError::Api {
                    status: 422,
                    message: "Reference already exists".into(),
                });
            }
            s.branches.insert(branch.into(), sha.into());
            Ok(())
        }

        async fn update_branch_ref(&self, _: &RepoRef, branch: &str, sha: &str) -> Result<(), HostError> {
            self.record(format!("update_branch_ref({branch})"));
            let mut s = self.lock();
            match s.branches.get_mut(branch) {
                Some(head) => {
                    *head = sha.into();
                    Ok(())
                }
                None => Err(HostError::NotFound),
            }
        }

        async fn delete_branch_ref(&self, _: &RepoRef, branch: &str) -> Result<(), HostError> {
            self.record(format!("delete_branch_ref({branch})"));
            self.lock()
                .branches
                .remove(branch)
                .map(|_| ())
                .ok_or(HostError::NotFound)
        }

        async fn list_branches(&self, _: &RepoRef) -> Result<Vec<String>, HostError> {
            self.record("list_branches".into());
            Ok(self.lock().branches.keys().cloned().collect())
        }

        async fn file_tree(&self, _: &RepoRef, branch: &str, start_path: &str) -> Result<Vec<TreeEntry>, HostError> {
            self.record(format!("file_tree({branch})"));
            let s = self.lock();
            Self::require_branch(&s, branch)?;
            let prefix = start_path.trim_matches('/');
            Ok(s.files
                .iter()
                .filter(|((b, p), _)| b == branch && p.starts_with(prefix))
                .map(|((_, p), c)| TreeEntry {
                    path: p.trim_start_matches(prefix).trim_start_matches('/').to_string(),
                    kind: "blob".into(),
                    sha: blob_sha(c),
                })
                .collect())
        }

        async fn contents(&self, _: &RepoRef, branch: &str, path: &str) -> Result<Contents, HostError> {
            self.record(format!("contents({branch}:{path})"));
            let s = self.lock();
            Self::require_branch(&s, branch)?;
            if let Some(content) = s.files.get(&(branch.to_string(), path.to_string())) {
                return Ok(Contents::File {
                    sha: blob_sha(content),
                    content: content.clone(),
                });
            }
            let dir = format!("{}/", path.trim_end_matches('/'));
            let mut entries: Vec<DirEntry> = Vec::new();
            for ((b, p), c) in s.files.iter() {
                if b != branch {
                    continue;
                }
                let Some(rest) = p.strip_prefix(&dir) else {
                    continue;
                };
                let entry = match rest.split_once('/') {
                    Some((sub, _)) => DirEntry {
                        path: format!("{dir}{sub}"),
                        kind: EntryKind::Dir,
                        sha: String::new(),
                    },
                    None => DirEntry {
                        path: p.clone(),
                        kind: EntryKind::File,
                        sha: blob_sha(c),
                    },
                };
                if !entries.iter().any(|e| e.path == entry.path) {
                    entries.push(entry);
                }
            }
            if entries.is_empty() {
                Err(HostError::NotFound)
            } else {
                Ok(Contents::Directory(entries))
            }
        }

        async fn put_file(&self, _: &RepoRef, write: FileWrite) -> Result<(), HostError> {
            self.record(format!("put_file({}:{})", write.branch, write.path));
            let mut s = self.lock();
            Self::require_branch(&s, &write.branch)?;
            let key = (write.branch, write.path);
            match (s.files.get(&key), &write.sha) {
                (Some(_), None) => {
                    return Err(HostError::Api {
                        status: 422,
                        message: "\"sha\" wasn't supplied.".into(),
                    });
                }
                (Some(existing), Some(sha)) if blob_sha(existing) != *sha => {
                    return Err(HostError::Api {
                        status: 409,
                        message: "sha does not match".into(),
                    });
                }
                _ => {}
            }
            s.files.insert(key, write.content);
            Ok(())
        }

        async fn delete_file(&self, _: &RepoRef, branch: &str, path: &str, _sha: &str, _message: &str) -> Result<(), HostError> {
            self.record(format!("delete_file({branch}:{path})"));
            let mut s = self.lock();
            Self::require_branch(&s, branch)?;
            s.files
                .remove(&(branch.to_string(), path.to_string()))
                .map(|_| ())
                .ok_or(HostError::NotFound)
        }

        async fn create_issue(&self, _: &RepoRef, title: &str, body: &str) -> Result<u64, HostError> {
            self.record(format!("create_issue({title})"));
            Ok(self.insert_item(title, body, false))
        }

        async fn update_issue(&self, _: &RepoRef, number: u64, update: ItemUpdate) -> Result<(), HostError> {
            self.record(format!("update_issue({number})"));
            self.update_item(number, update, false)
        }

        async fn list_issues(&self, _: &RepoRef, state: ItemState) -> Result<Vec<ItemSummary>, HostError> {
            self.record(format!("list_issues({})", state.as_str()));
            Ok(self.summaries(state, false))
        }

        async fn create_comment(&self, _: &RepoRef, number: u64, body: &str) -> Result<(), HostError> {
            self.record(format!("create_comment({number})"));
            self.lock().comments.push((number, body.into()));
            Ok(())
        }

        async fn create_pull_request(&self, _: &RepoRef, pr: NewPullRequest) -> Result<u64, HostError> {
            self.record(format!("create_pull_request({}->{})", pr.head, pr.base));
            {
                let s = self.lock();
                Self::require_branch(&s, &pr.head)?;
                Self::require_branch(&s, &pr.base)?;
            }
            Ok(self.insert_item(&pr.title, &pr.body, true))
        }

        async fn update_pull_request(&self, _: &RepoRef, number: u64, update: ItemUpdate) -> Result<(), HostError> {
            self.record(format!("update_pull_request({number})"));
            self.update_item(number, update, true)
        }

        async fn list_pull_requests(&self, _: &RepoRef, state: ItemState) -> Result<Vec<ItemSummary>, HostError> {
            self.record(format!("list_pull_requests({})", state.as_str()));
            Ok(self.summaries(state, true))
        }

        async fn create_line_comment(&self, _: &RepoRef, number: u64, comment: LineComment) -> Result<(), HostError> {
            self.record(format!("create_line_comment({number})"));
            self.lock().line_comments.push((number, comment));
            Ok(())
        }

        async fn reply_to_review_comment(&self, _: &RepoRef, number: u64, comment_id: u64, body: &str) -> Result<(), HostError> {
            self.record(format!("reply_to_review_comment({number}, {comment_id})"));
            self.lock().replies.push((number, comment_id, body.into()));
            Ok(())
        }
    }
}
