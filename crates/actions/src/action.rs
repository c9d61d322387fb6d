//! Typed action requests.
//!
//! [`GithubAction`] is the closed set of operations the model can request.
//! Arguments are bound by parameter name into each variant's fields, so a
//! missing or mistyped argument is reported instead of silently shifting
//! every later argument.

use repobot_core::action::{ActionOutcome, ActionRequest};
use repobot_core::host::{ItemState, OperationContext};
use serde::{Deserialize, Deserializer};

use crate::catalog::ActionFamily;
use crate::{branches, files, issues, pulls};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(
    tag = "name",
    content = "input",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GithubAction {
    // --- reader ---
    GetRepoFileTree {
        branch: String,
        #[serde(default)]
        start_path: String,
    },
    ReadFile {
        branch: String,
        file_path: String,
    },

    // --- writer ---
    CreateOrUpdateFile {
        branch: String,
        file_path: String,
        content: String,
        commit_message: String,
    },
    DeleteFile {
        branch: String,
        file_path: String,
        commit_message: String,
    },
    DeleteFilesInFolder {
        branch: String,
        folder_path: String,
        commit_message: String,
    },

    // --- branches ---
    CreateBranch {
        branch_name: String,
        base_branch: String,
    },
    UpdateBranch {
        branch_name: String,
        new_base: String,
    },
    DeleteBranch {
        branch_name: String,
    },
    ListBranches {},

    // --- issues ---
    CreateIssue {
        title: String,
        body: String,
    },
    UpdateIssue {
        #[serde(deserialize_with = "lenient_u64")]
        issue_number: u64,
        title: String,
        body: String,
    },
    DeleteIssue {
        #[serde(deserialize_with = "lenient_u64")]
        issue_number: u64,
    },
    ListIssues {
        #[serde(default)]
        state: ItemState,
    },
    CommentOnIssue {
        #[serde(deserialize_with = "lenient_u64")]
        issue_number: u64,
        comment_body: String,
    },

    // --- pull requests ---
    CreatePullRequest {
        title: String,
        body: String,
        head: String,
        base: String,
    },
    UpdatePullRequest {
        #[serde(deserialize_with = "lenient_u64")]
        pr_number: u64,
        title: String,
        body: String,
    },
    ClosePullRequest {
        #[serde(deserialize_with = "lenient_u64")]
        pr_number: u64,
    },
    ListPullRequests {
        #[serde(default)]
        state: ItemState,
    },
    AddCommentToPullRequest {
        #[serde(deserialize_with = "lenient_u64")]
        pr_number: u64,
        body: String,
    },
    AddLineCommentToPullRequest {
        #[serde(deserialize_with = "lenient_u64")]
        pr_number: u64,
        commit_id: String,
        body: String,
        path: String,
        #[serde(deserialize_with = "lenient_u64")]
        position: u64,
    },
    AddReplyToPullRequestComment {
        #[serde(deserialize_with = "lenient_u64")]
        pr_number: u64,
        #[serde(deserialize_with = "lenient_u64")]
        comment_id: u64,
        body: String,
    },
}

/// Accept `12`, `12.0` or `"12"` for numeric ids. Models are not always
/// consistent about JSON number vs string.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer, got {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .trim_start_matches('#')
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a non-negative integer, got \"{s}\""))),
        other => Err(D::Error::custom(format!(
            "expected a non-negative integer, got {other}"
        ))),
    }
}

impl GithubAction {
    /// Bind a request's arguments to the matching variant.
    ///
    /// The error text is what the model sees in the action result.
    pub fn parse(request: &ActionRequest) -> Result<Self, String> {
        let input = match &request.input {
            serde_json::Value::Null => serde_json::json!({}),
            other => other.clone(),
        };
        let tagged = serde_json::json!({ "name": request.name, "input": input });
        serde_json::from_value(tagged)
            .map_err(|e| format!("Invalid arguments for '{}': {e}", request.name))
    }

    pub fn name(&self) -> &'static str {
        match self {
            GithubAction::GetRepoFileTree { .. } => "getRepoFileTree",
            GithubAction::ReadFile { .. } => "readFile",
            GithubAction::CreateOrUpdateFile { .. } => "createOrUpdateFile",
            GithubAction::DeleteFile { .. } => "deleteFile",
            GithubAction::DeleteFilesInFolder { .. } => "deleteFilesInFolder",
            GithubAction::CreateBranch { .. } => "createBranch",
            GithubAction::UpdateBranch { .. } => "updateBranch",
            GithubAction::DeleteBranch { .. } => "deleteBranch",
            GithubAction::ListBranches {} => "listBranches",
            GithubAction::CreateIssue { .. } => "createIssue",
            GithubAction::UpdateIssue { .. } => "updateIssue",
            GithubAction::DeleteIssue { .. } => "deleteIssue",
            GithubAction::ListIssues { .. } => "listIssues",
            GithubAction::CommentOnIssue { .. } => "commentOnIssue",
            GithubAction::CreatePullRequest { .. } => "createPullRequest",
            GithubAction::UpdatePullRequest { .. } => "updatePullRequest",
            GithubAction::ClosePullRequest { .. } => "closePullRequest",
            GithubAction::ListPullRequests { .. } => "listPullRequests",
            GithubAction::AddCommentToPullRequest { .. } => "addCommentToPullRequest",
            GithubAction::AddLineCommentToPullRequest { .. } => "addLineCommentToPullRequest",
            GithubAction::AddReplyToPullRequestComment { .. } => "addReplyToPullRequestComment",
        }
    }

    pub fn family(&self) -> ActionFamily {
        use GithubAction::*;
        match self {
            GetRepoFileTree { .. } | ReadFile { .. } => ActionFamily::Reader,
            CreateOrUpdateFile { .. } | DeleteFile { .. } | DeleteFilesInFolder { .. } => {
                ActionFamily::Writer
            }
            CreateBranch { .. } | UpdateBranch { .. } | DeleteBranch { .. } | ListBranches {} => {
                ActionFamily::Branches
            }
            CreateIssue { .. }
            | UpdateIssue { .. }
            | DeleteIssue { .. }
            | ListIssues { .. }
            | CommentOnIssue { .. } => ActionFamily::Issues,
            CreatePullRequest { .. }
            | UpdatePullRequest { .. }
            | ClosePullRequest { .. }
            | ListPullRequests { .. }
            | AddCommentToPullRequest { .. }
            | AddLineCommentToPullRequest { .. }
            | AddReplyToPullRequestComment { .. } => ActionFamily::PullRequests,
        }
    }

    /// Run the action against the context's host.
    pub async fn execute(self, ctx: &OperationContext) -> ActionOutcome {
        use GithubAction::*;
        match self {
            GetRepoFileTree { branch, start_path } => files::repo_file_tree(ctx, &branch, &start_path).await,
            ReadFile { branch, file_path } => files::read_file(ctx, &branch, &file_path).await,
            CreateOrUpdateFile {
                branch,
                file_path,
                content,
                commit_message,
            } => files::create_or_update_file(ctx, branch, file_path, content, commit_message).await,
            DeleteFile {
                branch,
                file_path,
                commit_message,
            } => files::delete_file(ctx, &branch, &file_path, &commit_message).await,
            DeleteFilesInFolder {
                branch,
                folder_path,
                commit_message,
            } => files::delete_files_in_folder(ctx, &branch, &folder_path, &commit_message).await,

            CreateBranch {
                branch_name,
                base_branch,
            } => branches::create_branch(ctx, &branch_name, &base_branch).await,
            UpdateBranch {
                branch_name,
                new_base,
            } => branches::update_branch(ctx, &branch_name, &new_base).await,
            DeleteBranch { branch_name } => branches::delete_branch(ctx, &branch_name).await,
            ListBranches {} => branches::list_branches(ctx).await,

            CreateIssue { title, body } => issues::create_issue(ctx, &title, &body).await,
            UpdateIssue {
                issue_number,
                title,
                body,
            } => issues::update_issue(ctx, issue_number, title, body).await,
            DeleteIssue { issue_number } => issues::close_issue(ctx, issue_number).await,
            ListIssues { state } => issues::list_issues(ctx, state).await,
            CommentOnIssue {
                issue_number,
                comment_body,
            } => issues::comment_on_issue(ctx, issue_number, &comment_body).await,

            CreatePullRequest {
                title,
                body,
                head,
                base,
            } => pulls::create_pull_request(ctx, title, body, head, base).await,
            UpdatePullRequest {
                pr_number,
                title,
                body,
            } => pulls::update_pull_request(ctx, pr_number, title, body).await,
            ClosePullRequest { pr_number } => pulls::close_pull_request(ctx, pr_number).await,
            ListPullRequests { state } => pulls::list_pull_requests(ctx, state).await,
            AddCommentToPullRequest { pr_number, body } => {
                pulls::add_comment(ctx, pr_number, &body).await
            }
            AddLineCommentToPullRequest {
                pr_number,
                commit_id,
                body,
                path,
                position,
            } => pulls::add_line_comment(ctx, pr_number, commit_id, body, path, position).await,
            AddReplyToPullRequestComment {
                pr_number,
                comment_id,
                body,
            } => pulls::add_reply(ctx, pr_number, comment_id, &body).await,
        }
    }
}
