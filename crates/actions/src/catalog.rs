//! The action schema catalog advertised to the model.
//!
//! Parameter order is part of the contract: it is the order shown to the
//! model and the order calls are rendered in logs.

use std::sync::LazyLock;

use repobot_core::action::{ActionSchema, ParamSpec};
use serde::{Deserialize, Serialize};

/// A family of related operations, registered together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFamily {
    Reader,
    Writer,
    Branches,
    Issues,
    PullRequests,
}

impl ActionFamily {
    pub const ALL: [ActionFamily; 5] = [
        ActionFamily::Reader,
        ActionFamily::Writer,
        ActionFamily::Branches,
        ActionFamily::Issues,
        ActionFamily::PullRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionFamily::Reader => "reader",
            ActionFamily::Writer => "writer",
            ActionFamily::Branches => "branches",
            ActionFamily::Issues => "issues",
            ActionFamily::PullRequests => "pull_requests",
        }
    }

    /// Schemas belonging to this family, in catalog order.
    pub fn schemas(&self) -> Vec<ActionSchema> {
        CATALOG
            .iter()
            .filter(|(family, _)| family == self)
            .map(|(_, schema)| schema.clone())
            .collect()
    }
}

impl std::fmt::Display for ActionFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn s(name: &str, description: &str) -> ParamSpec {
    ParamSpec::string(name, description)
}

fn n(name: &str, description: &str) -> ParamSpec {
    ParamSpec::integer(name, description)
}

fn state_param(what: &str) -> ParamSpec {
    s(
        "state",
        &format!("The state of {what} to list (open, closed, all)"),
    )
    .optional(serde_json::json!("open"))
}

static CATALOG: LazyLock<Vec<(ActionFamily, ActionSchema)>> = LazyLock::new(|| {
    use ActionFamily::*;
    vec![
        // --- reader ---
        (Reader, ActionSchema::new(
            "getRepoFileTree",
            "Fetches the file and folder structure of a specified branch within a GitHub repository, starting from a specified path or from the root if no path is provided.",
            vec![
                s("branch", "The branch to fetch the file tree from"),
                s("startPath", "The starting path for listing (optional)").optional(serde_json::json!("")),
            ],
        )),
        (Reader, ActionSchema::new(
            "readFile",
            "Reads the content of a specified file within a specified branch of a GitHub repository.",
            vec![
                s("branch", "The branch to read the file from"),
                s("filePath", "The path to the file to read"),
            ],
        )),
        // --- writer ---
        (Writer, ActionSchema::new(
            "createOrUpdateFile",
            "Creates a new file or updates an existing file within a specified branch of a GitHub repository.",
            vec![
                s("branch", "The branch to create or update the file in"),
                s("filePath", "The path to the file to create or update"),
                s("content", "The content for the file"),
                s("commitMessage", "The commit message"),
            ],
        )),
        (Writer, ActionSchema::new(
            "deleteFile",
            "Deletes a specified file within a specified branch of a GitHub repository.",
            vec![
                s("branch", "The branch to delete the file from"),
                s("filePath", "The path to the file to delete"),
                s("commitMessage", "The commit message"),
            ],
        )),
        (Writer, ActionSchema::new(
            "deleteFilesInFolder",
            "Deletes a specified folder and all its contents within a specified branch of a GitHub repository.",
            vec![
                s("branch", "The branch to delete the folder from"),
                s("folderPath", "The path to the folder to delete"),
                s("commitMessage", "The commit message"),
            ],
        )),
        // --- branches ---
        (Branches, ActionSchema::new(
            "createBranch",
            "Creates a new branch in the GitHub repository.",
            vec![
                s("branchName", "The name of the new branch"),
                s("baseBranch", "The base branch to create from"),
            ],
        )),
        (Branches, ActionSchema::new(
            "updateBranch",
            "Updates an existing branch in the GitHub repository.",
            vec![
                s("branchName", "The name of the branch to update"),
                s("newBase", "The new base for the branch"),
            ],
        )),
        (Branches, ActionSchema::new(
            "deleteBranch",
            "Deletes a branch from the GitHub repository.",
            vec![s("branchName", "The name of the branch to delete")],
        )),
        (Branches, ActionSchema::new(
            "listBranches",
            "Lists all branches in the repository.",
            vec![],
        )),
        // --- issues ---
        (Issues, ActionSchema::new(
            "createIssue",
            "Creates a new issue in a GitHub repository.",
            vec![
                s("title", "The title of the issue"),
                s("body", "The body content of the issue"),
            ],
        )),
        (Issues, ActionSchema::new(
            "updateIssue",
            "Updates an existing issue in a GitHub repository.",
            vec![
                n("issueNumber", "The issue number to update"),
                s("title", "The new title of the issue"),
                s("body", "The new body content of the issue"),
            ],
        )),
        (Issues, ActionSchema::new(
            "deleteIssue",
            "Closes an existing issue in a GitHub repository.",
            vec![n("issueNumber", "The issue number to close")],
        )),
        (Issues, ActionSchema::new(
            "listIssues",
            "Lists issues in a GitHub repository.",
            vec![state_param("issues")],
        )),
        (Issues, ActionSchema::new(
            "commentOnIssue",
            "Posts a comment on a specified issue within a GitHub repository.",
            vec![
                n("issueNumber", "The number of the issue to comment on"),
                s("commentBody", "The text of the comment to post"),
            ],
        )),
        // --- pull requests ---
        (PullRequests, ActionSchema::new(
            "createPullRequest",
            "Creates a new pull request.",
            vec![
                s("title", "The title of the pull request"),
                s("body", "The body content of the pull request"),
                s("head", "The name of the branch where your changes are implemented"),
                s("base", "The name of the branch you want the changes pulled into"),
            ],
        )),
        (PullRequests, ActionSchema::new(
            "updatePullRequest",
            "Updates an existing pull request.",
            vec![
                n("prNumber", "The pull request number to update"),
                s("title", "The new title of the pull request"),
                s("body", "The new body content of the pull request"),
            ],
        )),
        (PullRequests, ActionSchema::new(
            "closePullRequest",
            "Closes an existing pull request.",
            vec![n("prNumber", "The pull request number to close")],
        )),
        (PullRequests, ActionSchema::new(
            "listPullRequests",
            "Lists pull requests.",
            vec![state_param("pull requests")],
        )),
        (PullRequests, ActionSchema::new(
            "addCommentToPullRequest",
            "Adds a general comment to a pull request. Not suitable for targeted review reply comment",
            vec![
                n("prNumber", "The pull request number"),
                s("body", "The comment body"),
            ],
        )),
        (PullRequests, ActionSchema::new(
            "addLineCommentToPullRequest",
            "Adds a line comment to a file on a pull request. Suitable for review comments",
            vec![
                n("prNumber", "The pull request number"),
                s("commitId", "The commit ID"),
                s("body", "The comment body"),
                s("path", "The file path"),
                n("position", "The line position in the diff"),
            ],
        )),
        (PullRequests, ActionSchema::new(
            "addReplyToPullRequestComment",
            "Replies to a review comment on a pull request, to be used when replying to users.",
            vec![
                n("prNumber", "The pull request number"),
                n("commentId", "The review comment ID"),
                s("body", "The reply body"),
            ],
        )),
    ]
});

/// Every schema with its family, in catalog order.
pub fn catalog() -> &'static [(ActionFamily, ActionSchema)] {
    &CATALOG
}

/// The family an action name belongs to.
pub fn family_of(name: &str) -> Option<ActionFamily> {
    CATALOG
        .iter()
        .find(|(_, schema)| schema.name == name)
        .map(|(family, _)| *family)
}
