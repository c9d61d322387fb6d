//! Task builders: the system prompt, seed turn and action families for each
//! kind of repository event.

use repobot_actions::ActionFamily;

/// Everything a run needs besides the collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub system_prompt: String,
    pub seed: String,
    pub families: Vec<ActionFamily>,
}

/// An issue that should be worked on.
#[derive(Debug, Clone, Default)]
pub struct IssueContext {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub author: String,
    pub default_branch: String,
    pub head_sha: String,
}

/// A changed file with its unified diff, if the platform returned one.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub path: String,
    pub patch: Option<String>,
}

/// A pull request and its diff.
#[derive(Debug, Clone, Default)]
pub struct PullRequestContext {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub author: String,
    pub commit_id: String,
    pub head: String,
    pub base: String,
    pub files: Vec<FilePatch>,
}

/// What a reviewer said on a pull request.
#[derive(Debug, Clone)]
pub enum Feedback {
    /// A submitted review.
    Review { id: u64, reviewer: String, body: Option<String> },

    /// A single comment on a diff line.
    Comment { id: u64, author: String, body: String, path: Option<String> },
}

const ISSUE_SYSTEM: &str = "You're an AI bot in a GitHub repo, here to help with code changes, \
refactoring, and maintenance. Use predefined functions to interact with the repo, read files, \
create branches, write to files, commit changes, and initiate pull requests.";

const REVIEW_SYSTEM: &str = "You're an AI code reviewer with a senior software engineer's hat on. \
Your toolkit includes GitHub functions for file reading and insightful PR commenting to catch \
bugs, errors, or suggest improvements for better code quality and standard adherence.";

const PERMISSIONS_HINT: &str = "If you fail to access resources leave a comment for maintainers \
to install permissions or reinstall the Github app.";

/// Work an issue: comment, branch from the default branch head, change
/// code, open a pull request.
pub fn issue_task(issue: &IssueContext) -> Task {
    let seed = format!(
        "Issue #{number}, titled '{title}', was opened by {author}. Description: '{body}'.\n\
         Tasks:\n\
         First Comment on the issue to let know you're on it, then:\n\
         1. Read necessary files to understand the issue.\n\
         2. Create a new branch from head commit SHA: '{sha}' on default branch '{branch}'.\n\
         3. Make code modifications to address the issue.\n\
         4. Commit changes and create a new pull request against the default branch.\n\
         If the issue is complex, comment on it explaining why a pull request can't be made now.\n\
         {PERMISSIONS_HINT}",
        number = issue.number,
        title = issue.title,
        author = issue.author,
        body = issue.body.as_deref().unwrap_or_default(),
        sha = issue.head_sha,
        branch = issue.default_branch,
    );
    Task {
        system_prompt: ISSUE_SYSTEM.to_string(),
        seed,
        families: ActionFamily::ALL.to_vec(),
    }
}

/// Review a newly opened pull request.
pub fn review_task(pr: &PullRequestContext, bot_name: &str) -> Task {
    let seed = format!(
        "Be brief and only review if necessary, otherwise just comment LGTM.\n\
         Use addLineCommentToPullRequest to comment on each file changed.\n\
         New pull request up for review:\n\
         {summary}\n\
         Tasks:\n\
         1. Review the PR files.\n\
         2. Point out bugs, errors, or improvements with a detailed comment on specific code blocks.\n\
         3. Make comments clear, concise, and constructive.\n\
         4. Spot a bigger issue? Create a new repo issue, label it with {bot_name} if it's in your scope.\n\
         Only comment if there are discrepancies to address, and make your feedback short and concise.\n\
         {PERMISSIONS_HINT}",
        summary = pull_request_summary(pr),
    );
    Task {
        system_prompt: REVIEW_SYSTEM.to_string(),
        seed,
        families: vec![
            ActionFamily::Reader,
            ActionFamily::Issues,
            ActionFamily::PullRequests,
        ],
    }
}

/// Act on review feedback left on a pull request.
pub fn follow_up_task(pr: &PullRequestContext, feedback: &Feedback, bot_name: &str) -> Task {
    let (header, said, reply) = match feedback {
        Feedback::Review { id, reviewer, body } => (
            format!("New review ID: {id} on PR:"),
            format!("Reviewer: @{reviewer} said: {}", body.as_deref().unwrap_or_default()),
            format!("Reply to reviews using review id: {id} if they are about your changes."),
        ),
        Feedback::Comment {
            id,
            author,
            body,
            path,
        } => (
            format!("New review comment ID: {id} on PR:"),
            match path {
                Some(path) => format!("Reviewer: @{author} commented on {path}: {body}"),
                None => format!("Reviewer: @{author} commented: {body}"),
            },
            format!(
                "Reply in the comment thread using addReplyToPullRequestComment with comment id: {id} if it is about your changes."
            ),
        ),
    };
    let seed = format!(
        "{header}\n\
         {summary}\n\
         Review:\n\
         {said}\n\
         Tasks:\n\
         1. {reply}\n\
         2. Make needed code adjustments based on reviews.\n\
         Only comment if there are discrepancies to address, and make your feedback short and concise.\n\
         {PERMISSIONS_HINT}",
        summary = pull_request_summary(pr),
    );
    Task {
        system_prompt: format!(
            "You're AI bot {bot_name} on GitHub, geared up with functions to read, write, and \
             comment on pull requests to make necessary code adjustments."
        ),
        seed,
        families: vec![
            ActionFamily::Reader,
            ActionFamily::Writer,
            ActionFamily::PullRequests,
        ],
    }
}

fn pull_request_summary(pr: &PullRequestContext) -> String {
    let patches = pr
        .files
        .iter()
        .map(|f| format!("Path: {}\nPatch: {}", f.path, f.patch.as_deref().unwrap_or("(binary or too large)")))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "- Title: '{}'\n\
         - By: {}\n\
         - PR #: {}\n\
         - Description: '{}'\n\
         - Commit ID: {}\n\
         - Head: {}\n\
         - Base: {}\n\
         Patches and paths:\n\n{patches}\n",
        pr.title,
        pr.author,
        pr.number,
        pr.body.as_deref().unwrap_or_default(),
        pr.commit_id,
        pr.head,
        pr.base,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr() -> PullRequestContext {
        PullRequestContext {
            number: 12,
            title: "Add retry".into(),
            body: None,
            author: "octocat".into(),
            commit_id: "def456".into(),
            head: "feature/retry".into(),
            base: "main".into(),
            files: vec![
                FilePatch {
                    path: "src/lib.rs".into(),
                    patch: Some("@@ -1 +1 @@\n-a\n+b".into()),
                },
                FilePatch {
                    path: "logo.png".into(),
                    patch: None,
                },
            ],
        }
    }

    #[test]
    fn issue_task_names_branch_point_and_uses_every_family() {
        let task = issue_task(&IssueContext {
            number: 4,
            title: "Typo in README".into(),
            body: Some("teh -> the".into()),
            author: "octocat".into(),
            default_branch: "main".into(),
            head_sha: "abc123".into(),
        });
        assert!(task.seed.starts_with("Issue #4, titled 'Typo in README', was opened by octocat."));
        assert!(task.seed.contains("head commit SHA: 'abc123' on default branch 'main'"));
        assert!(task.system_prompt.contains("AI bot in a GitHub repo"));
        assert_eq!(task.families, ActionFamily::ALL.to_vec());
    }

    #[test]
    fn missing_body_renders_empty() {
        let task = issue_task(&IssueContext {
            number: 1,
            title: "t".into(),
            ..Default::default()
        });
        assert!(task.seed.contains("Description: ''"));
    }

    #[test]
    fn review_task_lists_patches() {
        let task = review_task(&pr(), "repobot");
        assert!(task.seed.contains("Path: src/lib.rs\nPatch: @@ -1 +1 @@"));
        assert!(task.seed.contains("Path: logo.png\nPatch: (binary or too large)"));
        assert!(task.seed.contains("- Commit ID: def456"));
        assert!(task.seed.contains("label it with repobot"));
        assert_eq!(task.families, vec![
            ActionFamily::Reader,
            ActionFamily::Issues,
            ActionFamily::PullRequests
        ]);
    }

    #[test]
    fn follow_up_on_review_and_comment() {
        let review = follow_up_task(
            &pr(),
            &Feedback::Review {
                id: 77,
                reviewer: "alice".into(),
                body: Some("Please add a test".into()),
            },
            "repobot",
        );
        assert!(review.seed.starts_with("New review ID: 77 on PR:"));
        assert!(review.seed.contains("Reviewer: @alice said: Please add a test"));
        assert!(review.system_prompt.contains("AI bot repobot"));
        assert!(!review.families.contains(&ActionFamily::Branches));

        let comment = follow_up_task(
            &pr(),
            &Feedback::Comment {
                id: 99,
                author: "bob".into(),
                body: "Off by one".into(),
                path: Some("src/lib.rs".into()),
            },
            "repobot",
        );
        assert!(comment.seed.contains("@bob commented on src/lib.rs: Off by one"));
        assert!(comment.seed.contains("comment id: 99"));
    }
}
