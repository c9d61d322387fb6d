//! Webhook payload parsing and trigger gating.
//!
//! Parsing turns a raw delivery into a typed [`WebhookEvent`]; [`gate`]
//! decides, without any I/O, whether that event starts a run.

use repobot_config::TriggerConfig;
use repobot_core::host::RepoRef;
use repobot_github::{Installation, Issue, Label, PullRequest, Repository, Review, ReviewComment};
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// A webhook delivery, typed by its `X-GitHub-Event` name.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Issues {
        action: String,
        issue: Issue,
        /// The label just added, on `labeled` deliveries
        label: Option<Label>,
        repository: Repository,
    },
    PullRequest {
        action: String,
        pull_request: PullRequest,
        label: Option<Label>,
        repository: Repository,
    },
    PullRequestReview {
        action: String,
        review: Review,
        pull_request: PullRequest,
        repository: Repository,
    },
    PullRequestReviewComment {
        action: String,
        comment: ReviewComment,
        pull_request: PullRequest,
        repository: Repository,
    },
    Installation {
        action: String,
        installation: Installation,
    },
    /// Any event Repobot does not act on (`ping`, `push`, ...).
    Other { name: String },
}

#[derive(Deserialize)]
struct IssuesPayload {
    action: String,
    issue: Issue,
    #[serde(default)]
    label: Option<Label>,
    repository: Repository,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: PullRequest,
    #[serde(default)]
    label: Option<Label>,
    repository: Repository,
}

#[derive(Deserialize)]
struct ReviewPayload {
    action: String,
    review: Review,
    pull_request: PullRequest,
    repository: Repository,
}

#[derive(Deserialize)]
struct ReviewCommentPayload {
    action: String,
    comment: ReviewComment,
    pull_request: PullRequest,
    repository: Repository,
}

#[derive(Deserialize)]
struct InstallationPayload {
    action: String,
    installation: Installation,
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body)
}

impl WebhookEvent {
    pub fn parse(event_name: &str, body: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(match event_name {
            "issues" => {
                let p: IssuesPayload = decode(body)?;
                WebhookEvent::Issues {
                    action: p.action,
                    issue: p.issue,
                    label: p.label,
                    repository: p.repository,
                }
            }
            "pull_request" => {
                let p: PullRequestPayload = decode(body)?;
                WebhookEvent::PullRequest {
                    action: p.action,
                    pull_request: p.pull_request,
                    label: p.label,
                    repository: p.repository,
                }
            }
            "pull_request_review" => {
                let p: ReviewPayload = decode(body)?;
                WebhookEvent::PullRequestReview {
                    action: p.action,
                    review: p.review,
                    pull_request: p.pull_request,
                    repository: p.repository,
                }
            }
            "pull_request_review_comment" => {
                let p: ReviewCommentPayload = decode(body)?;
                WebhookEvent::PullRequestReviewComment {
                    action: p.action,
                    comment: p.comment,
                    pull_request: p.pull_request,
                    repository: p.repository,
                }
            }
            "installation" => {
                let p: InstallationPayload = decode(body)?;
                WebhookEvent::Installation {
                    action: p.action,
                    installation: p.installation,
                }
            }
            other => WebhookEvent::Other { name: other.to_string() },
        })
    }

    /// `event.action`, as GitHub names it (e.g. `issues.opened`).
    pub fn kind(&self) -> String {
        match self {
            WebhookEvent::Issues { action, .. } => format!("issues.{action}"),
            WebhookEvent::PullRequest { action, .. } => format!("pull_request.{action}"),
            WebhookEvent::PullRequestReview { action, .. } => format!("pull_request_review.{action}"),
            WebhookEvent::PullRequestReviewComment { action, .. } => {
                format!("pull_request_review_comment.{action}")
            }
            WebhookEvent::Installation { action, .. } => format!("installation.{action}"),
            WebhookEvent::Other { name } => name.clone(),
        }
    }

    pub fn repo(&self) -> Option<RepoRef> {
        match self {
            WebhookEvent::Issues { repository, .. }
            | WebhookEvent::PullRequest { repository, .. }
            | WebhookEvent::PullRequestReview { repository, .. }
            | WebhookEvent::PullRequestReviewComment { repository, .. } => Some(repository.repo_ref()),
            WebhookEvent::Installation { .. } | WebhookEvent::Other { .. } => None,
        }
    }
}

/// Work that should be handed to the agent.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Work an issue.
    Issue { repo: RepoRef, issue: Issue },

    /// Review a pull request.
    PullRequest { repo: RepoRef, pull_request: PullRequest },

    /// Follow up on a submitted review.
    Review {
        repo: RepoRef,
        pull_request: PullRequest,
        review: Review,
    },

    /// Follow up on a single review comment.
    ReviewComment {
        repo: RepoRef,
        pull_request: PullRequest,
        comment: ReviewComment,
    },
}

impl Trigger {
    pub fn repo(&self) -> &RepoRef {
        match self {
            Trigger::Issue { repo, .. }
            | Trigger::PullRequest { repo, .. }
            | Trigger::Review { repo, .. }
            | Trigger::ReviewComment { repo, .. } => repo,
        }
    }

    /// Issue or pull request number the trigger is about.
    pub fn number(&self) -> u64 {
        match self {
            Trigger::Issue { issue, .. } => issue.number,
            Trigger::PullRequest { pull_request, .. }
            | Trigger::Review { pull_request, .. }
            | Trigger::ReviewComment { pull_request, .. } => pull_request.number,
        }
    }
}

/// What to do with a delivery.
#[derive(Debug, Clone)]
pub enum Decision {
    Run(Trigger),
    Ignore(String),
}

impl Decision {
    pub fn is_run(&self) -> bool {
        matches!(self, Decision::Run(_))
    }
}

fn has_bot_label(labels: &[Label], bot_name: &str) -> bool {
    labels.iter().any(|l| l.name.eq_ignore_ascii_case(bot_name))
}

/// Gate for the events that open work on an item (`opened`, `reopened`,
/// `labeled`).
///
/// GitHub follows `opened` with one `labeled` delivery per initial label, so
/// each item creation must map to exactly one run. With label gating on, the
/// run comes from the bot label's `labeled` delivery and `opened` waits for
/// it; with gating off, `opened` runs and later labels start nothing.
fn start_gate(
    action: &str,
    added: Option<&Label>,
    labels: &[Label],
    triggers: &TriggerConfig,
    bot_name: &str,
) -> Option<Decision> {
    match action {
        "opened" if triggers.require_label => {
            Some(Decision::Ignore(format!("waiting for the '{bot_name}' label")))
        }
        "opened" => None,
        "reopened" => (triggers.require_label && !has_bot_label(labels, bot_name))
            .then(|| Decision::Ignore(format!("missing '{bot_name}' label"))),
        "labeled" => match added {
            Some(label) if !label.name.eq_ignore_ascii_case(bot_name) => Some(Decision::Ignore(
                format!("label '{}' does not start runs", label.name),
            )),
            None => Some(Decision::Ignore("labeled delivery without a label".into())),
            Some(_) if !triggers.require_label => {
                Some(Decision::Ignore("already handled when opened".into()))
            }
            Some(_) => None,
        },
        other => Some(Decision::Ignore(format!("{other} is not handled"))),
    }
}

fn authored_by_bot(login: &str, bot_name: &str) -> bool {
    login.to_lowercase().contains(&bot_name.to_lowercase())
}

/// Decide whether an event starts a run.
pub fn gate(event: WebhookEvent, triggers: &TriggerConfig, bot_name: &str) -> Decision {
    let label_gate = |labels: &[Label]| -> Option<Decision> {
        (triggers.require_label && !has_bot_label(labels, bot_name))
            .then(|| Decision::Ignore(format!("missing '{bot_name}' label")))
    };

    match event {
        WebhookEvent::Issues {
            action,
            issue,
            label,
            repository,
        } => {
            if !triggers.handle_issues {
                return Decision::Ignore("issue handling is disabled".into());
            }
            if !matches!(action.as_str(), "opened" | "reopened" | "labeled") {
                return Decision::Ignore(format!("issues.{action} is not handled"));
            }
            if let Some(ignored) =
                start_gate(&action, label.as_ref(), &issue.labels, triggers, bot_name)
            {
                return ignored;
            }
            Decision::Run(Trigger::Issue {
                repo: repository.repo_ref(),
                issue,
            })
        }
        WebhookEvent::PullRequest {
            action,
            pull_request,
            label,
            repository,
        } => {
            if !triggers.handle_pull_requests {
                return Decision::Ignore("pull request handling is disabled".into());
            }
            if !matches!(action.as_str(), "opened" | "reopened" | "labeled") {
                return Decision::Ignore(format!("pull_request.{action} is not handled"));
            }
            if let Some(ignored) =
                start_gate(&action, label.as_ref(), &pull_request.labels, triggers, bot_name)
            {
                return ignored;
            }
            Decision::Run(Trigger::PullRequest {
                repo: repository.repo_ref(),
                pull_request,
            })
        }
        WebhookEvent::PullRequestReview {
            action,
            review,
            pull_request,
            repository,
        } => {
            if !triggers.handle_pull_requests {
                return Decision::Ignore("pull request handling is disabled".into());
            }
            if action != "submitted" {
                return Decision::Ignore(format!("pull_request_review.{action} is not handled"));
            }
            if authored_by_bot(&review.user.login, bot_name) {
                return Decision::Ignore("review was written by the bot".into());
            }
            if let Some(ignored) = label_gate(&pull_request.labels) {
                return ignored;
            }
            Decision::Run(Trigger::Review {
                repo: repository.repo_ref(),
                pull_request,
                review,
            })
        }
        WebhookEvent::PullRequestReviewComment {
            action,
            comment,
            pull_request,
            repository,
        } => {
            if !triggers.handle_pull_requests {
                return Decision::Ignore("pull request handling is disabled".into());
            }
            if action != "created" {
                return Decision::Ignore(format!(
                    "pull_request_review_comment.{action} is not handled"
                ));
            }
            if authored_by_bot(&comment.user.login, bot_name) {
                return Decision::Ignore("comment was written by the bot".into());
            }
            if let Some(ignored) = label_gate(&pull_request.labels) {
                return ignored;
            }
            Decision::Run(Trigger::ReviewComment {
                repo: repository.repo_ref(),
                pull_request,
                comment,
            })
        }
        WebhookEvent::Installation { action, installation } => {
            Decision::Ignore(format!("installation {} {action}", installation.id))
        }
        WebhookEvent::Other { name } => Decision::Ignore(format!("{name} events are not handled")),
    }
}
