//! From an accepted trigger to a finished agent run.
//!
//! The pipeline enriches the trigger with what the webhook payload lacks
//! (default branch head, changed files, review text), builds the task,
//! binds the family-specific registry to the event's repository and runs
//! the loop. Every accepted event gets its own spawned task.

use std::collections::HashMap;
use std::sync::Arc;

use repobot_actions::ActionFamily;
use repobot_agent::{
    AgentLoop, Feedback, FilePatch, IssueContext, PullRequestContext, RunReport, Task,
    follow_up_task, issue_task, review_task,
};
use repobot_core::action::ActionRegistry;
use repobot_core::error::{HostError, RegistryError};
use repobot_core::host::{OperationContext, RepoHost, RepoRef};
use repobot_github::{ChangedFile, GithubClient, Issue, PullRequest};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::events::Trigger;

/// Receives accepted triggers from the webhook handler.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, trigger: Trigger);
}

/// Registries for each family combination a task can ask for, built once.
pub struct Registries {
    by_families: HashMap<Vec<ActionFamily>, Arc<ActionRegistry>>,
}

impl Registries {
    /// Prebuild the issue, review and follow-up registries.
    pub fn build() -> Result<Self, RegistryError> {
        let sets = [
            ActionFamily::ALL.to_vec(),
            vec![ActionFamily::Reader, ActionFamily::Issues, ActionFamily::PullRequests],
            vec![ActionFamily::Reader, ActionFamily::Writer, ActionFamily::PullRequests],
        ];
        let mut by_families = HashMap::new();
        for families in sets {
            let registry = Arc::new(repobot_actions::registry(&families)?);
            by_families.insert(families, registry);
        }
        Ok(Self { by_families })
    }

    pub fn get(&self, families: &[ActionFamily]) -> Result<Arc<ActionRegistry>, RegistryError> {
        match self.by_families.get(families) {
            Some(registry) => Ok(Arc::clone(registry)),
            None => Ok(Arc::new(repobot_actions::registry(families)?)),
        }
    }
}

pub struct Pipeline {
    agent: Arc<AgentLoop>,
    client: GithubClient,
    registries: Registries,
    bot_name: String,
}

impl Pipeline {
    pub fn new(
        agent: Arc<AgentLoop>,
        client: GithubClient,
        bot_name: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            agent,
            client,
            registries: Registries::build()?,
            bot_name: bot_name.into(),
        })
    }

    pub fn client(&self) -> &GithubClient {
        &self.client
    }

    /// Fetch what the task needs and build it.
    pub async fn task_for(&self, trigger: &Trigger) -> Result<Task, HostError> {
        match trigger {
            Trigger::Issue { repo, issue } => {
                let default_branch = self.client.default_branch(repo).await?;
                let head_sha = self.client.branch_sha(repo, &default_branch).await?;
                Ok(issue_task(&issue_context(issue, default_branch, head_sha)))
            }
            Trigger::PullRequest { repo, pull_request } => {
                let files = self.client.pull_request_files(repo, pull_request.number).await?;
                Ok(review_task(&pull_request_context(pull_request, &files), &self.bot_name))
            }
            Trigger::Review {
                repo,
                pull_request,
                review,
            } => {
                let current = self.client.pull_request(repo, pull_request.number).await?;
                let files = self.client.pull_request_files(repo, pull_request.number).await?;
                let review = self
                    .client
                    .review(repo, pull_request.number, review.id)
                    .await
                    .unwrap_or_else(|e| {
                        error!(error = %e, review_id = review.id, "Failed to fetch review, using payload");
                        review.clone()
                    });
                let feedback = Feedback::Review {
                    id: review.id,
                    reviewer: review.user.login,
                    body: review.body,
                };
                Ok(follow_up_task(&pull_request_context(&current, &files), &feedback, &self.bot_name))
            }
            Trigger::ReviewComment {
                repo,
                pull_request,
                comment,
            } => {
                let current = self.client.pull_request(repo, pull_request.number).await?;
                let files = self.client.pull_request_files(repo, pull_request.number).await?;
                let feedback = Feedback::Comment {
                    id: comment.id,
                    author: comment.user.login.clone(),
                    body: comment.body.clone(),
                    path: comment.path.clone(),
                };
                Ok(follow_up_task(&pull_request_context(&current, &files), &feedback, &self.bot_name))
            }
        }
    }

    /// Enrich, build the task and run the loop to completion.
    pub async fn run(&self, trigger: Trigger) -> Result<RunReport, repobot_core::Error> {
        let task = self.task_for(&trigger).await?;
        let registry = self.registries.get(&task.families)?;
        let host: Arc<dyn RepoHost> = Arc::new(self.client.clone());
        let executor = registry.bind(OperationContext::new(host, trigger.repo().clone()));

        info!(
            repo = %trigger.repo(),
            number = trigger.number(),
            actions = registry.len(),
            "Running agent for event"
        );
        Ok(self.agent.run(task.system_prompt, task.seed, &executor).await)
    }

    /// Run the issue task for an existing issue, as if it had just been opened.
    pub async fn run_issue(&self, repo: RepoRef, number: u64) -> Result<RunReport, repobot_core::Error> {
        let issue = self.client.issue(&repo, number).await?;
        self.run(Trigger::Issue { repo, issue }).await
    }

    /// Run on a spawned task; failures are logged and the event dropped.
    pub fn spawn(self: &Arc<Self>, trigger: Trigger) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let span = info_span!("event", repo = %trigger.repo(), number = trigger.number());
        tokio::spawn(
            async move {
                match pipeline.run(trigger).await {
                    Ok(report) => info!(
                        outcome = report.outcome.as_str(),
                        iterations = report.iterations,
                        "Event handled"
                    ),
                    Err(e) => error!(error = %e, "Event dropped"),
                }
            }
            .instrument(span),
        )
    }
}

impl Dispatcher for Arc<Pipeline> {
    fn dispatch(&self, trigger: Trigger) {
        self.spawn(trigger);
    }
}

pub fn issue_context(issue: &Issue, default_branch: String, head_sha: String) -> IssueContext {
    IssueContext {
        number: issue.number,
        title: issue.title.clone(),
        body: issue.body.clone(),
        author: issue.user.login.clone(),
        default_branch,
        head_sha,
    }
}

pub fn pull_request_context(pr: &PullRequest, files: &[ChangedFile]) -> PullRequestContext {
    PullRequestContext {
        number: pr.number,
        title: pr.title.clone(),
        body: pr.body.clone(),
        author: pr.user.login.clone(),
        commit_id: pr.head.sha.clone(),
        head: pr.head.ref_name.clone(),
        base: pr.base.ref_name.clone(),
        files: files
            .iter()
            .map(|f| FilePatch {
                path: f.filename.clone(),
                patch: f.patch.clone(),
            })
            .collect(),
    }
}
