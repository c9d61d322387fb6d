//! GitHub integration for Repobot.
//!
//! [`GithubClient`] implements [`repobot_core::RepoHost`] over the REST API
//! and adds the reads used to enrich webhook events (default branch, pull
//! request files, reviews). [`types`] holds the payload shapes shared with
//! the webhook gateway.

pub mod client;
pub mod types;

pub use client::GithubClient;
pub use types::{
    BranchTip, ChangedFile, Installation, Issue, Label, PullRequest, Repository, Review,
    ReviewComment, User,
};
