//! # Repobot Core
//!
//! Domain types, traits, and error definitions for the Repobot GitHub agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The model backend ([`Provider`]) and the code-hosting platform
//! ([`RepoHost`]) are traits here. Implementations live in their own crates,
//! and the orchestration loop only ever talks to the traits. Tests swap in
//! scripted providers and the in-memory hosts from `host::testing`
//! (enable the `testing` feature from other crates' dev-dependencies).

pub mod action;
pub mod error;
pub mod event;
pub mod host;
pub mod provider;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use action::{
    ActionExecutor, ActionOutcome, ActionRegistry, ActionRequest, ActionResult, ActionSchema,
    ActionSet, BoundRegistry, ParamSpec, ParamType,
};
pub use error::{Error, HostError, ProviderError, RegistryError};
pub use event::{DomainEvent, EventBus};
pub use host::{OperationContext, RepoHost, RepoRef};
pub use provider::{ModelTurn, Provider, ProviderRequest, ProviderResponse, Usage};
pub use transcript::{ContentBlock, Role, Transcript, TranscriptId, Turn, TurnContent};
