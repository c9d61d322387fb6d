//! GitHub repository actions for Repobot.
//!
//! The model drives a repository through a fixed catalog of named actions,
//! grouped into families (reader, writer, branches, issues, pull requests).
//! Each event kind gets a registry built from the families it needs.

pub mod action;
pub mod branches;
pub mod catalog;
pub mod family;
pub mod files;
pub mod issues;
pub mod pulls;

use repobot_core::action::{ActionRegistry, ActionSet};
use repobot_core::error::RegistryError;

pub use action::GithubAction;
pub use catalog::{ActionFamily, catalog, family_of};

/// Build a registry exposing the given families, in order.
pub fn registry(families: &[ActionFamily]) -> Result<ActionRegistry, RegistryError> {
    let sets: Vec<Box<dyn ActionSet>> = families
        .iter()
        .map(|f| Box::new(*f) as Box<dyn ActionSet>)
        .collect();
    ActionRegistry::new(sets)
}

/// Every family.
pub fn full_registry() -> Result<ActionRegistry, RegistryError> {
    registry(&ActionFamily::ALL)
}
