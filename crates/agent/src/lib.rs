//! The orchestration loop at the heart of Repobot.
//!
//! A run follows an **Await model → Dispatch actions** cycle:
//!
//! 1. **Seed** a transcript with the event's task description
//! 2. **Send to the model** with the system prompt and action catalog
//! 3. **If actions are requested**: run them in order, append all results
//!    as one turn, and go back to step 2
//! 4. **If the model answers**: the run is done
//!
//! The loop also stops on a model gateway failure or when the iteration
//! ceiling is reached.

pub mod loop_runner;
pub mod tasks;

pub use loop_runner::{AgentLoop, AgentRun, LoopOutcome, LoopState, RunReport};
pub use tasks::{
    Feedback, FilePatch, IssueContext, PullRequestContext, Task, follow_up_task, issue_task,
    review_task,
};
