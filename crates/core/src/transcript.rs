//! Transcript domain types.
//!
//! A transcript is the conversation exchanged with the language model for one
//! triggering event: a seed task from the user side, assistant turns that
//! either answer or request actions, and user turns carrying action results.
//!
//! Turns are append-only. Once pushed, a turn cannot be reordered, replaced,
//! or mutated through the public API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{ActionRequest, ActionResult};

/// Unique identifier for a transcript (one per triggering event).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptId(pub String);

impl TranscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TranscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The triggering task and action results
    User,
    /// The language model
    Assistant,
}

/// One block of structured turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Free text.
    Text { text: String },

    /// An action requested by the model.
    ActionRequest(ActionRequest),

    /// The outcome of a previously requested action.
    ActionResult(ActionResult),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Turn payload: either plain text or a heterogeneous list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single turn in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// A plain-text user turn (the seed task).
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
            timestamp: Utc::now(),
        }
    }

    /// A plain-text assistant turn (the final answer).
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn carrying the model's raw content blocks verbatim.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Blocks(blocks),
            timestamp: Utc::now(),
        }
    }

    /// A user turn answering a batch of action requests.
    pub fn action_results(results: Vec<ActionResult>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Blocks(
                results.into_iter().map(ContentBlock::ActionResult).collect(),
            ),
            timestamp: Utc::now(),
        }
    }

    /// Content blocks of this turn (empty for plain text).
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            TurnContent::Text(_) => &[],
            TurnContent::Blocks(blocks) => blocks,
        }
    }

    /// All text carried by this turn, joined with newlines.
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Action requests carried by this turn, in emitted order.
    pub fn action_requests(&self) -> impl Iterator<Item = &ActionRequest> {
        self.blocks().iter().filter_map(|b| match b {
            ContentBlock::ActionRequest(req) => Some(req),
            _ => None,
        })
    }

    /// Action results carried by this turn, in order.
    pub fn action_results_iter(&self) -> impl Iterator<Item = &ActionResult> {
        self.blocks().iter().filter_map(|b| match b {
            ContentBlock::ActionResult(res) => Some(res),
            _ => None,
        })
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    id: TranscriptId,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
}

impl Transcript {
    /// Start a transcript from the seed task description.
    pub fn seeded(task: impl Into<String>) -> Self {
        Self {
            id: TranscriptId::new(),
            turns: vec![Turn::user(task)],
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &TranscriptId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a turn. This is the only way the transcript changes.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Rough token estimate (4 chars ≈ 1 token), used for logging only.
    pub fn estimated_tokens(&self) -> usize {
        self.turns
            .iter()
            .map(|t| match &t.content {
                TurnContent::Text(text) => text.len(),
                TurnContent::Blocks(blocks) => blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => text.len(),
                        ContentBlock::ActionRequest(req) => req.input.to_string().len(),
                        ContentBlock::ActionResult(res) => res.content.len(),
                    })
                    .sum(),
            })
            .sum::<usize>()
            / 4
    }
}
