//! Provider trait: the abstraction over the language model backend.
//!
//! A provider takes the system prompt, the transcript so far and the action
//! catalog, and returns the model's next turn: either a final answer or a
//! batch of action requests. Sampling parameters (temperature, token ceiling,
//! model id) are fixed when the provider is constructed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::{ActionRequest, ActionSchema};
use crate::error::ProviderError;
use crate::transcript::{ContentBlock, Turn};

/// One model call.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    /// Instructions that frame the whole conversation
    pub system: &'a str,

    /// Turns so far, oldest first
    pub turns: &'a [Turn],

    /// Actions the model may request
    pub actions: &'a [ActionSchema],
}

/// The model's next move.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// The model is done; this is its answer.
    Final { text: String },

    /// The model wants actions run. `content` is the raw assistant content
    /// (interleaved text and requests) to be appended to the transcript
    /// verbatim; `requests` lists the requests in emitted order.
    Actions {
        content: Vec<ContentBlock>,
        requests: Vec<ActionRequest>,
    },
}

impl ModelTurn {
    /// Build from raw assistant blocks: any request makes it an action turn.
    pub fn from_blocks(content: Vec<ContentBlock>) -> Self {
        let requests: Vec<ActionRequest> = content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ActionRequest(req) => Some(req.clone()),
                _ => None,
            })
            .collect();

        if requests.is_empty() {
            let text = content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            ModelTurn::Final { text }
        } else {
            ModelTurn::Actions { content, requests }
        }
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub turn: ModelTurn,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The orchestration loop calls `converse()` without knowing which backend
/// is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send one request and get the model's next turn.
    async fn converse(&self, request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_without_requests_are_final() {
        let turn = ModelTurn::from_blocks(vec![
            ContentBlock::text("All done."),
            ContentBlock::text("Bye."),
        ]);
        assert_eq!(turn, ModelTurn::Final {
            text: "All done.\nBye.".into()
        });
    }

    #[test]
    fn blocks_with_requests_keep_order_and_content() {
        let blocks = vec![
            ContentBlock::text("Working on it"),
            ContentBlock::ActionRequest(ActionRequest::new("1", "createBranch", serde_json::json!({}))),
            ContentBlock::ActionRequest(ActionRequest::new("2", "readFile", serde_json::json!({}))),
        ];
        match ModelTurn::from_blocks(blocks.clone()) {
            ModelTurn::Actions { content, requests } => {
                assert_eq!(content, blocks);
                let ids: Vec<_> = requests.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, vec!["1", "2"]);
            }
            other => panic!("expected actions, got {other:?}"),
        }
    }

    #[test]
    fn empty_content_is_empty_final() {
        assert_eq!(ModelTurn::from_blocks(vec![]), ModelTurn::Final {
            text: String::new()
        });
    }
}
