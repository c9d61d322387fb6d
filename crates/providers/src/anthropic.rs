//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//!
//! One `converse` call is exactly one HTTP round trip. Nothing is retried.

use async_trait::async_trait;
use repobot_core::action::{ActionRequest, ActionSchema};
use repobot_core::error::ProviderError;
use repobot_core::provider::{ModelTurn, Provider, ProviderRequest, ProviderResponse, Usage};
use repobot_core::transcript::{self, Role, Turn, TurnContent};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
const DEFAULT_TEMPERATURE: f32 = 0.4;
const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the default model and sampling.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            client,
        }
    }

    /// Build from the `[model]` configuration section.
    pub fn from_config(config: &repobot_config::ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no Anthropic API key (set model.api_key or ANTHROPIC_API_KEY)".into(),
            )
        })?;

        let mut provider = Self::new(api_key)
            .with_model(&config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);
        if let Some(url) = &config.api_url {
            provider = provider.with_base_url(url);
        }
        Ok(provider)
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert transcript turns to Anthropic API messages.
    fn to_api_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
        turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                let content = match &turn.content {
                    TurnContent::Text(text) => AnthropicContent::Text(text.clone()),
                    TurnContent::Blocks(blocks) => {
                        AnthropicContent::Blocks(blocks.iter().map(to_api_block).collect())
                    }
                };
                AnthropicMessage {
                    role: role.into(),
                    content,
                }
            })
            .collect()
    }

    /// Convert action schemas to Anthropic tool definitions.
    fn to_api_tools(actions: &[ActionSchema]) -> Vec<AnthropicTool> {
        actions
            .iter()
            .map(|a| AnthropicTool {
                name: a.name.clone(),
                description: a.description.clone(),
                input_schema: a.input_schema(),
            })
            .collect()
    }

    fn build_body(&self, request: &ProviderRequest<'_>) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "system": request.system,
            "messages": Self::to_api_messages(request.turns),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        if !request.actions.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(request.actions));
            body["tool_choice"] = serde_json::json!({ "type": "auto" });
        }

        body
    }

    fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
        let content: Vec<transcript::ContentBlock> = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(transcript::ContentBlock::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => Some(
                    transcript::ContentBlock::ActionRequest(ActionRequest::new(id, name, input)),
                ),
                ResponseContentBlock::Other => None,
            })
            .collect();

        let usage = Some(Usage {
            prompt_tokens: resp.usage.input_tokens,
            completion_tokens: resp.usage.output_tokens,
            total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
        });

        debug!(
            message_id = %resp.id,
            stop_reason = resp.stop_reason.as_deref().unwrap_or("unknown"),
            "Anthropic response received"
        );

        ProviderResponse {
            turn: ModelTurn::from_blocks(content),
            usage,
            model: resp.model,
        }
    }
}

fn to_api_block(block: &transcript::ContentBlock) -> ContentBlock {
    match block {
        transcript::ContentBlock::Text { text } => ContentBlock::Text { text: text.clone() },
        transcript::ContentBlock::ActionRequest(req) => ContentBlock::ToolUse {
            id: req.id.clone(),
            name: req.name.clone(),
            input: req.input.clone(),
        },
        transcript::ContentBlock::ActionResult(res) => ContentBlock::ToolResult {
            tool_use_id: res.request_id.clone(),
            content: res.content.clone(),
            is_error: res.is_error,
        },
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn converse(
        &self,
        request: ProviderRequest<'_>,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&request);

        debug!(
            provider = "anthropic",
            model = %self.model,
            turns = request.turns.len(),
            actions = request.actions.len(),
            "Sending messages request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: AnthropicResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        Ok(Self::response_to_provider_response(api_resp))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Thinking and other block kinds are not part of the transcript.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use repobot_core::action::{ActionResult, ParamSpec};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn constructor_defaults() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model(), "claude-3-5-sonnet-20240620");
        assert_eq!(provider.max_tokens, 4000);
        assert!((provider.temperature - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn constructor_with_base_url() {
        let provider =
            AnthropicProvider::new("sk-ant-test").with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = repobot_config::ModelConfig::default();
        assert!(matches!(
            AnthropicProvider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        let config = repobot_config::ModelConfig {
            api_key: Some("sk".into()),
            model: "claude-x".into(),
            max_tokens: 100,
            api_url: Some("http://localhost:9999/".into()),
            ..Default::default()
        };
        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.model(), "claude-x");
        assert_eq!(provider.max_tokens, 100);
        assert_eq!(provider.base_url, "http://localhost:9999");
    }

    #[test]
    fn turn_conversion_text_and_blocks() {
        let turns = vec![
            Turn::user("Fix the typo"),
            Turn::assistant_blocks(vec![
                transcript::ContentBlock::text("On it"),
                transcript::ContentBlock::ActionRequest(ActionRequest::new(
                    "toolu_1",
                    "createBranch",
                    serde_json::json!({"branchName": "fix-4", "baseBranch": "main"}),
                )),
            ]),
            Turn::action_results(vec![ActionResult::error("toolu_1", "Error creating branch: x")]),
        ];

        let api = AnthropicProvider::to_api_messages(&turns);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, "user");
        assert_eq!(api[1].role, "assistant");
        assert_eq!(api[2].role, "user");

        match &api[1].content {
            AnthropicContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                match &blocks[1] {
                    ContentBlock::ToolUse { id, name, input } => {
                        assert_eq!(id, "toolu_1");
                        assert_eq!(name, "createBranch");
                        assert_eq!(input["branchName"], "fix-4");
                    }
                    _ => panic!("Expected tool_use block"),
                }
            }
            _ => panic!("Expected blocks content"),
        }

        let json = serde_json::to_value(&api[2]).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(json["content"][0]["is_error"], true);
    }

    #[test]
    fn successful_tool_result_omits_error_flag() {
        let turns = vec![Turn::action_results(vec![ActionResult::success("t", "ok")])];
        let json = serde_json::to_value(AnthropicProvider::to_api_messages(&turns)).unwrap();
        assert!(json[0]["content"][0].get("is_error").is_none());
    }

    #[test]
    fn body_carries_system_tools_and_sampling() {
        let provider = AnthropicProvider::new("k");
        let turns = vec![Turn::user("seed")];
        let actions = vec![ActionSchema::new("readFile", "Read a file", vec![
            ParamSpec::string("branch", "Branch"),
            ParamSpec::string("filePath", "Path"),
        ])];
        let body = provider.build_body(&ProviderRequest {
            system: "You are a bot",
            turns: &turns,
            actions: &actions,
        });
        assert_eq!(body["system"], "You are a bot");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["tools"][0]["name"], "readFile");
        assert_eq!(
            body["tools"][0]["input_schema"]["required"],
            serde_json::json!(["branch", "filePath"])
        );
        assert_eq!(body["tool_choice"]["type"], "auto");
        assert_eq!(body["messages"][0]["content"], "seed");
    }

    #[test]
    fn body_without_actions_has_no_tools() {
        let provider = AnthropicProvider::new("k");
        let turns = vec![Turn::user("seed")];
        let body = provider.build_body(&ProviderRequest {
            system: "s",
            turns: &turns,
            actions: &[],
        });
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parse_text_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "model": "claude-3-5-sonnet-20240620",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();

        let pr = AnthropicProvider::response_to_provider_response(resp);
        assert_eq!(pr.turn, ModelTurn::Final {
            text: "Hello!".into()
        });
        assert_eq!(pr.usage.unwrap().total_tokens, 15);
        assert_eq!(pr.model, "claude-3-5-sonnet-20240620");
    }

    #[test]
    fn parse_tool_use_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "model": "claude-3-5-sonnet-20240620",
                "content": [
                    {"type": "text", "text": "Let me create a branch"},
                    {"type": "tool_use", "id": "toolu_abc", "name": "createBranch", "input": {"branchName": "fix-4", "baseBranch": "main"}},
                    {"type": "tool_use", "id": "toolu_def", "name": "readFile", "input": {"branch": "fix-4", "filePath": "README.md"}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        match AnthropicProvider::response_to_provider_response(resp).turn {
            ModelTurn::Actions { content, requests } => {
                assert_eq!(content.len(), 3);
                assert_eq!(requests.len(), 2);
                assert_eq!(requests[0].id, "toolu_abc");
                assert_eq!(requests[0].name, "createBranch");
                assert_eq!(requests[1].input["filePath"], "README.md");
            }
            other => panic!("expected actions, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_kinds_are_dropped() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_03",
                "model": "m",
                "content": [
                    {"type": "thinking", "thinking": "I need to consider..."},
                    {"type": "text", "text": "Here's my answer."}
                ],
                "usage": {"input_tokens": 15, "output_tokens": 25}
            }"#,
        )
        .unwrap();

        let pr = AnthropicProvider::response_to_provider_response(resp);
        assert_eq!(pr.turn, ModelTurn::Final {
            text: "Here's my answer.".into()
        });
    }

    // --- over the wire ---

    async fn converse_against(server: &MockServer) -> Result<ProviderResponse, ProviderError> {
        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.uri());
        let turns = vec![Turn::user("Fix the typo in README.md")];
        provider
            .converse(ProviderRequest {
                system: "You are a bot",
                turns: &turns,
                actions: &[],
            })
            .await
    }

    async fn server_answering(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn converse_sends_key_and_reads_final_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_01",
                "model": "claude-3-5-sonnet-20240620",
                "content": [{"type": "text", "text": "Done."}],
                "usage": {"input_tokens": 12, "output_tokens": 3},
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = converse_against(&server).await.unwrap();
        assert_eq!(response.turn, ModelTurn::Final { text: "Done.".into() });
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        for status in [401, 403] {
            let server = server_answering(ResponseTemplate::new(status)).await;
            let err = converse_against(&server).await.unwrap_err();
            assert!(
                matches!(err, ProviderError::AuthenticationFailed(_)),
                "status {status}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let server =
            server_answering(ResponseTemplate::new(429).insert_header("retry-after", "30")).await;
        let err = converse_against(&server).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 30 }));

        let server = server_answering(ResponseTemplate::new(429)).await;
        let err = converse_against(&server).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 5 }));
    }

    #[tokio::test]
    async fn other_failures_carry_status_and_body() {
        let server = server_answering(
            ResponseTemplate::new(529).set_body_string(r#"{"type":"error","error":{"type":"overloaded_error"}}"#),
        )
        .await;
        match converse_against(&server).await.unwrap_err() {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 529);
                assert!(message.contains("overloaded_error"));
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_success_is_malformed() {
        let server = server_answering(ResponseTemplate::new(200).set_body_string("not json")).await;
        let err = converse_against(&server).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}
