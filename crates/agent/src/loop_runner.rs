//! The orchestration loop implementation.
//!
//! One [`AgentRun`] per triggering event. The run owns its transcript and
//! advances through [`LoopState`]s one [`AgentRun::step`] at a time, so a
//! caller (or a test) can observe every intermediate state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use repobot_config::AgentConfig;
use repobot_core::action::{ActionExecutor, ActionRequest, ActionResult};
use repobot_core::error::ProviderError;
use repobot_core::event::{DomainEvent, EventBus};
use repobot_core::provider::{ModelTurn, Provider, ProviderRequest};
use repobot_core::transcript::{Transcript, Turn};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Drives model round trips and action dispatch until the model stops
/// asking for actions.
///
/// Holds only shared, read-only collaborators; one instance serves every
/// event concurrently.
pub struct AgentLoop {
    /// The model gateway
    provider: Arc<dyn Provider>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Model round trips allowed per run
    max_iterations: usize,

    model_timeout: Duration,

    action_timeout: Duration,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, event_bus: Arc<EventBus>) -> Self {
        let defaults = AgentConfig::default();
        Self::from_config(provider, event_bus, &defaults)
    }

    pub fn from_config(provider: Arc<dyn Provider>, event_bus: Arc<EventBus>, config: &AgentConfig) -> Self {
        Self {
            provider,
            event_bus,
            max_iterations: config.max_iterations,
            model_timeout: config.model_timeout(),
            action_timeout: config.action_timeout(),
        }
    }

    /// Set the maximum number of model round trips per run.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_model_timeout(mut self, limit: Duration) -> Self {
        self.model_timeout = limit;
        self
    }

    pub fn with_action_timeout(mut self, limit: Duration) -> Self {
        self.action_timeout = limit;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Begin a run seeded with one user turn. Nothing is sent until the
    /// first [`AgentRun::step`].
    pub fn start<'a>(
        &'a self,
        system_prompt: impl Into<String>,
        seed: impl Into<String>,
        executor: &'a dyn ActionExecutor,
    ) -> AgentRun<'a> {
        let transcript = Transcript::seeded(seed);
        info!(
            transcript_id = %transcript.id(),
            provider = self.provider.name(),
            actions = executor.schemas().len(),
            "Starting agent run"
        );
        AgentRun {
            agent: self,
            executor,
            system_prompt: system_prompt.into(),
            transcript,
            state: LoopState::AwaitModel,
            iterations: 0,
        }
    }

    /// Run to completion.
    pub async fn run(
        &self,
        system_prompt: impl Into<String>,
        seed: impl Into<String>,
        executor: &dyn ActionExecutor,
    ) -> RunReport {
        self.start(system_prompt, seed, executor).finish().await
    }
}

/// Where a run currently stands.
#[derive(Debug, Clone)]
pub enum LoopState {
    /// Next step calls the model.
    AwaitModel,

    /// Next step runs these requests, in order.
    DispatchActions(Vec<ActionRequest>),

    /// Terminal.
    Done(LoopOutcome),
}

impl LoopState {
    pub fn is_done(&self) -> bool {
        matches!(self, LoopState::Done(_))
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum LoopOutcome {
    /// The model gave a final answer.
    Completed { answer: String },

    /// The iteration ceiling was hit while the model still wanted actions.
    Truncated,

    /// The model gateway failed; the event is dropped.
    Failed(ProviderError),
}

impl LoopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopOutcome::Completed { .. } => "completed",
            LoopOutcome::Truncated => "truncated",
            LoopOutcome::Failed(_) => "failed",
        }
    }
}

/// The result of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: LoopOutcome,

    /// Model round trips made
    pub iterations: usize,

    pub transcript: Transcript,
}

impl RunReport {
    /// The model's final answer, if it gave one.
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            LoopOutcome::Completed { answer } => Some(answer),
            _ => None,
        }
    }
}

/// One loop instance, exclusively owning its transcript.
pub struct AgentRun<'a> {
    agent: &'a AgentLoop,
    executor: &'a dyn ActionExecutor,
    system_prompt: String,
    transcript: Transcript,
    state: LoopState,
    iterations: usize,
}

impl AgentRun<'_> {
    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Model round trips made so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Advance by one state transition. A no-op once done.
    pub async fn step(&mut self) -> &LoopState {
        let current = std::mem::replace(&mut self.state, LoopState::AwaitModel);
        self.state = match current {
            LoopState::AwaitModel => self.await_model().await,
            LoopState::DispatchActions(requests) => self.dispatch(requests).await,
            done @ LoopState::Done(_) => done,
        };
        &self.state
    }

    /// Step until done.
    pub async fn finish(mut self) -> RunReport {
        loop {
            if let LoopState::Done(outcome) = self.step().await {
                let outcome = outcome.clone();
                return RunReport {
                    outcome,
                    iterations: self.iterations,
                    transcript: self.transcript,
                };
            }
        }
    }

    async fn await_model(&mut self) -> LoopState {
        if self.iterations >= self.agent.max_iterations {
            warn!(
                transcript_id = %self.transcript.id(),
                iterations = self.iterations,
                "Iteration ceiling reached, truncating run"
            );
            return self.done(LoopOutcome::Truncated);
        }
        self.iterations += 1;

        debug!(
            transcript_id = %self.transcript.id(),
            iteration = self.iterations,
            turns = self.transcript.len(),
            estimated_tokens = self.transcript.estimated_tokens(),
            "Agent loop iteration"
        );

        let request = ProviderRequest {
            system: &self.system_prompt,
            turns: self.transcript.turns(),
            actions: self.executor.schemas(),
        };
        let response = match timeout(self.agent.model_timeout, self.agent.provider.converse(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(transcript_id = %self.transcript.id(), error = %e, "Model call failed");
                return self.done(LoopOutcome::Failed(e));
            }
            Err(_) => {
                let e = ProviderError::Timeout(format!(
                    "no response within {}s",
                    self.agent.model_timeout.as_secs()
                ));
                error!(transcript_id = %self.transcript.id(), error = %e, "Model call failed");
                return self.done(LoopOutcome::Failed(e));
            }
        };

        if let Some(usage) = &response.usage {
            self.agent.event_bus.publish(DomainEvent::ModelResponded {
                transcript_id: self.transcript.id().to_string(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: Utc::now(),
            });
        }

        match response.turn {
            ModelTurn::Final { text } => {
                self.transcript.push(Turn::assistant(text.clone()));
                self.done(LoopOutcome::Completed { answer: text })
            }
            ModelTurn::Actions { content, requests } => {
                debug!(
                    count = requests.len(),
                    actions = ?requests.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
                    "Model requested actions"
                );
                self.transcript.push(Turn::assistant_blocks(content));
                LoopState::DispatchActions(requests)
            }
        }
    }

    /// Run every request sequentially, then append all results as one turn.
    async fn dispatch(&mut self, requests: Vec<ActionRequest>) -> LoopState {
        let mut results = Vec::with_capacity(requests.len());

        for request in &requests {
            let start = Instant::now();
            let result = match timeout(self.agent.action_timeout, self.executor.execute(request)).await {
                Ok(result) => result,
                Err(_) => ActionResult::error(
                    &request.id,
                    format!(
                        "Action '{}' timed out after {}s",
                        request.name,
                        self.agent.action_timeout.as_secs()
                    ),
                ),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            if result.is_error {
                warn!(action = %request.name, error = %result.content, "Action failed");
            } else {
                debug!(action = %request.name, duration_ms, "Action completed");
            }
            self.agent.event_bus.publish(DomainEvent::ActionExecuted {
                action: request.name.clone(),
                is_error: result.is_error,
                duration_ms,
                timestamp: Utc::now(),
            });

            results.push(result);
        }

        self.transcript.push(Turn::action_results(results));
        LoopState::AwaitModel
    }

    fn done(&self, outcome: LoopOutcome) -> LoopState {
        info!(
            transcript_id = %self.transcript.id(),
            outcome = outcome.as_str(),
            iterations = self.iterations,
            turns = self.transcript.len(),
            "Agent run finished"
        );
        self.agent.event_bus.publish(DomainEvent::RunFinished {
            transcript_id: self.transcript.id().to_string(),
            outcome: outcome.as_str().to_string(),
            iterations: self.iterations,
            timestamp: Utc::now(),
        });
        LoopState::Done(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repobot_actions::full_registry;
    use repobot_core::action::ActionSchema;
    use repobot_core::host::testing::InMemoryHost;
    use repobot_core::host::{OperationContext, RepoRef};
    use repobot_core::provider::{ProviderResponse, Usage};
    use repobot_core::transcript::{ContentBlock, Role};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted turns and records every transcript it was shown.
    /// Answers "done" once the script runs out.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ModelTurn, ProviderError>>>,
        seen: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ModelTurn, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn seen(&self, call: usize) -> Vec<Turn> {
            self.seen.lock().unwrap()[call].clone()
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn converse(&self, request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request.turns.to_vec());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelTurn::Final { text: "done".into() }));
            next.map(|turn| ProviderResponse {
                turn,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "scripted-model".into(),
            })
        }
    }

    /// Asks for the same action forever.
    struct InsistentProvider;

    #[async_trait::async_trait]
    impl Provider for InsistentProvider {
        fn name(&self) -> &str {
            "insistent"
        }

        async fn converse(&self, request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
            let id = format!("call_{}", request.turns.len());
            Ok(ProviderResponse {
                turn: actions(vec![(id.as_str(), "listBranches", json!({}))]),
                usage: None,
                model: "insistent".into(),
            })
        }
    }

    struct StalledProvider;

    #[async_trait::async_trait]
    impl Provider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn converse(&self, _request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    /// Records invocation order; `fail` errors, `stall` never finishes.
    struct RecordingExecutor {
        schemas: Vec<ActionSchema>,
        log: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self {
                schemas: vec![ActionSchema::new("echo", "Echo the input", vec![])],
                log: Mutex::new(Vec::new()),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ActionExecutor for RecordingExecutor {
        fn schemas(&self) -> &[ActionSchema] {
            &self.schemas
        }

        async fn execute(&self, request: &ActionRequest) -> ActionResult {
            self.log.lock().unwrap().push(format!("start:{}", request.id));
            let result = match request.name.as_str() {
                "fail" => ActionResult::error(&request.id, "Error creating branch: Reference already exists"),
                "stall" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    ActionResult::success(&request.id, "late")
                }
                _ => ActionResult::success(&request.id, format!("ok:{}", request.name)),
            };
            self.log.lock().unwrap().push(format!("end:{}", request.id));
            result
        }
    }

    fn actions(calls: Vec<(&str, &str, serde_json::Value)>) -> ModelTurn {
        ModelTurn::from_blocks(
            calls
                .into_iter()
                .map(|(id, name, input)| ContentBlock::ActionRequest(ActionRequest::new(id, name, input)))
                .collect(),
        )
    }

    fn agent(provider: Arc<dyn Provider>) -> AgentLoop {
        AgentLoop::new(provider, Arc::new(EventBus::default()))
    }

    #[tokio::test]
    async fn final_answer_terminates_after_one_iteration() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ModelTurn::Final {
            text: "Nothing to do.".into(),
        })]));
        let executor = RecordingExecutor::new();
        let report = agent(provider.clone()).run("system", "seed", &executor).await;

        assert!(matches!(report.outcome, LoopOutcome::Completed { .. }));
        assert_eq!(report.answer(), Some("Nothing to do."));
        assert_eq!(report.iterations, 1);
        assert_eq!(report.transcript.len(), 2);
        assert_eq!(report.transcript.turns()[1].role, Role::Assistant);
        assert!(executor.log().is_empty());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn every_request_gets_one_correlated_result_in_one_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(actions(vec![
            ("a", "echo", json!({})),
            ("b", "fail", json!({})),
            ("c", "echo", json!({})),
        ]))]));
        let executor = RecordingExecutor::new();
        let report = agent(provider).run("system", "seed", &executor).await;

        // seed, assistant(requests), user(results), assistant(final)
        assert_eq!(report.transcript.len(), 4);
        let results_turn = &report.transcript.turns()[2];
        assert_eq!(results_turn.role, Role::User);
        let ids: Vec<_> = results_turn
            .action_results_iter()
            .map(|r| r.request_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(executor.log(), vec![
            "start:a", "end:a", "start:b", "end:b", "start:c", "end:c"
        ]);
    }

    #[tokio::test]
    async fn handler_errors_reach_the_next_model_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(actions(vec![(
            "x",
            "fail",
            json!({}),
        )]))]));
        let executor = RecordingExecutor::new();
        let report = agent(provider.clone()).run("system", "seed", &executor).await;

        assert!(matches!(report.outcome, LoopOutcome::Completed { .. }));
        let second_call = provider.seen(1);
        let result = second_call[2].action_results_iter().next().unwrap();
        assert!(result.is_error);
        assert_eq!(result.content, "Error creating branch: Reference already exists");
    }

    #[tokio::test]
    async fn transcript_only_grows() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(actions(vec![("1", "echo", json!({}))])),
            Ok(actions(vec![("2", "echo", json!({}))])),
        ]));
        let executor = RecordingExecutor::new();
        let agent = agent(provider);
        let mut run = agent.start("system", "seed", &executor);

        let mut previous = run.transcript().turns().to_vec();
        while !run.step().await.is_done() {
            let now = run.transcript().turns();
            assert!(now.len() >= previous.len());
            assert_eq!(&now[..previous.len()], previous.as_slice());
            previous = now.to_vec();
        }
        assert_eq!(run.transcript().len(), 6);
    }

    #[tokio::test]
    async fn ceiling_truncates_run() {
        let executor = RecordingExecutor::new();
        let report = agent(Arc::new(InsistentProvider))
            .with_max_iterations(3)
            .run("system", "seed", &executor)
            .await;

        assert!(matches!(report.outcome, LoopOutcome::Truncated));
        assert_eq!(report.iterations, 3);
        // seed + 3 x (assistant, results)
        assert_eq!(report.transcript.len(), 7);
    }

    #[tokio::test]
    async fn gateway_failure_ends_run_without_retry() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::ApiError {
            status_code: 500,
            message: "overloaded".into(),
        })]));
        let executor = RecordingExecutor::new();
        let report = agent(provider.clone()).run("system", "seed", &executor).await;

        assert!(matches!(report.outcome, LoopOutcome::Failed(ProviderError::ApiError { .. })));
        assert_eq!(provider.calls(), 1);
        assert_eq!(report.transcript.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeout_is_gateway_failure() {
        let executor = RecordingExecutor::new();
        let report = agent(Arc::new(StalledProvider))
            .with_model_timeout(Duration::from_secs(5))
            .run("system", "seed", &executor)
            .await;
        assert!(matches!(report.outcome, LoopOutcome::Failed(ProviderError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn action_timeout_becomes_error_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(actions(vec![
            ("s", "stall", json!({})),
            ("e", "echo", json!({})),
        ]))]));
        let executor = RecordingExecutor::new();
        let report = agent(provider)
            .with_action_timeout(Duration::from_secs(2))
            .run("system", "seed", &executor)
            .await;

        let results: Vec<_> = report.transcript.turns()[2].action_results_iter().cloned().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_error);
        assert_eq!(results[0].content, "Action 'stall' timed out after 2s");
        assert!(!results[1].is_error);
    }

    #[tokio::test]
    async fn run_publishes_domain_events() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(actions(vec![(
            "a",
            "echo",
            json!({}),
        )]))]));
        let executor = RecordingExecutor::new();
        AgentLoop::new(provider, bus.clone())
            .run("system", "seed", &executor)
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::ModelResponded { .. } => "model",
                DomainEvent::ActionExecuted { .. } => "action",
                DomainEvent::RunFinished { outcome, .. } => {
                    assert_eq!(outcome, "completed");
                    "finished"
                }
                DomainEvent::EventReceived { .. } => "received",
            });
        }
        assert_eq!(kinds, vec!["model", "action", "model", "finished"]);
    }

    #[tokio::test]
    async fn branch_creation_round_trip() {
        let seed = "Issue #4 needs a typo fixed in README, branch from sha abc123 on main.";
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(actions(vec![(
            "toolu_1",
            "createBranch",
            json!({ "branchName": "fix-4", "baseBranch": "main" }),
        )]))]));
        let host = Arc::new(InMemoryHost::new());
        let registry = Arc::new(full_registry().unwrap());
        let executor = registry.bind(OperationContext::new(host.clone(), RepoRef::new("octo", "demo")));
        let agent = agent(provider);
        let mut run = agent.start("system", seed, &executor);

        assert!(matches!(run.step().await, LoopState::DispatchActions(_)));
        assert!(matches!(run.step().await, LoopState::AwaitModel));

        let turns = run.transcript().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text(), seed);
        assert_eq!(turns[1].role, Role::Assistant);
        let request = turns[1].action_requests().next().unwrap();
        assert_eq!(request.name, "createBranch");
        assert_eq!(turns[2].role, Role::User);
        let result = turns[2].action_results_iter().next().unwrap();
        assert_eq!(result.request_id, "toolu_1");
        assert_eq!(result.content, "Branch fix-4 created successfully from main with sha: abc123");
        assert!(host.has_branch("fix-4"));
    }
}
