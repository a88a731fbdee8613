//! Reasoning Loop
//!
//! A fixed two-node cycle: *Reason* asks the model for its next turn, *Act*
//! executes whatever tool calls that turn requested, and control returns to
//! *Reason* until the model answers without tool calls.

use std::sync::Arc;

use futures::future::join_all;

use crate::binding::CompletionBinding;
use crate::error::{AgentError, Result};
use crate::message::Conversation;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::retry::RetryPolicy;
use crate::tool::{ToolCall, ToolResult, Toolset};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt placed at the head of every conversation
    pub system_prompt: String,

    /// Maximum Reason→Act round trips before giving up
    pub max_round_trips: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Retry policy for completion calls
    pub retry: RetryPolicy,
}

pub const DEFAULT_MAX_ROUND_TRIPS: usize = 8;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            generation: GenerationOptions::default(),
            retry: RetryPolicy::default(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Use the available tools when they help answer the request, then reply concisely.";

/// Loop state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Reason,
    Act,
    Done,
}

/// Outcome of one agent run
#[derive(Clone, Debug)]
pub struct AgentRun {
    /// Text of the final assistant message
    pub reply: String,

    /// Reason steps that ended in tool calls
    pub round_trips: usize,

    /// Tool calls executed across all Act steps
    pub tool_calls: usize,
}

/// The main Agent struct
///
/// Immutable once built; share it behind an `Arc` and give every request its
/// own [`Conversation`].
pub struct Agent {
    binding: CompletionBinding,
    tools: Arc<dyn Toolset>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<dyn Toolset>, config: AgentConfig) -> Self {
        let binding = CompletionBinding::new(
            provider,
            tools.schemas(),
            config.generation.clone(),
            config.retry.clone(),
        );

        Self {
            binding,
            tools,
            config,
        }
    }

    /// Fresh history: system prompt followed by the inbound user message
    pub fn start_conversation(&self, message: impl Into<String>) -> Conversation {
        let mut conversation = Conversation::with_system_prompt(self.config.system_prompt.clone());
        conversation.push_user(message);
        conversation
    }

    /// Answer a single user message
    pub async fn ask(&self, message: &str) -> Result<String> {
        Ok(self.ask_detailed(message).await?.reply)
    }

    /// Answer a single user message, reporting loop statistics
    pub async fn ask_detailed(&self, message: &str) -> Result<AgentRun> {
        let mut conversation = self.start_conversation(message);
        self.run(&mut conversation).await
    }

    /// Drive Reason/Act over `conversation` until the model stops calling tools.
    ///
    /// Dropping the returned future stops the loop and drops any in-flight
    /// provider or tool call.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<AgentRun> {
        let mut step = Step::Reason;
        let mut round_trips = 0;
        let mut tool_calls = 0;

        loop {
            step = match step {
                Step::Reason => {
                    let message = self.binding.complete(conversation).await?;
                    let next = if message.has_tool_calls() {
                        if round_trips >= self.config.max_round_trips {
                            tracing::warn!(round_trips, "model still requesting tools at loop budget");
                            return Err(AgentError::LoopBudgetExceeded(self.config.max_round_trips));
                        }
                        round_trips += 1;
                        Step::Act
                    } else {
                        Step::Done
                    };
                    conversation.push(message)?;
                    next
                }
                Step::Act => {
                    let calls = conversation.pending_tool_calls().to_vec();
                    tool_calls += calls.len();

                    for result in self.act(&calls).await? {
                        conversation.push_tool_result(&result)?;
                    }
                    Step::Reason
                }
                Step::Done => {
                    let reply = conversation.last_assistant_text().unwrap_or_default().to_string();
                    return Ok(AgentRun {
                        reply,
                        round_trips,
                        tool_calls,
                    });
                }
            };
        }
    }

    /// Run a batch concurrently; results come back in request order
    async fn act(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>> {
        join_all(calls.iter().map(|call| self.execute_tool(call)))
            .await
            .into_iter()
            .collect()
    }

    /// Execute a tool call
    async fn execute_tool(&self, call: &ToolCall) -> Result<ToolResult> {
        tracing::debug!(tool = %call.name, call_id = %call.id, "Executing tool");

        match self.tools.invoke(call).await {
            Ok(mut result) => {
                result.id = Some(call.id.clone());
                Ok(result)
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                Ok(ToolResult::failure(call.name.clone(), e.to_string()).with_id(call.id.clone()))
            }
            Err(e) => {
                tracing::error!(tool = %call.name, error = %e, "tool call aborted the run");
                Err(e)
            }
        }
    }

    /// Get the provider
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        self.binding.provider()
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Option<Arc<dyn Toolset>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: None,
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<dyn Toolset>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub const fn max_round_trips(mut self, max: usize) -> Self {
        self.config.max_round_trips = max;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let tools = self
            .tools
            .ok_or_else(|| AgentError::Config("Toolset is required".into()))?;

        Ok(Agent::new(provider, tools, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Role};
    use crate::provider::{Completion, ProviderInfo};
    use crate::tool::{ParameterSchema, ToolSchema};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replays canned completions and records how many times it was asked
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Completion>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Completion>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                name: "scripted".into(),
                model: "test".into(),
                supports_tools: true,
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Completion::text("script exhausted", "test")))
        }
    }

    /// `echo` returns its `text` argument after an optional delay;
    /// `broken_store` always fails terminally.
    struct EchoTools;

    #[async_trait]
    impl Toolset for EchoTools {
        fn schemas(&self) -> Vec<ToolSchema> {
            vec![ToolSchema {
                name: "echo".into(),
                description: "Echo text back".into(),
                parameters: vec![ParameterSchema::new("text", "string", "Text").required()],
            }]
        }

        async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
            match call.name.as_str() {
                "echo" => {
                    let delay = call.arguments.get("delay_ms").and_then(serde_json::Value::as_u64);
                    if let Some(ms) = delay {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                    let text = call.arguments.get("text").and_then(|v| v.as_str()).unwrap_or_default();
                    Ok(ToolResult::success("echo", text))
                }
                "broken_store" => Err(AgentError::StoreUnavailable("connection refused".into())),
                other => Err(AgentError::ToolNotFound(other.into())),
            }
        }
    }

    fn echo(text: &str) -> ToolCall {
        ToolCall::from_json("echo", json!({ "text": text }))
    }

    fn agent(provider: Arc<ScriptedProvider>, max_round_trips: usize) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tools(Arc::new(EchoTools))
            .max_round_trips(max_round_trips)
            .retry(RetryPolicy::none())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_answer_is_returned_unchanged() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Completion::text(
            "  Nothing to do here.\n",
            "test",
        ))]));
        let agent = agent(provider.clone(), 3);

        let run = agent.ask_detailed("hello").await.unwrap();
        assert_eq!(run.reply, "  Nothing to do here.\n");
        assert_eq!(run.round_trips, 0);
        assert_eq!(run.tool_calls, 0);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_results_follow_request_order() {
        let slow = ToolCall::from_json("echo", json!({"text": "first", "delay_ms": 30}));
        let unknown = ToolCall::from_json("delete_everything", json!({}));
        let fast = echo("third");
        let ids: Vec<String> = [&slow, &unknown, &fast].iter().map(|c| c.id.clone()).collect();

        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Completion::tool_use(vec![slow, unknown, fast], "test")),
            Ok(Completion::text("all done", "test")),
        ]));
        let agent = agent(provider, 3);

        let mut conversation = agent.start_conversation("run three things");
        let run = agent.run(&mut conversation).await.unwrap();
        assert_eq!(run.reply, "all done");
        assert_eq!(run.tool_calls, 3);

        let tool_messages: Vec<&Message> = conversation
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 3);

        let answered: Vec<String> = tool_messages
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(answered, ids);

        assert_eq!(tool_messages[0].content, "first");
        assert!(tool_messages[1].content.starts_with("Error: Tool not found"));
        assert_eq!(tool_messages[2].content, "third");
    }

    #[tokio::test]
    async fn test_two_round_trips_fit_the_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Completion::tool_use(vec![echo("query")], "test")),
            Ok(Completion::tool_use(vec![echo("update")], "test")),
            Ok(Completion::text("updated it", "test")),
        ]));
        let agent = agent(provider.clone(), 2);

        let run = agent.ask_detailed("find then update").await.unwrap();
        assert_eq!(run.reply, "updated it");
        assert_eq!(run.round_trips, 2);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_exceeding_the_budget_fails() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Completion::tool_use(vec![echo("1")], "test")),
            Ok(Completion::tool_use(vec![echo("2")], "test")),
            Ok(Completion::tool_use(vec![echo("3")], "test")),
            Ok(Completion::text("never reached", "test")),
        ]));
        let agent = agent(provider.clone(), 2);

        let err = agent.ask("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::LoopBudgetExceeded(2)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_terminal_tool_error_aborts() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Completion::tool_use(
            vec![echo("ok"), ToolCall::from_json("broken_store", json!({}))],
            "test",
        ))]));
        let agent = agent(provider.clone(), 3);

        let err = agent.ask("save something").await.unwrap_err();
        assert!(matches!(err, AgentError::StoreUnavailable(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_unavailable_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(AgentError::ProviderUnavailable(
            "connection reset".into(),
        ))]));
        let agent = agent(provider, 3);

        let err = agent.ask("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_dropping_the_run_stops_the_loop() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedProvider::new(vec![Ok(Completion::tool_use(vec![echo("late")], "test"))])
        });
        let agent = agent(provider.clone(), 3);

        let outcome = tokio::time::timeout(Duration::from_millis(20), agent.ask("slow")).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_builder_requires_provider_and_tools() {
        let err = AgentBuilder::new().tools(Arc::new(EchoTools)).build();
        assert!(matches!(err, Err(AgentError::Config(_))));

        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let err = AgentBuilder::new().provider(provider).build();
        assert!(matches!(err, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_start_conversation_layout() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let agent = agent(provider, 3);
        let conversation = agent.start_conversation("hi");

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[1].content, "hi");
    }
}
