//! The conversation loop.
//!
//! Two states alternate until the model responds with text: the model
//! decides (respond or invoke a tool) and tools execute. Every message is
//! appended to the thread log before the loop advances, so a crash mid-turn
//! never loses accepted input.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use fernwood_core::{ChatMessage, ThreadId};
use fernwood_db::repositories::{RepositoryError, ThreadLog};

use crate::backoff::retry_with_backoff;
use crate::llm::{ChatRequest, LlmClient, LlmError, ModelTurn};
use crate::tools::ToolRegistry;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("thread log operation failed: {0}")]
    Log(#[from] RepositoryError),
    #[error("model invoked unknown tool {0:?}")]
    UnknownTool(String),
    #[error("conversation exceeded {0} model turns without a final response")]
    RecursionLimitExceeded(u32),
}

pub struct ConversationGraph {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    log: Arc<dyn ThreadLog>,
    recursion_limit: u32,
    max_model_retries: u32,
}

impl ConversationGraph {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        log: Arc<dyn ThreadLog>,
        recursion_limit: u32,
        max_model_retries: u32,
    ) -> Self {
        Self { llm, tools, log, recursion_limit, max_model_retries }
    }

    /// Runs one user turn to completion and returns the assistant's reply.
    /// The user message and every intermediate step are persisted as they
    /// happen.
    pub async fn run(&self, thread: &ThreadId, user_text: &str) -> Result<String, AgentError> {
        let user_message = ChatMessage::user(user_text);
        self.log.append(thread, &user_message).await?;

        let mut messages = self.log.read(thread).await?;
        let system_prompt = system_prompt();
        let tool_specs = self.tools.specs();

        for hop in 1..=self.recursion_limit {
            let request = ChatRequest {
                system_prompt: system_prompt.clone(),
                messages: messages.clone(),
                tools: tool_specs.clone(),
            };
            let turn = retry_with_backoff(self.max_model_retries, || {
                self.llm.chat(request.clone())
            })
            .await?;

            match turn {
                ModelTurn::Respond(text) => {
                    let reply = ChatMessage::assistant(&text);
                    self.log.append(thread, &reply).await?;
                    info!(
                        event_name = "agent.graph.respond",
                        thread_id = %thread,
                        hops = hop,
                        "conversation turn complete"
                    );
                    return Ok(text);
                }
                ModelTurn::Invoke(call) => {
                    info!(
                        event_name = "agent.graph.invoke",
                        thread_id = %thread,
                        tool = %call.name,
                        hop,
                        "model invoked a tool"
                    );
                    let invocation = ChatMessage::assistant_invocation(call.clone());
                    self.log.append(thread, &invocation).await?;
                    messages.push(invocation);

                    let tool = self
                        .tools
                        .get(&call.name)
                        .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;
                    let payload = match tool.execute(call.arguments.clone()).await {
                        Ok(value) => value,
                        // Tools report their own failures as structured JSON;
                        // this path only catches ones that slipped through.
                        Err(err) => {
                            warn!(
                                event_name = "agent.graph.tool_failed",
                                thread_id = %thread,
                                tool = %call.name,
                                error = %err,
                                "tool execution failed"
                            );
                            json!({
                                "error": "tool execution failed",
                                "details": err.to_string(),
                            })
                        }
                    };
                    let result = ChatMessage::tool_result(call, payload.to_string());
                    self.log.append(thread, &result).await?;
                    messages.push(result);
                }
            }
        }

        warn!(
            event_name = "agent.graph.recursion_limit",
            thread_id = %thread,
            limit = self.recursion_limit,
            "conversation exceeded the model turn limit"
        );
        Err(AgentError::RecursionLimitExceeded(self.recursion_limit))
    }
}

/// System prompt for the shopping assistant. The current time is included
/// so the model can speak about sales and availability in the present
/// tense.
fn system_prompt() -> String {
    format!(
        "You are a helpful shopping assistant for Fernwood, an online furniture \
         store. You help shoppers find sofas, chairs, tables, beds and office \
         furniture from the store's inventory.\n\
         When a shopper asks about products, use the item_lookup tool to search \
         the inventory before answering. Recommend only products the tool \
         returned, and mention their sale prices. If the inventory has nothing \
         suitable, say so honestly rather than inventing products.\n\
         Keep replies brief and friendly.\n\
         Current time: {}",
        Utc::now().to_rfc3339()
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use fernwood_core::{Role, ToolCall};
    use fernwood_db::repositories::memory::InMemoryThreadLog;

    use super::*;
    use crate::tools::Tool;

    /// Plays back a fixed sequence of model turns.
    struct ScriptedLlm {
        turns: Mutex<Vec<Result<ModelTurn, LlmError>>>,
    }

    impl ScriptedLlm {
        fn new(turns: Vec<Result<ModelTurn, LlmError>>) -> Self {
            Self { turns: Mutex::new(turns) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(&self, _request: ChatRequest) -> Result<ModelTurn, LlmError> {
            self.turns
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(LlmError::Upstream("script exhausted".into())))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![0.0])
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "echoes its arguments"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, arguments: Value) -> anyhow::Result<Value> {
            Ok(json!({ "echoed": arguments }))
        }
    }

    fn graph(llm: ScriptedLlm, tools: ToolRegistry, log: Arc<InMemoryThreadLog>) -> ConversationGraph {
        ConversationGraph::new(Arc::new(llm), tools, log, 15, 3)
    }

    #[tokio::test]
    async fn direct_response_logs_user_and_assistant() {
        let log = Arc::new(InMemoryThreadLog::new());
        let llm = ScriptedLlm::new(vec![Ok(ModelTurn::Respond("Hello there!".into()))]);
        let graph = graph(llm, ToolRegistry::new(), log.clone());
        let thread = ThreadId("t-1".into());

        let reply = graph.run(&thread, "hi").await.unwrap();
        assert_eq!(reply, "Hello there!");

        let messages = log.read(&thread).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello there!");
    }

    #[tokio::test]
    async fn tool_invocation_round_trips_through_the_log() {
        let log = Arc::new(InMemoryThreadLog::new());
        // Turns pop from the back: invoke first, then respond.
        let llm = ScriptedLlm::new(vec![
            Ok(ModelTurn::Respond("Found it.".into())),
            Ok(ModelTurn::Invoke(ToolCall {
                name: "echo".into(),
                arguments: json!({"query": "sofa"}),
            })),
        ]);
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool));
        let graph = graph(llm, tools, log.clone());
        let thread = ThreadId("t-2".into());

        let reply = graph.run(&thread, "find a sofa").await.unwrap();
        assert_eq!(reply, "Found it.");

        let messages = log.read(&thread).await.unwrap();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert!(messages[1].tool_call.is_some());
        assert!(messages[2].content.contains("echoed"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let log = Arc::new(InMemoryThreadLog::new());
        let llm = ScriptedLlm::new(vec![Ok(ModelTurn::Invoke(ToolCall {
            name: "missing".into(),
            arguments: json!({}),
        }))]);
        let graph = graph(llm, ToolRegistry::new(), log.clone());

        let result = graph.run(&ThreadId("t-3".into()), "hi").await;
        assert!(matches!(result, Err(AgentError::UnknownTool(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn recursion_limit_bounds_the_loop() {
        let log = Arc::new(InMemoryThreadLog::new());
        let turns: Vec<Result<ModelTurn, LlmError>> = (0..20)
            .map(|_| {
                Ok(ModelTurn::Invoke(ToolCall { name: "echo".into(), arguments: json!({}) }))
            })
            .collect();
        let llm = ScriptedLlm::new(turns);
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool));
        let graph = ConversationGraph::new(Arc::new(llm), tools, log, 4, 3);

        let result = graph.run(&ThreadId("t-4".into()), "loop").await;
        assert!(matches!(result, Err(AgentError::RecursionLimitExceeded(4))));
    }

    #[tokio::test]
    async fn quota_errors_surface_without_logging_a_reply() {
        let log = Arc::new(InMemoryThreadLog::new());
        let llm = ScriptedLlm::new(vec![Err(LlmError::QuotaExhausted)]);
        let graph = graph(llm, ToolRegistry::new(), log.clone());
        let thread = ThreadId("t-5".into());

        let result = graph.run(&thread, "hi").await;
        assert!(matches!(result, Err(AgentError::Llm(LlmError::QuotaExhausted))));

        // The user message is still persisted.
        let messages = log.read(&thread).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }
}
