use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use fernwood_core::{ChatMessage, ToolCall};

#[derive(Debug, Error)]
pub enum LlmError {
    /// Transient 429 from the provider. The backoff helper retries these.
    #[error("model API rate limited the request")]
    RateLimited,
    /// Quota exhaustion reported through the provider's structured error
    /// detail. Non-retriable; callers serve the canned fallback instead.
    #[error("model API quota is exhausted")]
    QuotaExhausted,
    /// Invalid or rejected credentials. Fails fast, never retried.
    #[error("model API authentication failed; check the configured API key")]
    Auth,
    #[error("rate limit retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("model API request failed: {0}")]
    Upstream(String),
}

/// The model's decision for one agent step. Exactly one variant per turn;
/// arguments arrive as a JSON object from the provider's function-calling
/// contract.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelTurn {
    Respond(String),
    Invoke(ToolCall),
}

/// Declaration of a callable tool, surfaced to the model with its input
/// schema.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ModelTurn, LlmError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}
