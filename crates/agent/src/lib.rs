//! Conversational shopping assistant runtime.
//!
//! The agent is a small two-state loop on top of a hosted model API:
//!
//! 1. **Agent** (`graph`) - send the system prompt plus thread history to the
//!    model and receive a structured turn: respond, or invoke a tool.
//! 2. **Tools** (`tools`) - execute the requested tool (inventory lookup) and
//!    feed its JSON result back to the agent state.
//!
//! Every transition appends to the per-thread persisted message log, so a
//! thread can be resumed by id across requests. A recursion ceiling bounds
//! agent<->tool cycling.
//!
//! # Key types
//!
//! - `AgentRuntime` - per-request entry point (see `runtime`)
//! - `LlmClient` - pluggable provider trait; `GeminiClient` is the HTTP impl
//! - `ModelTurn` - the structured respond-or-invoke decision; there is no
//!   text sniffing on model output
//! - `retry_with_backoff` - bounded exponential backoff for rate limits

pub mod backoff;
pub mod gemini;
pub mod graph;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use backoff::retry_with_backoff;
pub use gemini::GeminiClient;
pub use graph::{AgentError, ConversationGraph};
pub use llm::{ChatRequest, LlmClient, LlmError, ModelTurn, ToolSpec};
pub use runtime::{AgentRuntime, RuntimeOptions};
pub use tools::{ItemLookupTool, Tool, ToolRegistry, ITEM_LOOKUP};
