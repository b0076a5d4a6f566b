use std::sync::Arc;

use fernwood_core::ThreadId;
use fernwood_db::repositories::{ProductRepository, ThreadLog};

use crate::graph::{AgentError, ConversationGraph};
use crate::llm::LlmClient;
use crate::tools::{ItemLookupTool, ToolRegistry};

#[derive(Clone, Copy, Debug)]
pub struct RuntimeOptions {
    pub recursion_limit: u32,
    pub max_model_retries: u32,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { recursion_limit: 15, max_model_retries: 3 }
    }
}

/// Server-facing entry point for the shopping assistant. Owns the
/// conversation graph and its tool registry.
pub struct AgentRuntime {
    graph: ConversationGraph,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        log: Arc<dyn ThreadLog>,
        options: RuntimeOptions,
    ) -> Self {
        let graph = ConversationGraph::new(
            llm,
            tools,
            log,
            options.recursion_limit,
            options.max_model_retries,
        );
        Self { graph }
    }

    /// Standard wiring: the catalog lookup tool backed by the given product
    /// repository, with the same client serving chat and embeddings.
    pub fn with_item_lookup(
        llm: Arc<dyn LlmClient>,
        products: Arc<dyn ProductRepository>,
        log: Arc<dyn ThreadLog>,
        options: RuntimeOptions,
    ) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ItemLookupTool::new(products, llm.clone())));
        Self::new(llm, tools, log, options)
    }

    pub async fn handle_thread_message(
        &self,
        thread: &ThreadId,
        text: &str,
    ) -> Result<String, AgentError> {
        self.graph.run(thread, text).await
    }
}
