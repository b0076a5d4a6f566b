//! Tools the conversation model can invoke.
//!
//! Tool failures never abort the agent loop. Every execution error is
//! folded into a structured JSON payload so the model can read what went
//! wrong and recover in its next turn.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use fernwood_db::repositories::ProductRepository;
use fernwood_db::search::rank_by_similarity;

use crate::llm::{LlmClient, ToolSpec};

pub const ITEM_LOOKUP: &str = "item_lookup";

const DEFAULT_RESULT_COUNT: u32 = 10;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the tool's arguments, surfaced to the model.
    fn parameters(&self) -> Value;

    async fn execute(&self, arguments: Value) -> anyhow::Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ItemLookupArgs {
    query: String,
    #[serde(default = "default_result_count")]
    n: u32,
}

fn default_result_count() -> u32 {
    DEFAULT_RESULT_COUNT
}

/// Searches the product catalog, preferring embedding similarity and
/// falling back to substring matching when no embedded rows rank.
pub struct ItemLookupTool {
    products: Arc<dyn ProductRepository>,
    llm: Arc<dyn LlmClient>,
}

impl ItemLookupTool {
    pub fn new(products: Arc<dyn ProductRepository>, llm: Arc<dyn LlmClient>) -> Self {
        Self { products, llm }
    }

    async fn lookup(&self, arguments: Value) -> anyhow::Result<Value> {
        let args: ItemLookupArgs = serde_json::from_value(arguments)?;
        let limit = args.n.max(1);

        let total = self.products.count().await?;
        if total == 0 {
            return Ok(json!({
                "error": "no items found in inventory",
                "message": "the inventory appears to be empty",
                "count": 0,
            }));
        }

        let candidates = self.products.embedded().await?;
        if !candidates.is_empty() {
            let query_embedding = self
                .llm
                .embed(&args.query)
                .await
                .map_err(anyhow::Error::from)?;
            let ranked = rank_by_similarity(candidates, &query_embedding, limit as usize);
            if !ranked.is_empty() {
                let results: Vec<Value> = ranked
                    .iter()
                    .map(|(product, score)| json!({ "product": product, "score": score }))
                    .collect();
                info!(
                    event_name = "agent.tool.item_lookup",
                    search_type = "vector",
                    count = results.len(),
                    "item lookup served from embeddings"
                );
                return Ok(json!({
                    "search_type": "vector",
                    "query": args.query,
                    "count": results.len(),
                    "results": results,
                }));
            }
        }

        let matches = self.products.text_search(&args.query, limit).await?;
        info!(
            event_name = "agent.tool.item_lookup",
            search_type = "text",
            count = matches.len(),
            "item lookup served from text search"
        );
        Ok(json!({
            "search_type": "text",
            "query": args.query,
            "count": matches.len(),
            "results": matches,
        }))
    }
}

#[async_trait]
impl Tool for ItemLookupTool {
    fn name(&self) -> &'static str {
        ITEM_LOOKUP
    }

    fn description(&self) -> &'static str {
        "Search the furniture inventory for products matching a shopper's request. \
         Returns matching products with names, descriptions and prices."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What the shopper is looking for, in their own words"
                },
                "n": {
                    "type": "integer",
                    "description": "Maximum number of products to return (default 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> anyhow::Result<Value> {
        let query_hint = arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match self.lookup(arguments).await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                warn!(
                    event_name = "agent.tool.item_lookup_failed",
                    error = %err,
                    "item lookup failed; returning structured error to the model"
                );
                Ok(json!({
                    "error": "failed to search inventory",
                    "details": err.to_string(),
                    "query": query_hint,
                }))
            }
        }
    }
}
