//! Tool schema and dispatch.
//!
//! Exactly one tool is exposed to the model (`search_web`). Dispatch is a
//! closed enum, so adding a tool means adding a variant and the compiler
//! points at every match that needs it.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Error, FunctionDefinition, SearchProvider, SearchQuery, ToolCall, ToolDefinition};

pub const SEARCH_WEB: &str = "search_web";

/// Returned verbatim for tool names the dispatcher does not know.
pub const UNKNOWN_TOOL: &str = "Unknown tool";

/// Prefix of every error payload handed back to the model.
pub const SEARCH_FAILED_PREFIX: &str = "Search failed: ";

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        kind: "function".to_string(),
        function: FunctionDefinition {
            name: SEARCH_WEB.to_string(),
            description: "Search the web for information".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        },
    }]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    SearchWeb { query: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnknownTool(String),
    BadArguments(String),
}

#[derive(Debug, Deserialize)]
struct SearchWebArgs {
    query: String,
}

impl ToolInvocation {
    pub fn decode(call: &ToolCall) -> Result<Self, DecodeError> {
        match call.function.name.as_str() {
            SEARCH_WEB => {
                let raw = call.function.arguments.trim();
                let raw = if raw.is_empty() { "{}" } else { raw };
                let args: SearchWebArgs = serde_json::from_str(raw)
                    .map_err(|e| DecodeError::BadArguments(e.to_string()))?;
                if args.query.trim().is_empty() {
                    return Err(DecodeError::BadArguments("empty query".to_string()));
                }
                Ok(Self::SearchWeb { query: args.query })
            }
            other => Err(DecodeError::UnknownTool(other.to_string())),
        }
    }
}

/// Executes model-issued tool calls and renders the outcome as text.
///
/// Never fails: provider errors and malformed arguments come back as a
/// `Search failed: ...` string the model can react to.
#[derive(Clone)]
pub struct ToolDispatcher {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
    timeout_ms: Option<u64>,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("provider", &self.provider.name())
            .field("max_results", &self.max_results)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ToolDispatcher {
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub async fn execute(&self, call: &ToolCall) -> String {
        match ToolInvocation::decode(call) {
            Ok(ToolInvocation::SearchWeb { query }) => self.search_web(&query).await,
            Err(DecodeError::UnknownTool(name)) => {
                warn!(tool = %name, call_id = %call.id, "model requested unknown tool");
                UNKNOWN_TOOL.to_string()
            }
            Err(DecodeError::BadArguments(msg)) => {
                warn!(call_id = %call.id, error = %msg, "undecodable search_web arguments");
                format!("{SEARCH_FAILED_PREFIX}invalid arguments: {msg}")
            }
        }
    }

    async fn search_web(&self, query: &str) -> String {
        let q = SearchQuery {
            max_results: Some(self.max_results),
            timeout_ms: self.timeout_ms,
            ..SearchQuery::new(query)
        };
        match self.provider.search(&q).await {
            Ok(resp) => {
                let mut hits = resp.results;
                hits.truncate(self.max_results);
                debug!(
                    provider = %resp.provider,
                    query,
                    hits = hits.len(),
                    "search_web ok"
                );
                serde_json::to_string(&hits)
                    .unwrap_or_else(|e| format!("{SEARCH_FAILED_PREFIX}{e}"))
            }
            Err(e) => {
                warn!(provider = self.provider.name(), query, error = %e, "search_web failed");
                let msg = match e {
                    Error::Search(m) => m,
                    other => other.to_string(),
                };
                format!("{SEARCH_FAILED_PREFIX}{msg}")
            }
        }
    }
}
