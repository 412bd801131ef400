use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod batch;
pub mod config;
pub mod conversation;
pub mod parse;
pub mod prompt;
pub mod tool;

pub use batch::{chunk_urls, BatchRunner, ChunkFailure, RunOutcome};
pub use config::RunConfig;
pub use conversation::{Completion, ConversationLoop, Transcript};
pub use parse::parse_response;
pub use tool::{ToolDispatcher, ToolInvocation};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("chat failed: {0}")]
    Chat(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("max tool iterations ({max_iterations}) reached without final response")]
    IterationsExhausted { max_iterations: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("input error: {0}")]
    Input(String),
    #[error("persist failed: {0}")]
    Persist(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---- search ---------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    /// Per-request timeout; providers clamp it to a sane range.
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

// ---- chat -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry of a chat-completions conversation.
///
/// Assistant messages may carry `tool_calls` instead of text; tool messages
/// always reference the call they answer through `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Tool calls requested by this message (empty for non-assistant roles).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Text content, treating whitespace-only content as absent.
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|s| !s.trim().is_empty())
    }
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as sent by the model.
    ///
    /// Some compatible servers send the object itself; it is re-encoded.
    #[serde(default, deserialize_with = "arguments_as_json_text")]
    pub arguments: String,
}

fn arguments_as_json_text<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Body of one chat-completions request. Serializes to the wire format as-is.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub tool_choice: &'a str,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
}

#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the full history and return the assistant message of the first choice.
    async fn complete(&self, req: &ChatRequest<'_>) -> Result<Message>;
}

// ---- records --------------------------------------------------------------

/// Column headers of the output table, in order.
pub const COLUMNS: [&str; 5] = [
    "Проект",
    "GitHub URL",
    "Наявність запущеного токена?",
    "Назва токена",
    "Примітки",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchStatus {
    Yes,
    No,
    Unknown,
}

impl LaunchStatus {
    pub fn from_flag(flag: &str) -> Self {
        let word: String = flag
            .trim()
            .chars()
            .take_while(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase();
        match word.as_str() {
            "так" | "yes" | "да" => Self::Yes,
            "ні" | "no" | "нет" => Self::No,
            _ => Self::Unknown,
        }
    }
}

/// One parsed project block. The launch flag is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project: String,
    pub github_url: String,
    pub token_launched: String,
    pub token_name: String,
    pub notes: String,
}

impl ProjectRecord {
    pub fn launch_status(&self) -> LaunchStatus {
        LaunchStatus::from_flag(&self.token_launched)
    }

    /// Token name/ticker, or `None` when the model left it empty or as a dash.
    pub fn token(&self) -> Option<&str> {
        let t = self.token_name.trim();
        if t.is_empty() || t.chars().all(|c| matches!(c, '-' | '–' | '—')) {
            None
        } else {
            Some(t)
        }
    }

    pub fn row(&self) -> [&str; 5] {
        [
            self.project.as_str(),
            self.github_url.as_str(),
            self.token_launched.as_str(),
            self.token_name.as_str(),
            self.notes.as_str(),
        ]
    }
}

/// Durable storage for the run's accumulated records.
///
/// Each call replaces the previous snapshot wholesale.
pub trait RecordSink: Send {
    fn persist(&mut self, records: &[ProjectRecord]) -> Result<()>;
}
