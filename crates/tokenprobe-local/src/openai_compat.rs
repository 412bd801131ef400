use serde::Deserialize;
use tokenprobe_core::{ChatBackend, ChatRequest, Error, Message, Result};
use tracing::debug;

use crate::env;

pub const DEFAULT_BASE_URL: &str = "https://api.x.ai";

const CHAT_TIMEOUT_MS: u64 = 300_000;

fn api_key_from_env() -> Option<String> {
    env("TOKENPROBE_API_KEY").or_else(|| env("XAI_API_KEY"))
}

fn base_url_from_env() -> Option<String> {
    env("TOKENPROBE_BASE_URL")
}

/// Chat-completions client for any OpenAI-compatible endpoint (xAI by default).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Requires an API key; the base URL falls back to [`DEFAULT_BASE_URL`].
    pub fn from_env(client: reqwest::Client, base_url_override: Option<String>) -> Result<Self> {
        let api_key = api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing TOKENPROBE_API_KEY (or XAI_API_KEY)".to_string())
        })?;
        let base_url = base_url_override
            .or_else(base_url_from_env)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(client, base_url, Some(api_key)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_chat_completions(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatClient {
    async fn complete(&self, req: &ChatRequest<'_>) -> Result<Message> {
        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(CHAT_TIMEOUT_MS))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        debug!(
            model = req.model,
            messages = req.messages.len(),
            "chat.completions request"
        );
        let resp = rb
            .json(req)
            .send()
            .await
            .map_err(|e| Error::Chat(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Chat(format!(
                "chat.completions HTTP {status}: {}",
                truncate_chars(body.trim(), 500)
            )));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Chat(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Chat("chat.completions returned no choices".to_string()))
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: Message,
}
