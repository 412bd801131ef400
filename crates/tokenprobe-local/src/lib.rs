pub mod csv_sink;
pub mod input;
pub mod openai_compat;
pub mod search;

pub use csv_sink::CsvFileSink;
pub use openai_compat::OpenAiCompatClient;

/// Read an env var, treating empty or whitespace-only values as unset.
pub fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Shared HTTP client for the chat endpoint and search providers.
pub fn http_client(user_agent: &str) -> tokenprobe_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| tokenprobe_core::Error::InvalidConfig(format!("http client: {e}")))
}
