//! Run configuration.
//!
//! Everything the batch runner and the conversation loop need is carried in a
//! [`RunConfig`] value passed at construction; nothing is read from globals.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_MODEL: &str = "grok-4-0709";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Chat model identifier sent with every request.
    pub model: String,
    /// URLs per model request.
    pub chunk_size: usize,
    /// Persist the accumulator after this many processed chunks.
    pub checkpoint_every: usize,
    /// Upper bound on model requests per chunk.
    pub max_iterations: usize,
    /// Hits requested from the search provider per tool call.
    pub max_search_results: usize,
    /// Search request timeout; `None` leaves the provider default.
    pub search_timeout_ms: Option<u64>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            chunk_size: 10,
            checkpoint_every: 5,
            max_iterations: 5,
            max_search_results: 20,
            search_timeout_ms: None,
            temperature: Some(0.7),
            max_tokens: Some(4096),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::InvalidConfig("model must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
        }
        if self.checkpoint_every == 0 {
            return Err(Error::InvalidConfig(
                "checkpoint_every must be > 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_iterations must be > 0".to_string(),
            ));
        }
        if self.max_search_results == 0 {
            return Err(Error::InvalidConfig(
                "max_search_results must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
