//! Bounded tool-calling conversation with a chat model.
//!
//! One [`ConversationLoop::run`] resolves one chunk prompt:
//!
//! - the history starts as `[system, user]`;
//! - each model turn either ends the loop (non-empty text, no tool calls) or
//!   requests tools, in which case the assistant message and one tool message
//!   per call (in request order, tagged with the call id) are appended;
//! - after `max_iterations` model turns without a final answer the loop fails
//!   with [`Error::IterationsExhausted`].
//!
//! Transport errors from the backend end the loop immediately.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::RunConfig;
use crate::prompt::SYSTEM_PROMPT;
use crate::tool::{tool_definitions, ToolDispatcher};
use crate::{ChatBackend, ChatRequest, Error, Message, Result, ToolDefinition};

/// Append-only message history of a single conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn seeded(system: &str, user: &str) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user)],
        }
    }

    pub fn push(&mut self, m: Message) {
        self.messages.push(m);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// What a single assistant message asks the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Final,
    ToolRequested,
    /// Neither text nor tool calls; the turn is recorded and the model asked again.
    Empty,
}

pub fn classify(m: &Message) -> Step {
    if !m.tool_calls().is_empty() {
        Step::ToolRequested
    } else if m.text_content().is_some() {
        Step::Final
    } else {
        Step::Empty
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// Model requests made, including the final one.
    pub model_turns: usize,
    pub tool_calls: usize,
    pub transcript: Transcript,
}

pub struct ConversationLoop {
    backend: Arc<dyn ChatBackend>,
    dispatcher: ToolDispatcher,
    tools: Vec<ToolDefinition>,
    model: String,
    max_iterations: usize,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

impl std::fmt::Debug for ConversationLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationLoop")
            .field("dispatcher", &self.dispatcher)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .finish_non_exhaustive()
    }
}

impl ConversationLoop {
    pub fn new(backend: Arc<dyn ChatBackend>, dispatcher: ToolDispatcher, cfg: &RunConfig) -> Self {
        Self {
            backend,
            dispatcher,
            tools: tool_definitions(),
            model: cfg.model.clone(),
            max_iterations: cfg.max_iterations,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }

    #[instrument(skip_all, fields(model = %self.model, max_iterations = self.max_iterations))]
    pub async fn run(&self, prompt: &str) -> Result<Completion> {
        let mut transcript = Transcript::seeded(SYSTEM_PROMPT, prompt);
        let mut tool_calls = 0usize;

        for iteration in 1..=self.max_iterations {
            let req = ChatRequest {
                model: &self.model,
                messages: transcript.messages(),
                tools: &self.tools,
                tool_choice: "auto",
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            let reply = self.backend.complete(&req).await?;

            match classify(&reply) {
                Step::Final => {
                    let text = reply.content.clone().unwrap_or_default();
                    transcript.push(reply);
                    info!(iteration, tool_calls, "model produced final answer");
                    return Ok(Completion {
                        text,
                        model_turns: iteration,
                        tool_calls,
                        transcript,
                    });
                }
                Step::ToolRequested => {
                    let calls = reply.tool_calls().to_vec();
                    transcript.push(reply);
                    for call in &calls {
                        debug!(
                            iteration,
                            call_id = %call.id,
                            tool = %call.function.name,
                            arguments = %call.function.arguments,
                            "executing tool call"
                        );
                        let payload = self.dispatcher.execute(call).await;
                        transcript.push(Message::tool(call.id.clone(), payload));
                        tool_calls += 1;
                    }
                }
                Step::Empty => {
                    warn!(iteration, "model returned neither text nor tool calls");
                    transcript.push(reply);
                }
            }
        }

        Err(Error::IterationsExhausted {
            max_iterations: self.max_iterations,
        })
    }
}
