//! Chunked batch runner with checkpointed persistence.
//!
//! URLs are processed strictly in order, one chunk per conversation. A chunk
//! that fails (transport error, exhausted tool budget) is logged and skipped;
//! the accumulator only grows from successfully parsed replies. The full
//! accumulator is persisted every `checkpoint_every` chunks and once more
//! after the last chunk.

use tracing::{debug, error, info, instrument, warn};

use crate::conversation::ConversationLoop;
use crate::parse::parse_response;
use crate::prompt::{chunk_prompt, BASE_INSTRUCTION};
use crate::{Error, ProjectRecord, RecordSink, Result};

/// Split `urls` into consecutive chunks of `chunk_size` (the last may be shorter).
pub fn chunk_urls(urls: &[String], chunk_size: usize) -> Result<Vec<&[String]>> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
    }
    Ok(urls.chunks(chunk_size).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    /// 1-based chunk index.
    pub chunk: usize,
    pub urls: Vec<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub records: Vec<ProjectRecord>,
    pub chunks: usize,
    pub failures: Vec<ChunkFailure>,
    pub checkpoints: usize,
}

pub struct BatchRunner<S: RecordSink> {
    conversation: ConversationLoop,
    sink: S,
    checkpoint_every: usize,
}

impl<S: RecordSink> std::fmt::Debug for BatchRunner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("conversation", &self.conversation)
            .field("checkpoint_every", &self.checkpoint_every)
            .finish_non_exhaustive()
    }
}

impl<S: RecordSink> BatchRunner<S> {
    pub fn new(conversation: ConversationLoop, sink: S, checkpoint_every: usize) -> Result<Self> {
        if checkpoint_every == 0 {
            return Err(Error::InvalidConfig(
                "checkpoint_every must be > 0".to_string(),
            ));
        }
        Ok(Self {
            conversation,
            sink,
            checkpoint_every,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[instrument(skip_all, fields(urls = urls.len(), chunk_size = chunk_size))]
    pub async fn run(&mut self, urls: &[String], chunk_size: usize) -> Result<RunOutcome> {
        let chunks = chunk_urls(urls, chunk_size)?;
        let total = chunks.len();
        let mut out = RunOutcome {
            chunks: total,
            ..Default::default()
        };

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let n = idx + 1;
            let prompt = chunk_prompt(BASE_INSTRUCTION, chunk);
            info!(chunk = n, total, urls = chunk.len(), "processing chunk");
            debug!(chunk = n, %prompt, "chunk prompt");

            match self.conversation.run(&prompt).await {
                Ok(done) => {
                    debug!(chunk = n, response = %done.text, "chunk response");
                    let parsed = parse_response(&done.text);
                    if parsed.is_empty() {
                        warn!(chunk = n, "response contained no project blocks");
                    }
                    info!(
                        chunk = n,
                        records = parsed.len(),
                        model_turns = done.model_turns,
                        tool_calls = done.tool_calls,
                        "chunk parsed"
                    );
                    out.records.extend(parsed);
                }
                Err(e) => {
                    error!(
                        chunk = n,
                        first_url = chunk.first().map(String::as_str).unwrap_or(""),
                        error = %e,
                        "chunk failed; continuing with next chunk"
                    );
                    out.failures.push(ChunkFailure {
                        chunk: n,
                        urls: chunk.to_vec(),
                        error: e.to_string(),
                    });
                }
            }

            // The final snapshot below covers the last chunk.
            if n % self.checkpoint_every == 0 && n < total {
                match self.sink.persist(&out.records) {
                    Ok(()) => {
                        out.checkpoints += 1;
                        info!(chunk = n, records = out.records.len(), "checkpoint saved");
                    }
                    Err(e) => {
                        warn!(chunk = n, error = %e, "checkpoint failed; keeping previous snapshot")
                    }
                }
            }
        }

        self.sink.persist(&out.records)?;
        out.checkpoints += 1;
        info!(
            records = out.records.len(),
            chunks = total,
            failed = out.failures.len(),
            "run finished; results saved"
        );
        Ok(out)
    }
}
