//! Streaming chat client.
//!
//! One implementation of the incremental-token contract, shared by the
//! orchestrator's scripted chat turns and the interactive user chat:
//! `on_token` fires per chunk, `on_complete` fires exactly once when the
//! stream legitimately ends. A transport failure surfaces as an error
//! so the caller can append a visible notice — a message must never be
//! left streaming forever.

use std::sync::Arc;

use tracing::debug;

use crate::errors::{CollectiveError, StreamError};
use crate::generate::{ChatRequest, GenerationBackend, ProjectContext, StreamChunk};
use crate::model::ChatMessage;

/// Most recent messages sent with each chat request; older history is
/// truncated, not summarized.
pub const HISTORY_WINDOW: usize = 15;

/// Client for one generation backend's chat stream.
#[derive(Clone)]
pub struct ChatClient {
    backend: Arc<dyn GenerationBackend>,
}

impl ChatClient {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Run one streamed chat turn.
    ///
    /// Returns the full assembled reply. `on_token` receives each chunk
    /// in order; `on_complete` runs exactly once, after all tokens, on
    /// legitimate stream end. On transport failure the partial content
    /// assembled so far is carried inside the error path by the caller
    /// (which still holds every token it received).
    pub async fn stream_chat<F, C>(
        &self,
        persona_id: &str,
        history: &[ChatMessage],
        context: &ProjectContext,
        mut on_token: F,
        on_complete: C,
    ) -> Result<String, CollectiveError>
    where
        F: FnMut(&str) + Send,
        C: FnOnce() + Send,
    {
        let window_start = history.len().saturating_sub(HISTORY_WINDOW);
        let request = ChatRequest {
            persona_id: persona_id.to_string(),
            history: history[window_start..].to_vec(),
            context: context.clone(),
        };

        let mut stream = self.backend.chat_stream(request).await?;
        let mut content = String::new();

        loop {
            match stream.recv().await {
                Some(Ok(StreamChunk::Token(token))) => {
                    content.push_str(&token);
                    on_token(&token);
                }
                Some(Ok(StreamChunk::Done)) => {
                    debug!("Chat stream for {} complete ({} chars)", persona_id, content.len());
                    on_complete();
                    return Ok(content);
                }
                Some(Err(err)) => {
                    return Err(CollectiveError::Stream(err));
                }
                None => {
                    // Producer vanished without a Done marker
                    return Err(CollectiveError::Stream(StreamError::Truncated));
                }
            }
        }
    }
}
