//! HTTP generation backend.
//!
//! Talks to the generation service over JSON endpoints plus one SSE
//! stream for chat. Every request carries a bounded timeout; the image
//! endpoint swallows its own failures per the backend contract.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{GenerationError, StreamError};
use crate::model::{CompanyProfile, ScenarioSet};

use super::{
    AssetRequest, ChatRequest, CombineRequest, CombineSynthesis, GeneratedAsset, GenerationBackend,
    ImageRequest, ImageResult, StreamChunk, TokenStream,
};

/// Backend speaking the generation service's HTTP protocol.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.generation_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GenerationError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn scenarios(&self, profile: &CompanyProfile) -> Result<ScenarioSet, GenerationError> {
        self.post_json("scenarios", json!({ "company": profile }))
            .await
    }

    async fn asset(&self, request: AssetRequest) -> Result<GeneratedAsset, GenerationError> {
        self.post_json(
            "asset",
            json!({
                "agentId": request.persona_id,
                "assetType": request.asset_type,
                "context": request.context,
            }),
        )
        .await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        let response = self
            .client
            .post(self.url("chat"))
            .json(&json!({
                "agentId": request.persona_id,
                "conversationHistory": request.history,
                "context": request.context,
            }))
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Process complete SSE events
                        while let Some(pos) = buffer.find("\n\n") {
                            let event = buffer[..pos].to_string();
                            buffer = buffer[pos + 2..].to_string();

                            match parse_sse_event(&event) {
                                Some(StreamChunk::Done) => {
                                    let _ = tx.send(Ok(StreamChunk::Done)).await;
                                    return;
                                }
                                Some(chunk) => {
                                    if tx.send(Ok(chunk)).await.is_err() {
                                        return; // Receiver dropped
                                    }
                                }
                                None => {}
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(StreamError::Transport(e.to_string())))
                            .await;
                        return;
                    }
                }
            }

            // Transport ended without the [DONE] sentinel; still a
            // legitimate end from the caller's point of view.
            let _ = tx.send(Ok(StreamChunk::Done)).await;
        });

        Ok(rx)
    }

    async fn image(&self, request: ImageRequest) -> ImageResult {
        let body = json!({
            "assetType": request.asset_type,
            "title": request.title,
            "content": request.content,
            "company": request.company_name,
            "scenario": request.scenario_label,
            "agentId": request.persona_id,
            "isFinal": request.final_quality,
        });

        match self.post_json::<ImageResult>("image", body).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Image generation unavailable: {}", err);
                ImageResult::default()
            }
        }
    }

    async fn combine(&self, request: CombineRequest) -> Result<CombineSynthesis, GenerationError> {
        self.post_json(
            "combine",
            json!({
                "assetA": request.asset_a,
                "assetB": request.asset_b,
                "context": request.context,
            }),
        )
        .await
    }
}

/// Parse one Server-Sent Events block into a stream chunk.
fn parse_sse_event(event: &str) -> Option<StreamChunk> {
    for line in event.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if data == "[DONE]" {
                return Some(StreamChunk::Done);
            }

            if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                if let Some(text) = json.get("text").and_then(|t| t.as_str()) {
                    if !text.is_empty() {
                        return Some(StreamChunk::Token(text.to_string()));
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_token() {
        let chunk = parse_sse_event("data: {\"text\":\"Hel\"}").unwrap();
        assert_eq!(chunk, StreamChunk::Token("Hel".to_string()));
    }

    #[test]
    fn test_parse_sse_done() {
        assert_eq!(parse_sse_event("data: [DONE]"), Some(StreamChunk::Done));
    }

    #[test]
    fn test_parse_sse_skips_malformed() {
        assert_eq!(parse_sse_event("data: {not json"), None);
        assert_eq!(parse_sse_event(": comment line"), None);
        assert_eq!(parse_sse_event("data: {\"text\":\"\"}"), None);
    }

    #[test]
    fn test_url_building() {
        let mut config = Config::default();
        config.endpoint = "http://example.test/api/generate/".to_string();
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.url("chat"), "http://example.test/api/generate/chat");
    }
}
