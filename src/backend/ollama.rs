//! Ollama adapter: local HTTP server speaking NDJSON over `/api/chat`.

use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use std::env;
use tokio::sync::mpsc;

use crate::api::{ApiMessage, OllamaChatRequest, OllamaChatResponse, OllamaTagsResponse};
use crate::backend::{format_api_error, ChatBackend, ChatOptions, StreamEvent};
use crate::utils::url::construct_api_url;
use crate::BoxError;

const DEFAULT_HOST: &str = "http://localhost:11434";

pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client) -> Self {
        let base_url = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self { client, base_url }
    }
}

fn process_ndjson_line(line: &str, tx: &mpsc::UnboundedSender<StreamEvent>) -> bool {
    if line.is_empty() {
        return false;
    }
    match serde_json::from_str::<OllamaChatResponse>(line) {
        Ok(parsed) => {
            if let Some(message) = parsed.message {
                if !message.content.is_empty() {
                    let _ = tx.send(StreamEvent::Chunk(message.content));
                }
            }
            if parsed.done {
                let _ = tx.send(StreamEvent::End);
                return true;
            }
            false
        }
        Err(_) => {
            let _ = tx.send(StreamEvent::Error(format_api_error(line)));
            let _ = tx.send(StreamEvent::End);
            true
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn id(&self) -> &'static str {
        "ollama"
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ApiMessage],
        options: &ChatOptions,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<(), BoxError> {
        let stream = options.stream && !options.suppress;
        let request = OllamaChatRequest {
            model,
            messages,
            stream,
        };

        let response = self
            .client
            .post(construct_api_url(&self.base_url, "api/chat"))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<no body>".into());
            let _ = tx.send(StreamEvent::Error(format_api_error(&body)));
            let _ = tx.send(StreamEvent::End);
            return Ok(());
        }

        if !stream {
            let parsed = response.json::<OllamaChatResponse>().await?;
            if let Some(message) = parsed.message {
                let _ = tx.send(StreamEvent::Chunk(message.content));
            }
            let _ = tx.send(StreamEvent::End);
            return Ok(());
        }

        let mut body_stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body_stream.next().await {
            let chunk_bytes = chunk?;
            buffer.extend_from_slice(&chunk_bytes);

            while let Some(newline_pos) = memchr(b'\n', &buffer) {
                let finished = match std::str::from_utf8(&buffer[..newline_pos]) {
                    Ok(line) => process_ndjson_line(line.trim(), &tx),
                    Err(_) => false,
                };
                buffer.drain(..=newline_pos);
                if finished {
                    return Ok(());
                }
            }
        }

        let _ = tx.send(StreamEvent::End);
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>, BoxError> {
        let response = self
            .client
            .get(construct_api_url(&self.base_url, "api/tags"))
            .send()
            .await?
            .error_for_status()?;
        let tags = response.json::<OllamaTagsResponse>().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_lines_emit_chunks_until_done() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(!process_ndjson_line(
            r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#,
            &tx
        ));
        assert!(!process_ndjson_line(
            r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#,
            &tx
        ));
        assert!(process_ndjson_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#, &tx));

        let mut collected = String::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                StreamEvent::Chunk(text) => collected.push_str(&text),
                StreamEvent::End => break,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(collected, "Hello");
    }

    #[test]
    fn malformed_line_surfaces_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(process_ndjson_line("not json", &tx));
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::Error(_)));
        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::End));
    }
}
