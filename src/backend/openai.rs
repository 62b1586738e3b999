//! OpenAI-shaped REST adapter.

use async_trait::async_trait;
use futures_util::StreamExt;
use memchr::memchr;
use std::env;
use tokio::sync::mpsc;

use crate::api::{ApiMessage, ChatRequest, Completion, ModelsResponse};
use crate::backend::{format_api_error, process_sse_line, ChatBackend, ChatOptions, StreamEvent};
use crate::utils::url::construct_api_url;
use crate::BoxError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model-id prefixes that select the reasoning family. Those endpoints
/// reject `system` messages and streamed responses.
const REASONING_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];

pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(client: reqwest::Client) -> Self {
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self { client, base_url }
    }

    fn api_key(&self) -> Result<String, BoxError> {
        env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY is not set".into())
    }
}

pub(crate) fn is_reasoning_model(model: &str) -> bool {
    REASONING_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

/// Run an OpenAI-shaped chat call. Shared with the Groq adapter, which
/// differs only in base URL and key.
pub(crate) async fn chat_openai_shaped(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    messages: &[ApiMessage],
    options: &ChatOptions,
    reasoning_rules: bool,
    tx: mpsc::UnboundedSender<StreamEvent>,
) -> Result<(), BoxError> {
    let reasoning = reasoning_rules && is_reasoning_model(model);
    let stream = options.stream && !options.suppress && !reasoning;

    let filtered: Vec<ApiMessage>;
    let messages = if reasoning {
        filtered = messages
            .iter()
            .filter(|m| m.role != "system")
            .cloned()
            .collect();
        filtered.as_slice()
    } else {
        messages
    };

    let request = ChatRequest {
        model,
        messages,
        stream,
        max_tokens: options.max_tokens,
    };

    let response = client
        .post(construct_api_url(base_url, "chat/completions"))
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
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
        let completion = response.json::<Completion>().await?;
        if let Some(content) = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
        {
            let _ = tx.send(StreamEvent::Chunk(content));
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
                Ok(line) => process_sse_line(line.trim(), &tx),
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

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn id(&self) -> &'static str {
        "openai"
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[ApiMessage],
        options: &ChatOptions,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<(), BoxError> {
        let api_key = self.api_key()?;
        chat_openai_shaped(
            &self.client,
            &self.base_url,
            &api_key,
            model,
            messages,
            options,
            true,
            tx,
        )
        .await
    }

    async fn list_models(&self) -> Result<Vec<String>, BoxError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(construct_api_url(&self.base_url, "models"))
            .header("Authorization", format!("Bearer {api_key}"))
            .send()
            .await?
            .error_for_status()?;
        let models = response.json::<ModelsResponse>().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_prefixes_match_model_families() {
        assert!(is_reasoning_model("o1-preview"));
        assert!(is_reasoning_model("o3-mini"));
        assert!(is_reasoning_model("gpt-5"));
        assert!(!is_reasoning_model("gpt-4o"));
        assert!(!is_reasoning_model("chatgpt-4o-latest"));
    }
}
