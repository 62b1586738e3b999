//! Backend registry: routes `"<backend>:<model>"` identifiers to protocol
//! adapters and exposes one streaming chat interface to the kernel.

mod groq;
mod ollama;
mod openai;
mod sse;

pub use groq::GroqBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub(crate) use sse::{format_api_error, process_sse_line};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::ApiMessage;
use crate::BoxError;

/// One fragment of a streamed reply. Adapters send `Chunk` frames followed
/// by exactly one `End`; a failed call may surface `Error` before `End`.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Chunk(String),
    Error(String),
    End,
}

/// Request options the kernel attaches to every chat call. `suppress`
/// means: do not stream, do not render, hand the full text back.
#[derive(Clone, Copy, Debug)]
pub struct ChatOptions {
    pub stream: bool,
    pub suppress: bool,
    pub max_tokens: Option<u32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            stream: true,
            suppress: false,
            max_tokens: None,
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Identifier used as the prefix segment of model ids.
    fn id(&self) -> &'static str;

    /// Run one chat call, emitting [`StreamEvent`]s on `tx`. Non-streaming
    /// calls emit a single `Chunk` with the full reply before `End`.
    async fn chat(
        &self,
        model: &str,
        messages: &[ApiMessage],
        options: &ChatOptions,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<(), BoxError>;

    /// Enumerate model names this backend serves, without the prefix.
    async fn list_models(&self) -> Result<Vec<String>, BoxError>;
}

pub struct BackendRegistry {
    backends: Vec<Box<dyn ChatBackend>>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Box<dyn ChatBackend>>) -> Self {
        Self { backends }
    }

    /// The production set: OpenAI, Ollama, and Groq adapters sharing one
    /// HTTP client.
    pub fn with_defaults(client: reqwest::Client) -> Self {
        Self::new(vec![
            Box::new(OpenAiBackend::new(client.clone())),
            Box::new(OllamaBackend::new(client.clone())),
            Box::new(GroqBackend::new(client)),
        ])
    }

    /// Split a model id on its first `:` into adapter and concrete model.
    /// The remainder keeps interior colons (`ollama:llama3:latest`).
    pub fn resolve<'a>(&self, model_id: &'a str) -> Option<(&dyn ChatBackend, &'a str)> {
        let (prefix, model) = model_id.split_once(':')?;
        if model.is_empty() {
            return None;
        }
        self.backends
            .iter()
            .find(|b| b.id() == prefix)
            .map(|b| (b.as_ref(), model))
    }

    pub fn backend_ids(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Run a chat call against the backend selected by `model_id`. Network
    /// and API failures are logged and collapse to `None`; the kernel then
    /// skips the transcript append and prompts again.
    pub async fn chat(
        &self,
        model_id: &str,
        messages: &[ApiMessage],
        options: &ChatOptions,
    ) -> Option<mpsc::UnboundedReceiver<StreamEvent>> {
        let (backend, model) = match self.resolve(model_id) {
            Some(found) => found,
            None => {
                warn!(model_id, "no backend adapter for model id");
                return None;
            }
        };
        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = backend.chat(model, messages, options, tx).await {
            warn!(model_id, error = %e, "chat call failed");
            return None;
        }
        Some(rx)
    }

    /// Union of every backend's enumeration, as full `backend:model` ids.
    /// Backends that do not answer are silently skipped.
    pub async fn list_models(&self) -> Vec<String> {
        let mut all = Vec::new();
        for backend in &self.backends {
            match backend.list_models().await {
                Ok(models) => {
                    all.extend(models.into_iter().map(|m| format!("{}:{}", backend.id(), m)));
                }
                Err(e) => {
                    warn!(backend = backend.id(), error = %e, "model enumeration skipped");
                }
            }
        }
        all.sort();
        all
    }
}

/// Drain a stream receiver to completion, concatenating chunks. Used by
/// suppressed calls and tests.
pub async fn collect_stream(mut rx: mpsc::UnboundedReceiver<StreamEvent>) -> Option<String> {
    let mut full = String::new();
    let mut failed = false;
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Chunk(text) => full.push_str(&text),
            StreamEvent::Error(message) => {
                warn!(%message, "stream reported error");
                failed = true;
            }
            StreamEvent::End => break,
        }
    }
    if failed && full.is_empty() {
        None
    } else {
        Some(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        fn id(&self) -> &'static str {
            "echo"
        }

        async fn chat(
            &self,
            model: &str,
            messages: &[ApiMessage],
            _options: &ChatOptions,
            tx: mpsc::UnboundedSender<StreamEvent>,
        ) -> Result<(), BoxError> {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            let _ = tx.send(StreamEvent::Chunk(format!("{model}: {last}")));
            let _ = tx.send(StreamEvent::End);
            Ok(())
        }

        async fn list_models(&self) -> Result<Vec<String>, BoxError> {
            Ok(vec!["parrot".into()])
        }
    }

    #[test]
    fn resolve_splits_on_first_colon_only() {
        let registry = BackendRegistry::new(vec![Box::new(EchoBackend)]);
        let (backend, model) = registry.resolve("echo:llama3:latest").unwrap();
        assert_eq!(backend.id(), "echo");
        assert_eq!(model, "llama3:latest");

        assert!(registry.resolve("missing:model").is_none());
        assert!(registry.resolve("echo:").is_none());
        assert!(registry.resolve("bare-model").is_none());
    }

    #[tokio::test]
    async fn chat_routes_and_collects() {
        let registry = BackendRegistry::new(vec![Box::new(EchoBackend)]);
        let messages = vec![ApiMessage::new("user", "hello")];
        let rx = registry
            .chat("echo:parrot", &messages, &ChatOptions::default())
            .await
            .expect("backend resolved");
        let full = collect_stream(rx).await.expect("reply collected");
        assert_eq!(full, "parrot: hello");
    }

    #[tokio::test]
    async fn unknown_backend_collapses_to_none() {
        let registry = BackendRegistry::new(vec![Box::new(EchoBackend)]);
        let messages = vec![ApiMessage::new("user", "hello")];
        assert!(registry
            .chat("nope:model", &messages, &ChatOptions::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn list_models_prefixes_backend_id() {
        let registry = BackendRegistry::new(vec![Box::new(EchoBackend)]);
        assert_eq!(registry.list_models().await, vec!["echo:parrot".to_string()]);
    }
}
