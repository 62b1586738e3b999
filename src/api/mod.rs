//! Wire payloads shared by the backend adapters.

use serde::{Deserialize, Serialize};

/// One message as the chat APIs expect it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// OpenAI-shaped chat completion request, also accepted by Groq.
#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ApiMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
}

/// One SSE frame of a streamed completion.
#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize)]
pub struct CompletionMessage {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

/// Non-streamed completion body (used for reasoning models and suppressed
/// requests).
#[derive(Deserialize)]
pub struct Completion {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

#[derive(Deserialize)]
pub struct ModelsResponse {
    pub data: Vec<ModelInfo>,
}

/// Ollama's `/api/chat` request body.
#[derive(Serialize)]
pub struct OllamaChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ApiMessage],
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct OllamaChatMessage {
    pub content: String,
}

/// One NDJSON line of an Ollama chat stream.
#[derive(Deserialize)]
pub struct OllamaChatResponse {
    pub message: Option<OllamaChatMessage>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Deserialize)]
pub struct OllamaModelInfo {
    pub name: String,
}

/// Ollama's `/api/tags` enumeration body.
#[derive(Deserialize)]
pub struct OllamaTagsResponse {
    pub models: Vec<OllamaModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_omits_absent_max_tokens() {
        let messages = vec![ApiMessage::new("user", "hi")];
        let request = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            stream: true,
            max_tokens: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("max_tokens"));
        assert!(json.contains("\"stream\":true"));
    }

    #[test]
    fn ollama_stream_line_parses() {
        let line = r#"{"model":"llama3","message":{"role":"assistant","content":"Hi"},"done":false}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.message.unwrap().content, "Hi");
        assert!(!parsed.done);
    }
}
