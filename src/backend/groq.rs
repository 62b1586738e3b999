//! Groq adapter. Groq serves an OpenAI-shaped surface at its own base URL,
//! so this wraps the shared request path with Groq's key and endpoint.

use async_trait::async_trait;
use std::env;
use tokio::sync::mpsc;

use crate::api::{ApiMessage, ModelsResponse};
use crate::backend::openai::chat_openai_shaped;
use crate::backend::{ChatBackend, ChatOptions, StreamEvent};
use crate::utils::url::construct_api_url;
use crate::BoxError;

const BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqBackend {
    client: reqwest::Client,
}

impl GroqBackend {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn api_key(&self) -> Result<String, BoxError> {
        env::var("GROQ_API_KEY").map_err(|_| "GROQ_API_KEY is not set".into())
    }
}

#[async_trait]
impl ChatBackend for GroqBackend {
    fn id(&self) -> &'static str {
        "groq"
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
            BASE_URL,
            &api_key,
            model,
            messages,
            options,
            false,
            tx,
        )
        .await
    }

    async fn list_models(&self) -> Result<Vec<String>, BoxError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(construct_api_url(BASE_URL, "models"))
            .header("Authorization", format!("Bearer {api_key}"))
            .send()
            .await?
            .error_for_status()?;
        let models = response.json::<ModelsResponse>().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}
