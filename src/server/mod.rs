//! The optional HTTP surface: one `/chat` route accepting POST bodies or
//! GET query strings and returning the model reply as JSON.

use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::kernel::Kernel;
use crate::BoxError;

pub type SharedKernel = Arc<Mutex<Kernel>>;

#[derive(Deserialize)]
pub struct ChatInput {
    pub user_input: String,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub response: String,
}

async fn chat_post(
    State(kernel): State<SharedKernel>,
    Json(input): Json<ChatInput>,
) -> Json<ChatReply> {
    let response = kernel.lock().await.run_api_turn(&input.user_input).await;
    Json(ChatReply { response })
}

async fn chat_get(
    State(kernel): State<SharedKernel>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<ChatReply> {
    let user_input = params.get("user_input").cloned().unwrap_or_default();
    let response = kernel.lock().await.run_api_turn(&user_input).await;
    Json(ChatReply { response })
}

pub fn router(kernel: SharedKernel) -> Router {
    Router::new()
        .route("/chat", post(chat_post).get(chat_get))
        .with_state(kernel)
}

/// Serve the API until the process ends. The kernel behind the mutex is
/// the same record/memory/transcript the REPL would use.
pub async fn serve(kernel: Kernel, bind: &str) -> Result<(), BoxError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "http api listening");
    let app = router(Arc::new(Mutex::new(kernel)));
    axum::serve(listener, app).await?;
    Ok(())
}
