//! In-memory fakes and kernel builders shared by the unit tests.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::api::ApiMessage;
use crate::backend::{BackendRegistry, ChatBackend, ChatOptions, StreamEvent};
use crate::core::kernel::Kernel;
use crate::core::settings::Settings;
use crate::ui::renderer::Renderer;
use crate::BoxError;

/// Backend that replays a canned reply in two chunks, standing in for a
/// real adapter.
pub struct FakeBackend {
    pub reply: String,
}

#[async_trait]
impl ChatBackend for FakeBackend {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn chat(
        &self,
        _model: &str,
        _messages: &[ApiMessage],
        _options: &ChatOptions,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<(), BoxError> {
        let midpoint = self.reply.len() / 2;
        let mid = (0..=midpoint)
            .rev()
            .find(|&i| self.reply.is_char_boundary(i))
            .unwrap_or(0);
        let (head, tail) = self.reply.split_at(mid);
        if !head.is_empty() {
            let _ = tx.send(StreamEvent::Chunk(head.to_string()));
        }
        if !tail.is_empty() {
            let _ = tx.send(StreamEvent::Chunk(tail.to_string()));
        }
        let _ = tx.send(StreamEvent::End);
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>, BoxError> {
        Ok(vec!["any".to_string()])
    }
}

static TEST_DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

fn fresh_test_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "symbiote-test-{}-{}",
        std::process::id(),
        TEST_DIR_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).expect("test dir");
    dir
}

/// Kernel wired to a [`FakeBackend`] with all paths under a fresh temp
/// directory and rendering suppressed.
pub fn kernel_with_reply(reply: &str) -> Kernel {
    let dir = fresh_test_dir();
    let mut settings = Settings::default();
    settings.model = "fake:any".to_string();
    settings.symbiote_path = dir.clone();
    settings.notes = dir.join("notes.jsonl");
    settings.config_file = dir.join("config.json");

    let backends = BackendRegistry::new(vec![Box::new(FakeBackend {
        reply: reply.to_string(),
    })]);
    let mut renderer = Renderer::new(&settings.theme, settings.markdown);
    renderer.quiet = true;
    Kernel::new(settings, backends, renderer)
}

pub fn test_kernel() -> Kernel {
    kernel_with_reply("ok")
}
