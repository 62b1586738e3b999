//! The REPL kernel: composes settings, memory, the transcript, the backend
//! registry, and the renderer into the per-turn loop.

use std::path::PathBuf;
use tracing::{debug, warn};

use crate::backend::{BackendRegistry, ChatOptions, StreamEvent};
use crate::commands::{self, TurnAction};
use crate::core::conversation::{save_line, Conversation, Role};
use crate::core::memory::MemoryStore;
use crate::core::roles;
use crate::core::settings::Settings;
use crate::session::toolbar::ToolbarHandle;
use crate::session::SpeechCollaborator;
use crate::ui::renderer::Renderer;
use crate::BoxError;

#[derive(Debug, PartialEq)]
pub enum TurnStatus {
    Continue,
    Quit,
}

pub struct Kernel {
    pub settings: Settings,
    pub memory: MemoryStore,
    pub conversation: Conversation,
    pub backends: BackendRegistry,
    pub renderer: Renderer,
    pub http: reqwest::Client,
    pub shell_mode: bool,
    pub toolbar: Option<ToolbarHandle>,
    pub speech: Option<Box<dyn SpeechCollaborator>>,
    /// Shell-mode command awaiting user confirmation after the model turn.
    pub pending_shell_command: Option<String>,
    persisted_hash: u32,
}

impl Kernel {
    pub fn new(settings: Settings, backends: BackendRegistry, renderer: Renderer) -> Self {
        let persisted_hash = settings.hash();
        Self {
            settings,
            memory: MemoryStore::new(),
            conversation: Conversation::new(),
            backends,
            renderer,
            http: reqwest::Client::new(),
            shell_mode: false,
            toolbar: None,
            speech: None,
            pending_shell_command: None,
            persisted_hash,
        }
    }

    /// Persist the settings record when its hash moved since the last
    /// write. `force` makes the write unconditional (exit path).
    pub fn persist_settings(&mut self, force: bool) {
        let hash = self.settings.hash();
        if !force && hash == self.persisted_hash {
            return;
        }
        let path = self.settings.config_file.clone();
        match self.settings.save(&path) {
            Ok(()) => self.persisted_hash = hash,
            Err(e) => warn!(path = %path.display(), error = %e, "settings save failed"),
        }
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.settings
            .symbiote_path
            .join("conversations")
            .join(&self.settings.conversation)
    }

    fn role_prompt(&self) -> &'static str {
        let name = if self.shell_mode {
            "SHELL"
        } else {
            &self.settings.role
        };
        roles::find_role(name)
            .or_else(|| roles::find_role("DEFAULT"))
            .map(|r| r.prompt)
            .expect("role table has DEFAULT")
    }

    fn sync_toolbar(&self, busy: bool) {
        if let Some(toolbar) = &self.toolbar {
            toolbar.update(|status| {
                status.model = self.settings.model.clone();
                status.role = self.settings.role.clone();
                status.shell_mode = self.shell_mode;
                status.busy = busy;
            });
        }
    }

    /// Run one chat call over the current transcript and stream it to the
    /// renderer. Returns the accumulated reply, or `None` on backend
    /// failure (the transcript is then left symmetric).
    pub async fn stream_reply(&mut self, options: &ChatOptions) -> Option<String> {
        if self.settings.model.is_empty() {
            self.renderer
                .error("No model selected. Use model:backend\\:name: to pick one.");
            return None;
        }
        let messages = self.conversation.api_messages();
        let mut rx = self
            .backends
            .chat(&self.settings.model, &messages, options)
            .await?;

        let mut full = String::new();
        let mut failed = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Chunk(text) => {
                    if options.stream && !options.suppress {
                        self.renderer.stream_chunk(&text);
                    }
                    full.push_str(&text);
                }
                StreamEvent::Error(message) => {
                    warn!(%message, "model backend error");
                    if !options.suppress {
                        self.renderer.error(&message);
                    }
                    failed = true;
                }
                StreamEvent::End => break,
            }
        }
        if options.stream && !options.suppress && !full.is_empty() {
            self.renderer.stream_end();
        }
        if failed && full.is_empty() {
            return None;
        }
        Some(full)
    }

    /// Think-mode pre-pass: a reasoning call appended to the transcript
    /// before the answering call.
    async fn think_prepass(&mut self) {
        let prompt = roles::find_role("THINKING").map(|r| r.prompt).unwrap_or_default();
        self.conversation.push(Role::System, prompt);
        self.conversation.truncate(self.settings.max_tokens as usize);
        let options = ChatOptions {
            stream: self.settings.stream,
            suppress: self.renderer.quiet,
            max_tokens: Some(self.settings.max_tokens),
        };
        if let Some(reasoning) = self.stream_reply(&options).await {
            if !reasoning.is_empty() {
                self.conversation.push(Role::Assistant, reasoning);
            }
        }
    }

    /// Steps 7–9 of the turn: inject the role prompt and message, truncate
    /// to budget, call the backend, and append the reply.
    pub async fn send_to_model(&mut self, message: &str) -> Option<String> {
        if self.settings.think && !self.shell_mode {
            self.think_prepass().await;
        }

        self.conversation.push(Role::System, self.role_prompt());
        self.conversation.push(Role::User, message);
        self.conversation.truncate(self.settings.max_tokens as usize);

        let streaming = self.settings.stream && !self.shell_mode;
        let options = ChatOptions {
            stream: streaming,
            suppress: self.renderer.quiet,
            max_tokens: Some(self.settings.max_tokens),
        };
        let reply = match self.stream_reply(&options).await {
            Some(reply) => reply,
            None => return None,
        };

        if !streaming && !self.renderer.quiet {
            if self.shell_mode {
                self.renderer.panel("shell", &reply);
            } else {
                self.renderer.reply(&reply);
            }
        }

        self.conversation.push(Role::Assistant, reply.clone());
        let convo_path = self.conversation_path();
        if let Err(e) = save_line(&convo_path, Role::User, message) {
            warn!(error = %e, "conversation save failed");
        }
        if let Err(e) = save_line(&convo_path, Role::Assistant, &reply) {
            warn!(error = %e, "conversation save failed");
        }
        Some(reply)
    }

    /// One full REPL turn for `input`. Shell-mode confirmation happens in
    /// the interactive loop afterwards via [`Kernel::pending_shell_command`].
    pub async fn run_turn(&mut self, input: &str) -> TurnStatus {
        let hash_before = self.settings.hash();
        self.pending_shell_command = None;
        self.sync_toolbar(true);

        let action = commands::process_input(self, input).await;
        let status = match action {
            TurnAction::Done => TurnStatus::Continue,
            TurnAction::Quit => TurnStatus::Quit,
            TurnAction::Send(message) => {
                if let Some(reply) = self.send_to_model(&message).await {
                    if self.shell_mode {
                        self.pending_shell_command = Some(reply.trim().to_string());
                    }
                }
                TurnStatus::Continue
            }
        };

        if self.settings.hash() != hash_before {
            self.persist_settings(false);
        }
        self.sync_toolbar(false);
        debug!(
            entries = self.conversation.len(),
            tokens = self.conversation.estimated_tokens(),
            "turn complete"
        );
        status
    }

    /// Execute a confirmed shell-mode command; stdout/stderr joins the
    /// transcript as a user-role entry.
    pub async fn execute_shell(&mut self, command: &str) {
        match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
        {
            Ok(output) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    if !combined.is_empty() {
                        combined.push('\n');
                    }
                    combined.push_str(&stderr);
                }
                if combined.trim().is_empty() {
                    combined = format!("(exit {})", output.status.code().unwrap_or(-1));
                }
                self.renderer.line(&combined);
                self.conversation.push(Role::User, combined);
            }
            Err(e) => {
                warn!(error = %e, "shell execution failed");
                self.renderer.error(&format!("shell: {e}"));
            }
        }
    }

    /// One request/reply cycle for the HTTP API and `--run`: rendering
    /// suppressed, full reply returned.
    pub async fn run_api_turn(&mut self, input: &str) -> String {
        let was_quiet = self.renderer.quiet;
        self.renderer.quiet = true;
        let reply = match commands::process_input(self, input).await {
            TurnAction::Send(message) => self.send_to_model(&message).await.unwrap_or_default(),
            TurnAction::Done | TurnAction::Quit => String::new(),
        };
        self.renderer.quiet = was_quiet;
        reply
    }
}

/// The interactive run loop: read, dispatch, confirm shell commands, and
/// translate end-of-input into exit codes (0 on `exit::`/EOF, 1 on ctrl-C).
pub async fn run_interactive(
    kernel: &mut Kernel,
    session: &mut crate::session::PromptSession,
) -> i32 {
    loop {
        let label = if kernel.shell_mode {
            "shell mode> ".to_string()
        } else {
            format!("{}> ", kernel.settings.role.to_lowercase())
        };

        let input = if kernel.settings.listen && kernel.speech.is_some() {
            match kernel
                .speech
                .as_mut()
                .expect("checked above")
                .keyword_listen()
            {
                Some(utterance) => {
                    kernel.renderer.user_echo(&utterance);
                    utterance
                }
                None => {
                    kernel.settings.listen = false;
                    kernel
                        .renderer
                        .info("Speech collaborator gone; back to the prompt.");
                    continue;
                }
            }
        } else {
            match session.read(&label) {
                crate::session::ReadResult::Line(line) => line,
                crate::session::ReadResult::Interrupted => {
                    kernel.persist_settings(true);
                    return 1;
                }
                crate::session::ReadResult::Eof => {
                    kernel.persist_settings(true);
                    return 0;
                }
            }
        };

        if input.trim().is_empty() {
            continue;
        }

        match kernel.run_turn(&input).await {
            TurnStatus::Quit => {
                session.save_history();
                return 0;
            }
            TurnStatus::Continue => {}
        }

        if let Some(command) = kernel.pending_shell_command.take() {
            if !command.is_empty()
                && session.confirm(&format!("execute `{command}`? [y/N] "))
            {
                kernel.execute_shell(&command).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::Role;
    use crate::utils::test_utils::{kernel_with_reply, test_kernel};

    #[tokio::test]
    async fn successful_turn_grows_transcript_and_ends_with_assistant() {
        let mut kernel = kernel_with_reply("Paris.");
        let before = kernel.conversation.len();
        let status = kernel.run_turn("capital of France?").await;
        assert_eq!(status, TurnStatus::Continue);
        assert!(kernel.conversation.len() > before);
        assert_eq!(kernel.conversation.last().unwrap().role, Role::Assistant);
        assert_eq!(kernel.conversation.last().unwrap().content, "Paris.");
    }

    #[tokio::test]
    async fn turn_entries_keep_order() {
        let mut kernel = kernel_with_reply("reply one");
        kernel.run_turn("first").await;
        let roles: Vec<Role> = kernel
            .conversation
            .entries()
            .iter()
            .map(|e| e.role)
            .collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        kernel.run_turn("second").await;
        let roles: Vec<Role> = kernel
            .conversation
            .entries()
            .iter()
            .map(|e| e.role)
            .collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::System,
                Role::User,
                Role::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn backend_failure_leaves_transcript_symmetric() {
        // test_kernel has no backend for the configured model id
        let mut kernel = test_kernel();
        kernel.settings.model = "missing:model".to_string();
        kernel.run_turn("hello?").await;
        // System+user entries were injected but no assistant reply
        assert_ne!(
            kernel
                .conversation
                .last()
                .map(|e| e.role),
            Some(Role::Assistant)
        );
    }

    #[tokio::test]
    async fn side_effect_turn_never_calls_the_backend() {
        let mut kernel = kernel_with_reply("should not appear");
        kernel.run_turn("help::").await;
        assert!(kernel.conversation.is_empty());
    }

    #[tokio::test]
    async fn settings_persist_only_on_hash_change() {
        let mut kernel = kernel_with_reply("ok");
        let config = kernel.settings.config_file.clone();
        kernel.run_turn("hello").await;
        assert!(!config.exists(), "unchanged settings should not persist");

        kernel.run_turn("settings:max_tokens:2048:").await;
        assert!(config.exists(), "changed settings persist");
    }

    #[tokio::test]
    async fn api_turn_returns_reply_without_rendering() {
        let mut kernel = kernel_with_reply("api reply");
        let reply = kernel.run_api_turn("ping").await;
        assert_eq!(reply, "api reply");
        assert!(!kernel.renderer.quiet);
    }

    #[tokio::test]
    async fn shell_mode_parks_reply_for_confirmation() {
        let mut kernel = kernel_with_reply("ls -la\n");
        kernel.shell_mode = true;
        kernel.run_turn("list everything").await;
        assert_eq!(kernel.pending_shell_command.as_deref(), Some("ls -la"));
    }

    #[tokio::test]
    async fn execute_shell_appends_output_as_user_entry() {
        let mut kernel = test_kernel();
        kernel.execute_shell("echo kernel-test").await;
        let last = kernel.conversation.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.contains("kernel-test"));
    }
}
