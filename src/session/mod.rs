//! The prompt session: multi-line input with history and completion, fed
//! by either the line editor or the speech collaborator.

pub mod toolbar;

use rustyline::completion::{Completer, Pair};
use rustyline::config::{CompletionType, Config, EditMode};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::FileHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Editor, Helper};
use std::path::PathBuf;
use tracing::debug;

use crate::commands::registry;

/// Alternative input provider for listen mode. The collaborator blocks
/// until a finished utterance is recognized; `None` means it is gone and
/// the kernel should fall back to the editor.
pub trait SpeechCollaborator: Send + Sync {
    fn keyword_listen(&mut self) -> Option<String>;
}

pub enum ReadResult {
    Line(String),
    Interrupted,
    Eof,
}

/// Completer/validator bundle for the editor: words come from the command
/// registry, and a trailing backslash continues the line.
struct SessionHelper {
    words: Vec<String>,
}

impl Completer for SessionHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((start, Vec::new()));
        }
        let candidates = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w.clone(),
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for SessionHelper {
    type Hint = String;
}

impl Highlighter for SessionHelper {}

impl Validator for SessionHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        if ctx.input().trim_end().ends_with('\\') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Helper for SessionHelper {}

pub struct PromptSession {
    editor: Editor<SessionHelper, FileHistory>,
    history_path: PathBuf,
}

impl PromptSession {
    pub fn new(history_path: PathBuf, vi_mode: bool) -> Result<Self, crate::BoxError> {
        let config = Config::builder()
            .edit_mode(if vi_mode { EditMode::Vi } else { EditMode::Emacs })
            .completion_type(CompletionType::List)
            .auto_add_history(true)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(SessionHelper {
            words: registry::completion_words(),
        }));
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if editor.load_history(&history_path).is_err() {
            debug!(path = %history_path.display(), "no prompt history yet");
        }
        Ok(Self {
            editor,
            history_path,
        })
    }

    /// Read one (possibly continued) line of input. Backslash-newline
    /// continuations are joined before returning.
    pub fn read(&mut self, label: &str) -> ReadResult {
        match self.editor.readline(label) {
            Ok(line) => {
                let joined = line
                    .lines()
                    .map(|l| l.trim_end().trim_end_matches('\\'))
                    .collect::<Vec<_>>()
                    .join(" ");
                ReadResult::Line(joined)
            }
            Err(ReadlineError::Interrupted) => ReadResult::Interrupted,
            Err(ReadlineError::Eof) => ReadResult::Eof,
            Err(e) => {
                debug!(error = %e, "readline failed");
                ReadResult::Eof
            }
        }
    }

    /// Yes/no confirmation used by shell mode before executing anything.
    pub fn confirm(&mut self, question: &str) -> bool {
        match self.editor.readline(question) {
            Ok(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }

    pub fn save_history(&mut self) {
        let _ = self.editor.save_history(&self.history_path);
    }
}

impl Drop for PromptSession {
    fn drop(&mut self) {
        self.save_history();
    }
}
