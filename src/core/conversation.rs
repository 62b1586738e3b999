//! The ordered conversation transcript and its token budget.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::api::ApiMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvoEntry {
    pub role: Role,
    pub content: String,
}

/// One line of the on-disk conversation/notes files.
#[derive(Debug, Serialize)]
struct PersistedEntry<'a> {
    epoch: i64,
    role: &'a str,
    content: &'a str,
}

#[derive(Default)]
pub struct Conversation {
    entries: Vec<ConvoEntry>,
}

/// `ceil(len / 4)` over the serialized JSON form.
pub fn estimate_tokens(entry: &ConvoEntry) -> usize {
    let serialized = serde_json::to_string(entry).unwrap_or_default();
    serialized.len().div_ceil(4)
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push(ConvoEntry {
            role,
            content: content.into(),
        });
    }

    pub fn entries(&self) -> &[ConvoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ConvoEntry> {
        self.entries.last()
    }

    /// Most recent assistant reply, for `code::` and `clipboard::`.
    pub fn last_assistant(&self) -> Option<&ConvoEntry> {
        self.entries.iter().rev().find(|e| e.role == Role::Assistant)
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn estimated_tokens(&self) -> usize {
        self.entries.iter().map(estimate_tokens).sum()
    }

    /// Drop entries from the head until the estimate fits `max_tokens`.
    /// Idempotent: a second application with the same budget is a no-op.
    pub fn truncate(&mut self, max_tokens: usize) {
        while self.entries.len() > 1 && self.estimated_tokens() > max_tokens {
            self.entries.remove(0);
        }
    }

    /// The transcript as the backends expect it.
    pub fn api_messages(&self) -> Vec<ApiMessage> {
        self.entries
            .iter()
            .map(|e| ApiMessage::new(e.role.as_str(), e.content.clone()))
            .collect()
    }
}

/// Append one `{epoch, role, content}` JSON object per line. Used for both
/// the conversation file and the notes file.
pub fn save_line(path: &Path, role: Role, content: &str) -> Result<(), crate::BoxError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(&PersistedEntry {
        epoch: Utc::now().timestamp(),
        role: role.as_str(),
        content,
    })?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filled(n: usize) -> Conversation {
        let mut convo = Conversation::new();
        for i in 0..n {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            convo.push(role, format!("message number {i} with some padding text"));
        }
        convo
    }

    #[test]
    fn entries_keep_insertion_order() {
        let convo = filled(4);
        let roles: Vec<_> = convo.entries().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[test]
    fn truncate_drops_oldest_first() {
        let mut convo = filled(10);
        let budget = convo.estimated_tokens() / 2;
        convo.truncate(budget);
        assert!(convo.estimated_tokens() <= budget);
        // The newest entry survives
        assert!(convo.last().unwrap().content.contains("number 9"));
    }

    #[test]
    fn truncate_is_idempotent() {
        let mut convo = filled(10);
        convo.truncate(50);
        let after_once: Vec<_> = convo.entries().to_vec();
        convo.truncate(50);
        assert_eq!(convo.entries(), after_once.as_slice());
    }

    #[test]
    fn truncate_never_empties_the_buffer() {
        let mut convo = filled(3);
        convo.truncate(0);
        assert_eq!(convo.len(), 1);
    }

    #[test]
    fn token_estimate_is_quarter_of_json_length() {
        let entry = ConvoEntry {
            role: Role::User,
            content: "abcd".to_string(),
        };
        let json_len = serde_json::to_string(&entry).unwrap().len();
        assert_eq!(estimate_tokens(&entry), json_len.div_ceil(4));
    }

    #[test]
    fn save_line_appends_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("convo").join("test.jsonl");
        save_line(&path, Role::User, "hello").unwrap();
        save_line(&path, Role::Assistant, "hi").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["role"], "user");
        assert_eq!(first["content"], "hello");
        assert!(first["epoch"].as_i64().unwrap() > 0);
    }

    #[test]
    fn api_messages_mirror_entries() {
        let mut convo = Conversation::new();
        convo.push(Role::System, "you are helpful");
        convo.push(Role::User, "hi");
        let messages = convo.api_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "hi");
    }
}
