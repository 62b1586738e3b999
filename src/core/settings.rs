//! The typed, persisted settings record.
//!
//! The on-disk form is one JSON object. `set` coerces raw strings to the
//! declared type of the key; unknown keys are rejected so typos never grow
//! the record. The kernel persists only when [`Settings::hash`] changes
//! between turns.

use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::core::roles;
use crate::ui::theme;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Active model id, `"<backend>:<model>"`, or empty when unset.
    pub model: String,
    pub max_tokens: u32,
    pub stream: bool,
    /// Conversation file name under the conversations directory.
    pub conversation: String,
    pub vi_mode: bool,
    pub speech: bool,
    pub listen: bool,
    pub debug: bool,
    pub role: String,
    pub theme: String,
    pub markdown: bool,
    pub think: bool,
    /// Postal-code form location used by the weather handler.
    pub location: String,
    pub symbiote_path: PathBuf,
    pub notes: PathBuf,
    pub imap_username: String,
    pub imap_password: String,
    pub config_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let base = default_data_dir();
        Settings {
            model: String::new(),
            max_tokens: 8192,
            stream: true,
            conversation: "conversation.jsonl".to_string(),
            vi_mode: false,
            speech: false,
            listen: false,
            debug: false,
            role: "DEFAULT".to_string(),
            theme: "default".to_string(),
            markdown: true,
            think: false,
            location: String::new(),
            symbiote_path: base.clone(),
            notes: base.join("notes.jsonl"),
            imap_username: String::new(),
            imap_password: String::new(),
            config_file: base.join("config.json"),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("org", "permacommons", "symbiote")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".symbiote"))
}

/// Keys exposed through `settings:key:value:`, in display order.
pub const SETTING_KEYS: &[&str] = &[
    "model",
    "max_tokens",
    "stream",
    "conversation",
    "vi_mode",
    "speech",
    "listen",
    "debug",
    "role",
    "theme",
    "markdown",
    "think",
    "location",
    "symbiote_path",
    "notes",
    "imap_username",
    "imap_password",
    "config_file",
];

fn parse_bool(raw: &str) -> Result<bool, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("boolean settings need a value".to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "false" | "0" | "off" => Ok(false),
        _ => Ok(true),
    }
}

fn postal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{5})\b").unwrap())
}

/// Canonicalize a location to its postal-code form.
pub fn canonical_postal_code(raw: &str) -> Result<String, String> {
    postal_re()
        .captures(raw)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| format!("no postal code found in '{}'", raw.trim()))
}

impl Settings {
    pub fn load(path: &Path) -> Result<Settings, crate::BoxError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            // Missing keys back-fill from defaults via serde(default)
            let mut settings: Settings = serde_json::from_str(&contents)?;
            settings.config_file = path.to_path_buf();
            Ok(settings)
        } else {
            let mut settings = Settings::default();
            settings.config_file = path.to_path_buf();
            Ok(settings)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), crate::BoxError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };
        let contents = serde_json::to_string_pretty(self)?;
        // Atomic rename: the file is only replaced after a complete write
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        std::io::Write::write_all(&mut tmp, contents.as_bytes())?;
        tmp.persist(path)?;
        Ok(())
    }

    /// Stable hash of the record; the kernel persists when this changes.
    pub fn hash(&self) -> u32 {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        crc32fast::hash(serialized.as_bytes())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "model" => self.model.clone(),
            "max_tokens" => self.max_tokens.to_string(),
            "stream" => self.stream.to_string(),
            "conversation" => self.conversation.clone(),
            "vi_mode" => self.vi_mode.to_string(),
            "speech" => self.speech.to_string(),
            "listen" => self.listen.to_string(),
            "debug" => self.debug.to_string(),
            "role" => self.role.clone(),
            "theme" => self.theme.clone(),
            "markdown" => self.markdown.to_string(),
            "think" => self.think.to_string(),
            "location" => self.location.clone(),
            "symbiote_path" => self.symbiote_path.display().to_string(),
            "notes" => self.notes.display().to_string(),
            "imap_username" => self.imap_username.clone(),
            "imap_password" => self.imap_password.clone(),
            "config_file" => self.config_file.display().to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Coerce `raw` to the declared type of `key` and assign it. On any
    /// failure the old value is kept and an error message returned.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), String> {
        match key {
            "model" => self.model = raw.trim().to_string(),
            "max_tokens" => {
                self.max_tokens = raw
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("max_tokens expects an integer, got '{raw}'"))?
            }
            "stream" => self.stream = parse_bool(raw)?,
            "conversation" => self.conversation = raw.trim().to_string(),
            "vi_mode" => self.vi_mode = parse_bool(raw)?,
            "speech" => self.speech = parse_bool(raw)?,
            "listen" => self.listen = parse_bool(raw)?,
            "debug" => self.debug = parse_bool(raw)?,
            "role" => {
                let name = raw.trim();
                let entry = roles::find_role(name)
                    .ok_or_else(|| format!("unknown role '{name}' (see role::)"))?;
                self.role = entry.name.to_string();
            }
            "theme" => {
                let name = raw.trim();
                let entry = theme::find_theme(name)
                    .ok_or_else(|| format!("unknown theme '{name}' (see theme::)"))?;
                self.theme = entry.name.to_string();
            }
            "markdown" => self.markdown = parse_bool(raw)?,
            "think" => self.think = parse_bool(raw)?,
            "location" => self.location = canonical_postal_code(raw)?,
            "symbiote_path" => self.symbiote_path = PathBuf::from(raw.trim()),
            "notes" => self.notes = PathBuf::from(raw.trim()),
            "imap_username" => self.imap_username = raw.trim().to_string(),
            "imap_password" => self.imap_password = raw.to_string(),
            "config_file" => self.config_file = PathBuf::from(raw.trim()),
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }

    /// Key/value rows for the settings table, in declaration order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        SETTING_KEYS
            .iter()
            .map(|key| (*key, self.get(key).unwrap_or_default()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.role, "DEFAULT");
        assert!(settings.stream);
        assert_eq!(settings.config_file, path);
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut settings = Settings::default();
        settings.set("model", "ollama:llama3:latest").unwrap();
        settings.set("max_tokens", "4096").unwrap();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.model, "ollama:llama3:latest");
        assert_eq!(loaded.max_tokens, 4096);
    }

    #[test]
    fn partial_file_backfills_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"model":"openai:gpt-4o"}"#).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.model, "openai:gpt-4o");
        assert_eq!(loaded.max_tokens, Settings::default().max_tokens);
        assert_eq!(loaded.role, "DEFAULT");
    }

    #[test]
    fn boolean_coercion_accepts_off_literals() {
        let mut settings = Settings::default();
        for raw in ["false", "0", "off", "OFF", "False"] {
            settings.stream = true;
            settings.set("stream", raw).unwrap();
            assert!(!settings.stream, "'{raw}' should coerce to false");
        }
        settings.set("stream", "yes").unwrap();
        assert!(settings.stream);
        assert!(settings.set("stream", "").is_err());
    }

    #[test]
    fn integer_coercion_rejects_garbage_and_keeps_old_value() {
        let mut settings = Settings::default();
        settings.set("max_tokens", "2048").unwrap();
        assert!(settings.set("max_tokens", "lots").is_err());
        assert_eq!(settings.max_tokens, 2048);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut settings = Settings::default();
        assert!(settings.set("frobnicate", "1").is_err());
        assert!(settings.get("frobnicate").is_none());
    }

    #[test]
    fn location_canonicalizes_to_postal_form() {
        let mut settings = Settings::default();
        settings.set("location", "Hollywood FL 33004").unwrap();
        assert_eq!(settings.location, "33004");
        assert!(settings.set("location", "nowhere").is_err());
        assert_eq!(settings.location, "33004");
    }

    #[test]
    fn role_must_name_a_table_entry() {
        let mut settings = Settings::default();
        assert!(settings.set("role", "SHELL").is_ok());
        assert!(settings.set("role", "nonesuch").is_err());
        assert_eq!(settings.role, "SHELL");
    }

    #[test]
    fn hash_changes_with_record() {
        let mut settings = Settings::default();
        let before = settings.hash();
        assert_eq!(before, settings.hash());
        settings.set("max_tokens", "1234").unwrap();
        assert_ne!(before, settings.hash());
    }
}
