//! Handlers over kernel-owned state: settings, roles, themes, memory, and
//! the transcript. None of these touch the network.

use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, execute};
use serde_json::Value;
use std::io::stdout;

use crate::commands::handlers::{require_arg, user_error};
use crate::commands::{registry, HandlerOutcome};
use crate::core::kernel::Kernel;
use crate::core::roles;
use crate::core::settings::Settings;
use crate::ui::pager;
use crate::ui::theme;
use crate::BoxError;

type HandlerResult = Result<HandlerOutcome, BoxError>;

pub(super) fn help(kernel: &mut Kernel) -> HandlerResult {
    let mut rows: Vec<(String, String)> = registry::all_commands()
        .iter()
        .map(|c| {
            let kind = match c.kind {
                registry::OutcomeKind::Substitution => "splice",
                registry::OutcomeKind::SideEffect => "tool",
                registry::OutcomeKind::Hybrid => "hybrid",
            };
            (format!("{}::", c.name), format!("[{kind}] {}", c.help))
        })
        .collect();
    rows.sort();
    kernel.renderer.table("Commands", &rows);
    Ok(HandlerOutcome::Done)
}

pub(super) fn exit(kernel: &mut Kernel) -> HandlerResult {
    kernel.persist_settings(true);
    Ok(HandlerOutcome::Quit)
}

pub(super) fn clear(kernel: &mut Kernel) -> HandlerResult {
    if !kernel.renderer.quiet {
        let _ = execute!(stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0));
    }
    Ok(HandlerOutcome::Done)
}

pub(super) fn save(kernel: &mut Kernel) -> HandlerResult {
    kernel.persist_settings(true);
    kernel
        .renderer
        .info(&format!("Saved settings to {}", kernel.settings.config_file.display()));
    Ok(HandlerOutcome::Done)
}

pub(super) fn settings(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        None => {
            let rows: Vec<(String, String)> = kernel
                .settings
                .entries()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            kernel.renderer.table("Settings", &rows);
            Ok(HandlerOutcome::Done)
        }
        Some(assignment) => {
            let Some((key, value)) = assignment.split_once(':') else {
                return user_error(kernel, "usage: settings:key:value:");
            };
            match kernel.settings.set(key.trim(), value) {
                Ok(()) => {
                    if key.trim() == "theme" {
                        kernel.renderer.set_theme(value.trim());
                    }
                    let shown = kernel.settings.get(key.trim()).unwrap_or_default();
                    kernel.renderer.info(&format!("{} = {}", key.trim(), shown));
                    Ok(HandlerOutcome::Done)
                }
                Err(message) => user_error(kernel, &message),
            }
        }
    }
}

pub(super) async fn model(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        Some(model_id) => {
            let model_id = model_id.trim();
            if kernel.backends.resolve(model_id).is_none() {
                return user_error(
                    kernel,
                    &format!(
                        "'{model_id}' does not name a known backend (expected one of {})",
                        kernel.backends.backend_ids().join(", ")
                    ),
                );
            }
            kernel
                .settings
                .set("model", model_id)
                .map_err(|e| -> BoxError { e.into() })?;
            kernel.renderer.info(&format!("Model set: {model_id}"));
            Ok(HandlerOutcome::Done)
        }
        None => {
            let models = kernel.backends.list_models().await;
            if models.is_empty() {
                return user_error(kernel, "No backend answered the model enumeration.");
            }
            let rows: Vec<(String, String)> = models
                .into_iter()
                .map(|id| {
                    let marker = if id == kernel.settings.model { "← current" } else { "" };
                    (id, marker.to_string())
                })
                .collect();
            kernel.renderer.table("Models", &rows);
            Ok(HandlerOutcome::Done)
        }
    }
}

pub(super) fn role(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        Some(name) => match kernel.settings.set("role", name) {
            Ok(()) => {
                kernel.renderer.info(&format!("Role set: {}", kernel.settings.role));
                Ok(HandlerOutcome::Done)
            }
            Err(message) => user_error(kernel, &message),
        },
        None => {
            let rows: Vec<(String, String)> = roles::ROLES
                .iter()
                .map(|r| {
                    let mut preview: String = r.prompt.chars().take(60).collect();
                    if preview.len() < r.prompt.len() {
                        preview.push('…');
                    }
                    (r.name.to_string(), preview)
                })
                .collect();
            kernel.renderer.table("Roles", &rows);
            Ok(HandlerOutcome::Done)
        }
    }
}

pub(super) fn theme(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        Some(name) => match kernel.settings.set("theme", name) {
            Ok(()) => {
                kernel.renderer.set_theme(name.trim());
                kernel.renderer.info(&format!("Theme set: {}", kernel.settings.theme));
                Ok(HandlerOutcome::Done)
            }
            Err(message) => user_error(kernel, &message),
        },
        None => {
            let rows: Vec<(String, String)> = theme::builtin_themes()
                .iter()
                .map(|t| {
                    let marker = if t.name == kernel.settings.theme { "← current" } else { "" };
                    (t.name.to_string(), marker.to_string())
                })
                .collect();
            kernel.renderer.table("Themes", &rows);
            Ok(HandlerOutcome::Done)
        }
    }
}

pub(super) fn convo(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        Some(name) => {
            kernel
                .settings
                .set("conversation", name)
                .map_err(|e| -> BoxError { e.into() })?;
            kernel
                .renderer
                .info(&format!("Conversation file: {}", kernel.settings.conversation));
            Ok(HandlerOutcome::Done)
        }
        None => {
            let dir = kernel.settings.symbiote_path.join("conversations");
            let mut names = Vec::new();
            if let Ok(reader) = std::fs::read_dir(&dir) {
                for entry in reader.flatten() {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            names.sort();
            if names.is_empty() {
                kernel.renderer.info("No conversation files yet.");
            } else {
                let rows: Vec<(String, String)> = names
                    .into_iter()
                    .map(|n| {
                        let marker = if n == kernel.settings.conversation { "← current" } else { "" };
                        (n, marker.to_string())
                    })
                    .collect();
                kernel.renderer.table("Conversations", &rows);
            }
            Ok(HandlerOutcome::Done)
        }
    }
}

pub(super) fn cd(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        Some(path) => match std::env::set_current_dir(path.trim()) {
            Ok(()) => {
                kernel.renderer.info(&format!("cwd: {}", display_cwd()));
                Ok(HandlerOutcome::Done)
            }
            Err(e) => user_error(kernel, &format!("cd: {e}")),
        },
        None => {
            kernel.renderer.info(&format!("cwd: {}", display_cwd()));
            Ok(HandlerOutcome::Done)
        }
    }
}

fn display_cwd() -> String {
    std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".to_string())
}

pub(super) fn flush(kernel: &mut Kernel) -> HandlerResult {
    kernel.conversation.flush();
    kernel.renderer.info("Conversation buffer emptied.");
    Ok(HandlerOutcome::Done)
}

pub(super) fn history(kernel: &mut Kernel) -> HandlerResult {
    if kernel.conversation.is_empty() {
        return user_error(kernel, "The transcript is empty.");
    }
    let mut text = String::new();
    for entry in kernel.conversation.entries() {
        text.push_str(&format!("[{}]\n{}\n\n", entry.role.as_str(), entry.content));
    }
    if !kernel.renderer.quiet {
        pager::page("History", &text)?;
    }
    Ok(HandlerOutcome::Done)
}

pub(super) fn keywords(kernel: &mut Kernel) -> HandlerResult {
    let rows: Vec<(String, String)> = crate::commands::parser::AUDIO_TRIGGERS
        .iter()
        .map(|(pattern, replacement)| (pattern.to_string(), replacement.to_string()))
        .collect();
    kernel.renderer.table("Audio triggers", &rows);
    Ok(HandlerOutcome::Done)
}

pub(super) fn inspect(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let value = match arg {
        Some(key) => match kernel.memory.read(key.trim()) {
            Some(value) => value.clone(),
            None => return user_error(kernel, &format!("no memory under '{}'", key.trim())),
        },
        None => kernel.memory.export(),
    };
    let pretty = serde_json::to_string_pretty(&value)?;
    if kernel.renderer.quiet {
        return Ok(HandlerOutcome::Done);
    }
    pager::page(arg.unwrap_or("memory"), &pretty)?;
    Ok(HandlerOutcome::Done)
}

pub(super) fn search(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let needle = require_arg(arg, "search:needle: or search:/pattern/:")?;
    match kernel.memory.search(needle) {
        Ok(hits) if hits.is_empty() => {
            kernel.renderer.info("No matches.");
            Ok(HandlerOutcome::Done)
        }
        Ok(hits) => {
            for hit in hits {
                let body = hit.snippets.join("\n---\n");
                kernel
                    .renderer
                    .panel(&format!("{} ({})", hit.key, hit.kind), &body);
            }
            Ok(HandlerOutcome::Done)
        }
        Err(message) => user_error(kernel, &message),
    }
}

pub(super) fn memget(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let key = require_arg(arg, "memget:key:")?;
    match kernel.memory.read(key.trim()) {
        Some(Value::String(text)) => Ok(HandlerOutcome::Replace(text.clone())),
        Some(value) => Ok(HandlerOutcome::Replace(serde_json::to_string_pretty(value)?)),
        None => user_error(kernel, &format!("no memory under '{}'", key.trim())),
    }
}

pub(super) fn memory(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    match arg {
        None => {
            if kernel.memory.is_empty() {
                kernel.renderer.info("Memory is empty.");
                return Ok(HandlerOutcome::Done);
            }
            let rows: Vec<(String, String)> = kernel
                .memory
                .keys()
                .into_iter()
                .map(|key| {
                    let kind = kernel
                        .memory
                        .read(key)
                        .map(value_kind_name)
                        .unwrap_or("?");
                    (key.to_string(), kind.to_string())
                })
                .collect();
            kernel.renderer.table("Memory", &rows);
            Ok(HandlerOutcome::Done)
        }
        Some("clear") => {
            kernel.memory.flush();
            kernel.renderer.info("Memory flushed.");
            Ok(HandlerOutcome::Done)
        }
        Some(action) => {
            if let Some((verb, target)) = action.split_once(':') {
                match verb.trim() {
                    "export" => {
                        let path = target.trim();
                        let contents = serde_json::to_string_pretty(&kernel.memory.export())?;
                        std::fs::write(path, contents)?;
                        kernel.renderer.info(&format!("Memory exported to {path}"));
                        Ok(HandlerOutcome::Done)
                    }
                    "delete" => {
                        if kernel.memory.delete(target.trim()) {
                            kernel.renderer.info(&format!("Deleted '{}'", target.trim()));
                        } else {
                            kernel.renderer.error(&format!("no memory under '{}'", target.trim()));
                        }
                        Ok(HandlerOutcome::Done)
                    }
                    other => user_error(kernel, &format!("unknown memory action '{other}'")),
                }
            } else {
                user_error(kernel, "usage: memory:: | memory:clear: | memory:export:path: | memory:delete:key:")
            }
        }
    }
}

fn value_kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(super) fn reload(kernel: &mut Kernel) -> HandlerResult {
    let path = kernel.settings.config_file.clone();
    match Settings::load(&path) {
        Ok(loaded) => {
            kernel.settings = loaded;
            kernel.renderer.set_theme(&kernel.settings.theme.clone());
            kernel.renderer.markdown_enabled = kernel.settings.markdown;
            kernel.renderer.info("Settings reloaded.");
            Ok(HandlerOutcome::Done)
        }
        Err(e) => user_error(kernel, &format!("reload: {e}")),
    }
}

pub(super) fn shell(kernel: &mut Kernel) -> HandlerResult {
    kernel.shell_mode = !kernel.shell_mode;
    kernel.renderer.info(if kernel.shell_mode {
        "Shell mode on: replies are commands awaiting confirmation."
    } else {
        "Shell mode off."
    });
    Ok(HandlerOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::process_input;
    use crate::commands::TurnAction;
    use crate::utils::test_utils::test_kernel;

    #[tokio::test]
    async fn settings_assignment_round_trips() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "settings:max_tokens:4096:").await;
        assert_eq!(action, TurnAction::Done);
        assert_eq!(kernel.settings.max_tokens, 4096);
    }

    #[tokio::test]
    async fn settings_model_accepts_colon_heavy_ids() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "settings:model:ollama:llama3:latest:").await;
        assert_eq!(action, TurnAction::Done);
        assert_eq!(kernel.settings.model, "ollama:llama3:latest");
    }

    #[tokio::test]
    async fn bad_coercion_keeps_old_value() {
        let mut kernel = test_kernel();
        kernel.settings.max_tokens = 1024;
        process_input(&mut kernel, "settings:max_tokens:banana:").await;
        assert_eq!(kernel.settings.max_tokens, 1024);
    }

    #[tokio::test]
    async fn model_with_known_backend_updates_settings() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "model:fake:any:").await;
        assert_eq!(action, TurnAction::Done);
        assert_eq!(kernel.settings.model, "fake:any");
    }

    #[tokio::test]
    async fn bare_model_command_enumerates_backends() {
        let mut kernel = test_kernel();
        // The fake backend answers enumeration, so the turn ends cleanly
        let action = process_input(&mut kernel, "model::").await;
        assert_eq!(action, TurnAction::Done);
        assert!(kernel.conversation.is_empty());
    }

    #[tokio::test]
    async fn model_with_unknown_backend_is_rejected() {
        let mut kernel = test_kernel();
        let before = kernel.settings.model.clone();
        process_input(&mut kernel, "model:nonesuch:thing:").await;
        assert_eq!(kernel.settings.model, before);
    }

    #[tokio::test]
    async fn role_selection_validates_against_table() {
        let mut kernel = test_kernel();
        process_input(&mut kernel, "role:CODE:").await;
        assert_eq!(kernel.settings.role, "CODE");
        process_input(&mut kernel, "role:bogus:").await;
        assert_eq!(kernel.settings.role, "CODE");
    }

    #[tokio::test]
    async fn flush_empties_conversation() {
        let mut kernel = test_kernel();
        kernel
            .conversation
            .push(crate::core::conversation::Role::User, "hi");
        process_input(&mut kernel, "flush::").await;
        assert!(kernel.conversation.is_empty());
    }

    #[tokio::test]
    async fn memory_listing_and_clear() {
        let mut kernel = test_kernel();
        kernel.memory.create("k", serde_json::json!({"a": 1}));
        let action = process_input(&mut kernel, "memory::").await;
        assert_eq!(action, TurnAction::Done);

        process_input(&mut kernel, "memory:clear:").await;
        assert!(kernel.memory.is_empty());
    }

    #[tokio::test]
    async fn memory_export_writes_json(){
        let mut kernel = test_kernel();
        kernel.memory.create("k", serde_json::json!("v"));
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mem.json");
        process_input(&mut kernel, &format!("memory:export:{}:", path.display())).await;
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"k\""));
    }

    #[tokio::test]
    async fn search_is_read_only_over_memory() {
        let mut kernel = test_kernel();
        kernel
            .memory
            .create("get_command", serde_json::json!("an error occurred"));
        let before = kernel.memory.export();
        let action = process_input(&mut kernel, "search:/error/:").await;
        assert_eq!(action, TurnAction::Done);
        assert_eq!(kernel.memory.export(), before);
    }

    #[tokio::test]
    async fn shell_toggle_is_sticky() {
        let mut kernel = test_kernel();
        process_input(&mut kernel, "shell::").await;
        assert!(kernel.shell_mode);
        process_input(&mut kernel, "shell::").await;
        assert!(!kernel.shell_mode);
    }

    #[tokio::test]
    async fn exit_persists_even_without_changes() {
        let mut kernel = test_kernel();
        let config = kernel.settings.config_file.clone();
        let action = process_input(&mut kernel, "exit::").await;
        assert_eq!(action, TurnAction::Quit);
        assert!(config.exists());
    }
}
