//! Handlers over the local machine: files, notes, the clipboard, and
//! subprocess execution.

use serde_json::json;
use std::path::{Path, PathBuf};

use crate::commands::handlers::{finish_hybrid, require_arg, user_error, web};
use crate::commands::HandlerOutcome;
use crate::core::conversation::{save_line, Role};
use crate::core::kernel::Kernel;
use crate::ui::{file_browser, pager};
use crate::utils::clipboard::copy_to_clipboard;
use crate::utils::text::{extract_code_blocks, strip_html};
use crate::utils::url::looks_like_url;
use crate::BoxError;

type HandlerResult = Result<HandlerOutcome, BoxError>;

pub(super) fn file(kernel: &mut Kernel, standalone: bool) -> HandlerResult {
    if kernel.renderer.quiet {
        return user_error(kernel, "file:: needs an interactive terminal");
    }
    let start = std::env::current_dir()?;
    let Some(path) = file_browser::browse(&start)? else {
        kernel.renderer.info("Cancelled.");
        return Ok(HandlerOutcome::Done);
    };
    let content = std::fs::read_to_string(&path)?;
    kernel.memory.create(
        "file_command",
        json!({"path": path.display().to_string(), "content": content}),
    );
    let title = format!("File: {}", path.display());
    finish_hybrid(kernel, standalone, &title, &content, content.clone())
}

pub(super) fn view(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let path = require_arg(arg, "view:path:")?.trim();
    let content = std::fs::read_to_string(path)?;
    if !kernel.renderer.quiet {
        pager::page(path, &content)?;
    }
    Ok(HandlerOutcome::Done)
}

/// Page through a memory key, falling back to a file path.
pub(super) fn scroll(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let target = require_arg(arg, "scroll:key-or-path:")?.trim();
    let text = match kernel.memory.read(target) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(value) => serde_json::to_string_pretty(value)?,
        None => std::fs::read_to_string(target)
            .map_err(|_| format!("'{target}' is neither a memory key nor a readable file"))?,
    };
    if !kernel.renderer.quiet {
        pager::page(target, &text)?;
    }
    Ok(HandlerOutcome::Done)
}

const FIND_DEPTH_LIMIT: usize = 6;
const FIND_RESULT_LIMIT: usize = 200;

fn walk(dir: &Path, needle: &str, depth: usize, results: &mut Vec<PathBuf>) {
    if depth > FIND_DEPTH_LIMIT || results.len() >= FIND_RESULT_LIMIT {
        return;
    }
    let Ok(reader) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in reader.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if name.to_lowercase().contains(needle) {
            results.push(path.clone());
            if results.len() >= FIND_RESULT_LIMIT {
                return;
            }
        }
        if path.is_dir() {
            walk(&path, needle, depth + 1, results);
        }
    }
}

pub(super) fn find(kernel: &mut Kernel, arg: Option<&str>, standalone: bool) -> HandlerResult {
    let needle = require_arg(arg, "find:name-fragment:")?.trim().to_lowercase();
    let mut results = Vec::new();
    walk(&std::env::current_dir()?, &needle, 0, &mut results);

    if results.is_empty() {
        return user_error(kernel, &format!("nothing matching '{needle}'"));
    }
    let listing: Vec<String> = results.iter().map(|p| p.display().to_string()).collect();
    kernel
        .memory
        .create("find_command", json!({"needle": needle, "paths": listing}));
    let joined = listing.join("\n");
    let title = format!("Find: {needle}");
    finish_hybrid(kernel, standalone, &title, &joined, joined.clone())
}

pub(super) fn note(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let text = require_arg(arg, "note:text:")?;
    let path = kernel.settings.notes.clone();
    save_line(&path, Role::User, text.trim())?;
    kernel.renderer.info(&format!("Noted to {}", path.display()));
    Ok(HandlerOutcome::Done)
}

pub(super) fn code(kernel: &mut Kernel, standalone: bool) -> HandlerResult {
    let Some(reply) = kernel.conversation.last_assistant() else {
        return user_error(kernel, "no assistant reply to collect code from");
    };
    let blocks = extract_code_blocks(&reply.content);
    if blocks.is_empty() {
        return user_error(kernel, "the last reply has no code blocks");
    }
    let stored: Vec<serde_json::Value> = blocks
        .iter()
        .map(|(lang, body)| json!({"lang": lang, "code": body}))
        .collect();
    kernel.memory.create("code_command", json!(stored));

    let joined = blocks
        .iter()
        .map(|(_, body)| body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    if standalone {
        match copy_to_clipboard(&joined) {
            Ok(()) => kernel
                .renderer
                .info(&format!("{} code block(s) copied to clipboard", blocks.len())),
            Err(e) => kernel.renderer.error(&e),
        }
    }
    finish_hybrid(kernel, standalone, "Code", &joined, joined.clone())
}

pub(super) fn clipboard(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let text = match arg {
        Some(key) => match kernel.memory.read(key.trim()) {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(value) => serde_json::to_string_pretty(value)?,
            None => return user_error(kernel, &format!("no memory under '{}'", key.trim())),
        },
        None => match kernel.conversation.last_assistant() {
            Some(entry) => entry.content.clone(),
            None => return user_error(kernel, "nothing to copy yet"),
        },
    };
    match copy_to_clipboard(&text) {
        Ok(()) => kernel.renderer.info("Copied."),
        Err(e) => kernel.renderer.error(&e),
    }
    Ok(HandlerOutcome::Done)
}

pub(super) async fn extract(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let target = require_arg(arg, "extract:path-or-url:")?.trim().to_string();
    let raw = if looks_like_url(&target) {
        web::fetch_text(kernel, &target).await?
    } else {
        std::fs::read_to_string(&target)?
    };
    let text = if raw.contains('<') && raw.contains('>') {
        strip_html(&raw)
    } else {
        raw
    };
    kernel
        .memory
        .create("extract_command", json!({"source": target, "text": text}));
    let title = format!("Extract: {target}");
    finish_hybrid(kernel, standalone, &title, &text, text.clone())
}

pub(super) async fn shell_exec(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let command = require_arg(arg, "$:command:")?.to_string();
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .output()
        .await?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    kernel.memory.create(
        "shell_command",
        json!({
            "command": command,
            "stdout": stdout,
            "stderr": stderr,
            "status": output.status.code(),
        }),
    );
    let mut display = stdout.clone();
    if !stderr.trim().is_empty() {
        if !display.is_empty() {
            display.push('\n');
        }
        display.push_str(&stderr);
    }
    let title = format!("$ {command}");
    finish_hybrid(kernel, standalone, &title, &display, stdout)
}

pub(super) async fn qr(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let data = require_arg(arg, "qr:text:")?;
    let response = kernel
        .http
        .get("https://api.qrserver.com/v1/create-qr-code/")
        .query(&[("size", "300x300"), ("data", data)])
        .send()
        .await?
        .error_for_status()?;
    let bytes = response.bytes().await?;
    let dir = kernel.settings.symbiote_path.join("qr");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("qr-{}.png", chrono::Utc::now().timestamp()));
    std::fs::write(&path, &bytes)?;
    kernel.renderer.info(&format!("QR code written to {}", path.display()));
    Ok(HandlerOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{process_input, TurnAction};
    use crate::utils::test_utils::test_kernel;

    #[tokio::test]
    async fn shell_exec_standalone_stores_and_surfaces() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "$:echo hybrid-test:").await;
        assert_eq!(action, TurnAction::Done);
        let stored = kernel.memory.read("shell_command").unwrap();
        assert!(stored["stdout"].as_str().unwrap().contains("hybrid-test"));
        // Standalone hybrid surfaces the output as a transcript entry
        let last = kernel.conversation.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.contains("hybrid-test"));
    }

    #[tokio::test]
    async fn shell_exec_embedded_splices_stdout() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "explain this: $:echo spliced: thanks").await;
        match action {
            TurnAction::Send(prompt) => {
                assert!(prompt.contains("spliced"));
                assert!(prompt.starts_with("explain this:"));
                assert!(prompt.trim_end().ends_with("thanks"));
            }
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn note_appends_to_notes_file() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "note:remember the milk:").await;
        assert_eq!(action, TurnAction::Done);
        let contents = std::fs::read_to_string(&kernel.settings.notes).unwrap();
        assert!(contents.contains("remember the milk"));
    }

    #[tokio::test]
    async fn code_collects_blocks_from_last_reply() {
        let mut kernel = test_kernel();
        kernel.conversation.push(
            Role::Assistant,
            "Here:\n```rust\nfn x() {}\n```\nand\n```sh\nls\n```",
        );
        process_input(&mut kernel, "use code:: here").await;
        let stored = kernel.memory.read("code_command").unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);
        assert_eq!(stored[0]["lang"], "rust");
    }

    #[tokio::test]
    async fn code_without_reply_is_a_user_error() {
        let mut kernel = test_kernel();
        let action = process_input(&mut kernel, "code::").await;
        assert_eq!(action, TurnAction::Done);
        assert!(kernel.memory.read("code_command").is_none());
    }

    #[tokio::test]
    async fn find_stores_matching_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("alpha-report.txt"), "x").unwrap();
        std::fs::write(dir.path().join("other.txt"), "x").unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut kernel = test_kernel();
        process_input(&mut kernel, "find:report:").await;
        std::env::set_current_dir(previous).unwrap();

        let stored = kernel.memory.read("find_command").unwrap();
        let paths = stored["paths"].as_array().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].as_str().unwrap().contains("alpha-report"));
    }
}
