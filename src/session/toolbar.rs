//! The live status toolbar, repainted from a background thread.
//!
//! The thread is a read-only observer: it snapshots the shared status,
//! samples the OS, and repaints the bottom terminal row. It never calls
//! handlers and never touches the transcript.

use chrono::Local;
use crossterm::style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, execute, terminal};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;
use sysinfo::System;

use crate::ui::theme::Theme;

const REFRESH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct ToolbarStatus {
    pub model: String,
    pub role: String,
    pub shell_mode: bool,
    /// Set while a handler or model call runs; painting pauses so the
    /// worker owns the terminal.
    pub busy: bool,
    pub log_file: Option<PathBuf>,
}

struct Shared {
    status: RwLock<ToolbarStatus>,
    stop: AtomicBool,
}

#[derive(Clone)]
pub struct ToolbarHandle {
    shared: Arc<Shared>,
}

impl ToolbarHandle {
    /// Spawn the refresher thread and return the handle the kernel uses
    /// to push status changes.
    pub fn spawn(initial: ToolbarStatus, theme: Theme) -> Self {
        let shared = Arc::new(Shared {
            status: RwLock::new(initial),
            stop: AtomicBool::new(false),
        });
        let thread_shared = Arc::clone(&shared);
        thread::spawn(move || {
            let mut sys = System::new();
            while !thread_shared.stop.load(Ordering::Relaxed) {
                let snapshot = thread_shared
                    .status
                    .read()
                    .map(|s| s.clone())
                    .unwrap_or_default();
                if !snapshot.busy {
                    sys.refresh_cpu_usage();
                    sys.refresh_memory();
                    let cpu = sys.global_cpu_usage();
                    let mem = if sys.total_memory() > 0 {
                        (sys.used_memory() as f64 / sys.total_memory() as f64) * 100.0
                    } else {
                        0.0
                    };
                    let text = compose_status(&snapshot, cpu, mem as f32);
                    let _ = paint(&text, &theme);
                }
                thread::sleep(REFRESH);
            }
        });
        Self { shared }
    }

    pub fn update(&self, apply: impl FnOnce(&mut ToolbarStatus)) {
        if let Ok(mut status) = self.shared.status.write() {
            apply(&mut status);
        }
    }

    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }
}

/// Assemble the toolbar line: clock, model, role, shell flag, CPU and
/// memory, plus the tail of the configured log file when one is set.
pub fn compose_status(status: &ToolbarStatus, cpu_percent: f32, mem_percent: f32) -> String {
    let clock = Local::now().format("%H:%M:%S");
    let model = if status.model.is_empty() {
        "no model"
    } else {
        &status.model
    };
    let mode = if status.shell_mode {
        " | shell mode"
    } else {
        ""
    };
    let mut line = format!(
        "{clock} | {model} | {}{mode} | cpu {cpu_percent:.0}% | mem {mem_percent:.0}%",
        status.role
    );
    if let Some(tail) = status.log_file.as_ref().and_then(|path| log_tail(path)) {
        line.push_str(" | ");
        line.push_str(&tail);
    }
    line
}

fn log_tail(path: &PathBuf) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let last = contents.lines().rev().find(|l| !l.trim().is_empty())?;
    let mut tail: String = last.chars().take(48).collect();
    if tail.len() < last.len() {
        tail.push('…');
    }
    Some(tail)
}

fn paint(text: &str, theme: &Theme) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    if rows < 2 {
        return Ok(());
    }
    let mut clipped: String = text.chars().take(cols as usize).collect();
    while clipped.chars().count() < cols as usize {
        clipped.push(' ');
    }
    let mut stderr = io::stderr();
    execute!(
        stderr,
        cursor::SavePosition,
        cursor::MoveTo(0, rows - 1),
        SetBackgroundColor(theme.toolbar_bg),
        SetForegroundColor(theme.toolbar_fg),
        Print(clipped),
        ResetColor,
        cursor::RestorePosition,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_includes_every_field() {
        let status = ToolbarStatus {
            model: "ollama:llama3:latest".to_string(),
            role: "DEFAULT".to_string(),
            shell_mode: false,
            busy: false,
            log_file: None,
        };
        let line = compose_status(&status, 12.3, 45.6);
        assert!(line.contains("ollama:llama3:latest"));
        assert!(line.contains("DEFAULT"));
        assert!(line.contains("cpu 12%"));
        assert!(line.contains("mem 46%"));
        assert!(!line.contains("shell mode"));
    }

    #[test]
    fn compose_flags_shell_mode_and_missing_model() {
        let status = ToolbarStatus {
            shell_mode: true,
            ..Default::default()
        };
        let line = compose_status(&status, 0.0, 0.0);
        assert!(line.contains("no model"));
        assert!(line.contains("shell mode"));
    }

    #[test]
    fn log_tail_returns_last_nonempty_line() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        fs::write(&path, "first\nsecond\n\n").unwrap();
        assert_eq!(log_tail(&path.clone()).as_deref(), Some("second"));
    }
}
