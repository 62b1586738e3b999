//! Full-screen directory navigator. Returns the selected file path, or
//! `None` when the user cancels with Escape.

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

struct Listing {
    entries: Vec<(PathBuf, bool)>, // (path, is_dir)
}

fn read_listing(dir: &Path, show_hidden: bool) -> Listing {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    if let Ok(reader) = fs::read_dir(dir) {
        for entry in reader.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                dirs.push((path, true));
            } else {
                files.push((path, false));
            }
        }
    }
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    files.sort_by(|a, b| a.0.cmp(&b.0));
    dirs.extend(files);
    Listing { entries: dirs }
}

pub fn browse(start: &Path) -> io::Result<Option<PathBuf>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let result = run(&mut stdout, start);

    execute!(stdout, cursor::Show, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    result
}

fn run(stdout: &mut io::Stdout, start: &Path) -> io::Result<Option<PathBuf>> {
    let mut current = if start.is_dir() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?
    };
    let mut selected: usize = 0;
    let mut show_hidden = false;

    loop {
        let listing = read_listing(&current, show_hidden);
        selected = selected.min(listing.entries.len().saturating_sub(1));

        let (_, rows) = crossterm::terminal::size()?;
        let height = rows.saturating_sub(3).max(1) as usize;
        let top = selected.saturating_sub(height.saturating_sub(1));

        queue!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        write!(stdout, "── {} ──", current.display())?;
        for (row, (path, is_dir)) in listing.entries.iter().skip(top).take(height).enumerate() {
            queue!(stdout, cursor::MoveTo(0, (row + 1) as u16))?;
            let index = top + row;
            let marker = if index == selected { "▸ " } else { "  " };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            let suffix = if *is_dir { "/" } else { "" };
            write!(stdout, "{marker}{name}{suffix}")?;
        }
        queue!(stdout, cursor::MoveTo(0, rows.saturating_sub(1)))?;
        write!(
            stdout,
            "Enter select, Backspace up, Ctrl-H hidden, Esc cancel"
        )?;
        stdout.flush()?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Esc => return Ok(None),
                KeyCode::Up | KeyCode::Char('k') => selected = selected.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => {
                    selected = (selected + 1).min(listing.entries.len().saturating_sub(1))
                }
                KeyCode::Backspace => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                        selected = 0;
                    }
                }
                KeyCode::Char('h') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    show_hidden = !show_hidden;
                    selected = 0;
                }
                KeyCode::Enter => {
                    if let Some((path, is_dir)) = listing.entries.get(selected) {
                        if *is_dir {
                            current = path.clone();
                            selected = 0;
                        } else {
                            return Ok(Some(path.clone()));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn listing_sorts_dirs_before_files_and_hides_dotfiles() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        fs::write(dir.path().join(".hidden"), "x").unwrap();

        let listing = read_listing(dir.path(), false);
        let names: Vec<String> = listing
            .entries
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["sub", "a.txt"]);

        let with_hidden = read_listing(dir.path(), true);
        assert_eq!(with_hidden.entries.len(), 3);
    }
}
