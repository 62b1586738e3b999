//! Line-oriented terminal output: panels, tables, markdown replies, and
//! the live streaming region.

use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal;
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

use crate::ui::markdown;
use crate::ui::theme::{self, Theme};

const RESET: &str = "\x1b[0m";

fn fg(color: Color) -> String {
    SetForegroundColor(color).to_string()
}

pub struct Renderer {
    pub theme: Theme,
    pub markdown_enabled: bool,
    /// Suppress all output; used by `--run` piping and the HTTP API.
    pub quiet: bool,
}

impl Renderer {
    pub fn new(theme_name: &str, markdown_enabled: bool) -> Self {
        let theme = theme::find_theme(theme_name)
            .unwrap_or_else(|| theme::find_theme("default").expect("default theme present"));
        Self {
            theme,
            markdown_enabled,
            quiet: false,
        }
    }

    pub fn set_theme(&mut self, name: &str) -> bool {
        match theme::find_theme(name) {
            Some(theme) => {
                self.theme = theme;
                true
            }
            None => false,
        }
    }

    fn width(&self) -> usize {
        terminal::size().map(|(w, _)| w as usize).unwrap_or(80).clamp(20, 120)
    }

    fn emit(&self, text: &str) {
        if self.quiet {
            return;
        }
        let mut stdout = io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    pub fn line(&self, text: &str) {
        self.emit(text);
        self.emit("\n");
    }

    pub fn info(&self, text: &str) {
        self.emit(&format!("{}{}{}\n", fg(self.theme.system_text), text, RESET));
    }

    pub fn error(&self, text: &str) {
        self.emit(&format!("{}{}{}\n", fg(self.theme.error_text), text, RESET));
    }

    /// Bordered panel with a title row and wrapped body.
    pub fn panel(&self, title: &str, body: &str) {
        self.emit(&self.panel_string(title, body));
    }

    pub fn panel_string(&self, title: &str, body: &str) -> String {
        let width = self.width();
        let inner = width.saturating_sub(4).max(10);
        let border = fg(self.theme.panel_border);
        let title_style = fg(self.theme.panel_title);

        let mut out = String::new();
        out.push_str(&format!(
            "{border}╭─{RESET}{title_style} {title} {RESET}{border}{}╮{RESET}\n",
            "─".repeat(inner.saturating_sub(title.width() + 3))
        ));
        for line in body.lines() {
            for wrapped in wrap_line(line, inner) {
                let pad = inner.saturating_sub(wrapped.width());
                out.push_str(&format!(
                    "{border}│{RESET} {wrapped}{} {border}│{RESET}\n",
                    " ".repeat(pad)
                ));
            }
        }
        out.push_str(&format!("{border}╰{}╯{RESET}\n", "─".repeat(inner + 2)));
        out
    }

    /// Two-column key/value table used by `help::` and `settings::`.
    pub fn table(&self, title: &str, rows: &[(String, String)]) {
        self.emit(&self.table_string(title, rows));
    }

    pub fn table_string(&self, title: &str, rows: &[(String, String)]) -> String {
        let key_width = rows.iter().map(|(k, _)| k.width()).max().unwrap_or(0);
        let mut body = String::new();
        for (key, value) in rows {
            let pad = key_width.saturating_sub(key.width());
            body.push_str(&format!("{key}{}  {value}\n", " ".repeat(pad)));
        }
        self.panel_string(title, body.trim_end())
    }

    /// Render an assistant reply: markdown when enabled, plain otherwise.
    pub fn reply(&self, text: &str) {
        if self.markdown_enabled {
            self.emit(&markdown::render(text, &self.theme));
        } else {
            self.emit(&format!(
                "{}{}{}\n",
                fg(self.theme.assistant_text),
                text,
                RESET
            ));
        }
    }

    /// Append one streamed chunk to the live region.
    pub fn stream_chunk(&self, chunk: &str) {
        self.emit(chunk);
    }

    /// Close the live region after the final chunk.
    pub fn stream_end(&self) {
        self.emit("\n");
    }

    pub fn user_echo(&self, text: &str) {
        self.emit(&format!(
            "{}{}You:{} {}{}{}\n",
            fg(self.theme.user_text),
            SetAttribute(Attribute::Bold),
            RESET,
            fg(self.theme.user_text),
            text,
            RESET
        ));
    }
}

/// Wrap on whitespace to `width` display columns, breaking long words.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.width() <= width {
        return vec![line.to_string()];
    }
    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.width() + 1 + word.width() > width {
            wrapped.push(std::mem::take(&mut current));
        }
        if word.width() > width {
            // Hard-break a word longer than the panel
            let mut piece = String::new();
            for ch in word.chars() {
                if piece.width() + 1 > width {
                    wrapped.push(std::mem::take(&mut piece));
                }
                piece.push(ch);
            }
            current = piece;
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    if wrapped.is_empty() {
        wrapped.push(String::new());
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ansi(text: &str) -> String {
        let re = regex::Regex::new(r"\x1b\[[0-9;]*m").unwrap();
        re.replace_all(text, "").to_string()
    }

    #[test]
    fn wrap_respects_width() {
        let wrapped = wrap_line("one two three four five six seven", 10);
        assert!(wrapped.iter().all(|l| l.width() <= 10));
        assert_eq!(wrapped.join(" "), "one two three four five six seven");
    }

    #[test]
    fn wrap_hard_breaks_long_words() {
        let wrapped = wrap_line(&"x".repeat(25), 10);
        assert!(wrapped.len() >= 3);
        assert!(wrapped.iter().all(|l| l.width() <= 10));
    }

    #[test]
    fn panel_contains_title_and_body() {
        let renderer = Renderer::new("mono", true);
        let out = strip_ansi(&renderer.panel_string("Weather: 33004", "clear skies"));
        assert!(out.contains("Weather: 33004"));
        assert!(out.contains("clear skies"));
        assert!(out.contains('╭'));
        assert!(out.contains('╰'));
    }

    #[test]
    fn table_aligns_keys() {
        let renderer = Renderer::new("mono", true);
        let rows = vec![
            ("a".to_string(), "1".to_string()),
            ("longer".to_string(), "2".to_string()),
        ];
        let out = strip_ansi(&renderer.table_string("t", &rows));
        assert!(out.contains("a       1"));
        assert!(out.contains("longer  2"));
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let renderer = Renderer::new("nonesuch", true);
        assert_eq!(renderer.theme.name, "default");
    }
}
