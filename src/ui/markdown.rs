//! Markdown rendering of model replies to ANSI text.
//!
//! Fenced code blocks go through syntect; the rest of the event stream is
//! mapped to a small set of terminal styles from the active theme.

use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;

use crate::ui::theme::Theme;

fn syntax_set() -> &'static SyntaxSet {
    static SET: OnceLock<SyntaxSet> = OnceLock::new();
    SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    static SET: OnceLock<ThemeSet> = OnceLock::new();
    SET.get_or_init(ThemeSet::load_defaults)
}

fn fg(color: Color) -> String {
    SetForegroundColor(color).to_string()
}

fn attr(attribute: Attribute) -> String {
    SetAttribute(attribute).to_string()
}

const RESET: &str = "\x1b[0m";

/// Syntax-highlight a fenced block, falling back to the theme's code color
/// when the language is unknown.
pub fn highlight_code(code: &str, lang: &str, theme: &Theme) -> String {
    let set = syntax_set();
    let syntax = set
        .find_syntax_by_token(lang)
        .or_else(|| set.find_syntax_by_extension(lang));

    match syntax {
        Some(syntax) => {
            let mut highlighter =
                HighlightLines::new(syntax, &theme_set().themes["base16-ocean.dark"]);
            let mut out = String::new();
            for line in code.lines() {
                match highlighter.highlight_line(line, set) {
                    Ok(regions) => {
                        out.push_str("  ");
                        out.push_str(&as_24_bit_terminal_escaped(&regions, false));
                        out.push_str(RESET);
                        out.push('\n');
                    }
                    Err(_) => {
                        out.push_str("  ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
            out
        }
        None => {
            let mut out = String::new();
            for line in code.lines() {
                out.push_str("  ");
                out.push_str(&fg(theme.code));
                out.push_str(line);
                out.push_str(RESET);
                out.push('\n');
            }
            out
        }
    }
}

/// Render markdown to an ANSI string ready for the terminal.
pub fn render(markdown: &str, theme: &Theme) -> String {
    let mut out = String::new();
    let mut code_buf: Option<(String, String)> = None;
    let mut list_depth: usize = 0;
    let mut ordered_counters: Vec<Option<u64>> = Vec::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                out.push_str(&attr(Attribute::Bold));
                out.push_str(&fg(theme.heading));
                out.push_str(heading_prefix(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                out.push_str(RESET);
                out.push('\n');
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code_buf = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, body)) = code_buf.take() {
                    out.push_str(&highlight_code(&body, &lang, theme));
                    out.push('\n');
                }
            }
            Event::Start(Tag::List(start)) => {
                list_depth += 1;
                ordered_counters.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                ordered_counters.pop();
                if list_depth == 0 {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                out.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                match ordered_counters.last_mut() {
                    Some(Some(counter)) => {
                        out.push_str(&format!("{counter}. "));
                        *counter += 1;
                    }
                    _ => out.push_str("• "),
                }
            }
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::Start(Tag::Emphasis) => out.push_str(&attr(Attribute::Italic)),
            Event::End(TagEnd::Emphasis) => out.push_str(RESET),
            Event::Start(Tag::Strong) => out.push_str(&attr(Attribute::Bold)),
            Event::End(TagEnd::Strong) => out.push_str(RESET),
            Event::Start(Tag::BlockQuote(_)) => out.push_str("│ "),
            Event::End(TagEnd::Paragraph) => {
                out.push('\n');
                if list_depth == 0 {
                    out.push('\n');
                }
            }
            Event::Text(text) => match code_buf.as_mut() {
                Some((_, body)) => body.push_str(&text),
                None => out.push_str(&text),
            },
            Event::Code(code) => {
                out.push_str(&fg(theme.code));
                out.push_str(&code);
                out.push_str(RESET);
            }
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => out.push_str("────────────\n"),
            _ => {}
        }
    }

    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

fn heading_prefix(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "# ",
        HeadingLevel::H2 => "## ",
        HeadingLevel::H3 => "### ",
        _ => "#### ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::theme::find_theme;

    fn strip_ansi(text: &str) -> String {
        let re = regex::Regex::new(r"\x1b\[[0-9;]*m").unwrap();
        re.replace_all(text, "").to_string()
    }

    #[test]
    fn renders_headings_and_lists() {
        let theme = find_theme("default").unwrap();
        let out = strip_ansi(&render("# Title\n\n- one\n- two\n", &theme));
        assert!(out.contains("# Title"));
        assert!(out.contains("• one"));
        assert!(out.contains("• two"));
    }

    #[test]
    fn ordered_lists_count_up() {
        let theme = find_theme("default").unwrap();
        let out = strip_ansi(&render("1. first\n2. second\n", &theme));
        assert!(out.contains("1. first"));
        assert!(out.contains("2. second"));
    }

    #[test]
    fn code_blocks_are_indented() {
        let theme = find_theme("mono").unwrap();
        let out = strip_ansi(&render("```\nlet x = 1;\n```\n", &theme));
        assert!(out.contains("  let x = 1;"));
    }

    #[test]
    fn plain_text_passes_through() {
        let theme = find_theme("mono").unwrap();
        let out = strip_ansi(&render("just a sentence", &theme));
        assert_eq!(out.trim(), "just a sentence");
    }
}
