//! Command token recognition.
//!
//! The grammar is `name::` (nullary) and `name:argument:` (unary). The
//! terminating colon of an argument is a `:` at end-of-input or followed by
//! whitespace, so URLs and model ids with interior colons pass through
//! unquoted; `\:` escapes a colon anywhere in an argument.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    pub name: String,
    pub arg: Option<String>,
    /// Byte span of the whole token in the source text.
    pub span: (usize, usize),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Parse an argument starting right after `name:`. Returns the unescaped
/// argument and the byte offset just past the terminating colon.
fn scan_argument(text: &str) -> Option<(String, usize)> {
    let mut arg = String::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some(&(_, ':')) = chars.peek() {
                chars.next();
                arg.push(':');
                continue;
            }
            arg.push(c);
            continue;
        }
        if c == ':' {
            let rest = &text[i + 1..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                if arg.trim().is_empty() {
                    return None;
                }
                return Some((arg, i + 1));
            }
        }
        arg.push(c);
    }
    None
}

/// Find the leftmost command token in `input`. `names` comes from the
/// registry; matching is case-sensitive.
pub fn find_invocation(input: &str, names: &[&str]) -> Option<CommandInvocation> {
    let mut best: Option<CommandInvocation> = None;

    for name in names {
        for (pos, _) in input.match_indices(name) {
            // Reject matches inside a longer identifier (`memget` vs `get`)
            if input[..pos].chars().next_back().is_some_and(is_name_char) {
                continue;
            }
            let after = &input[pos + name.len()..];
            let candidate = if let Some(rest) = after.strip_prefix("::") {
                // `name:::` is `name::` followed by stray text, not a token
                if rest.starts_with(':') {
                    continue;
                }
                Some(CommandInvocation {
                    name: name.to_string(),
                    arg: None,
                    span: (pos, pos + name.len() + 2),
                })
            } else if let Some(rest) = after.strip_prefix(':') {
                scan_argument(rest).map(|(arg, consumed)| CommandInvocation {
                    name: name.to_string(),
                    arg: Some(arg),
                    span: (pos, pos + name.len() + 1 + consumed),
                })
            } else {
                None
            };

            if let Some(candidate) = candidate {
                let replace = match &best {
                    None => true,
                    Some(current) => {
                        candidate.span.0 < current.span.0
                            || (candidate.span.0 == current.span.0
                                && candidate.name.len() > current.name.len())
                    }
                };
                if replace {
                    best = Some(candidate);
                }
                break; // later occurrences of this name cannot be more-left
            }
        }
    }
    best
}

/// Splice `replacement` over `span`, returning the new text.
pub fn splice(input: &str, span: (usize, usize), replacement: &str) -> String {
    let mut out = String::with_capacity(input.len() + replacement.len());
    out.push_str(&input[..span.0]);
    out.push_str(replacement);
    out.push_str(&input[span.1..]);
    out
}

/// Audio-trigger table: spoken phrases rewritten to canonical command form
/// before parsing, so speech-to-text input needs no punctuation.
pub const AUDIO_TRIGGERS: &[(&str, &str)] = &[
    (r"(?i)^\s*keyword\s+get\s+help\s*$", "help::"),
    (r"(?i)^\s*keyword\s+exit\s*$", "exit::"),
    (r"(?i)^\s*keyword\s+clear\s*$", "clear::"),
    (r"(?i)^\s*keyword\s+flush\s*$", "flush::"),
    (r"(?i)^\s*keyword\s+show\s+settings\s*$", "settings::"),
    (r"(?i)^\s*keyword\s+show\s+history\s*$", "history::"),
    (r"(?i)^\s*keyword\s+shell\s+mode\s*$", "shell::"),
    (r"(?i)^\s*keyword\s+get\s+ip\s*$", "getip::"),
    (r"(?i)^\s*keyword\s+get\s+weather\s*$", "weather::"),
    (
        r"(?i)^\s*keyword\s+get\s+weather\s+(?P<a>\d{5})\s*$",
        "weather:$a:",
    ),
    (r"(?i)^\s*keyword\s+search\s+(?P<a>.+?)\s*$", "search:$a:"),
    (r"(?i)^\s*keyword\s+google\s+(?P<a>.+?)\s*$", "google:$a:"),
    (r"(?i)^\s*keyword\s+wiki\s+(?P<a>.+?)\s*$", "wiki:$a:"),
];

fn compiled_triggers() -> &'static Vec<(Regex, &'static str)> {
    static TRIGGERS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    TRIGGERS.get_or_init(|| {
        AUDIO_TRIGGERS
            .iter()
            .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
            .collect()
    })
}

/// Rewrite a whole-input audio trigger to its command form. Later table
/// entries win so the more specific weather form takes precedence.
pub fn apply_audio_triggers(input: &str) -> String {
    let mut rewritten: Option<String> = None;
    for (regex, replacement) in compiled_triggers() {
        if regex.is_match(input) {
            rewritten = Some(regex.replace(input, *replacement).into_owned());
        }
    }
    rewritten.unwrap_or_else(|| input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &[
        "help", "get", "memget", "settings", "weather", "search", "$",
    ];

    #[test]
    fn input_without_tokens_is_untouched() {
        assert_eq!(find_invocation("just a sentence", NAMES), None);
        assert_eq!(find_invocation("colon: but no command", NAMES), None);
        assert_eq!(
            apply_audio_triggers("just a sentence"),
            "just a sentence".to_string()
        );
    }

    #[test]
    fn nullary_token_parses() {
        let inv = find_invocation("help::", NAMES).unwrap();
        assert_eq!(inv.name, "help");
        assert_eq!(inv.arg, None);
        assert_eq!(inv.span, (0, 6));
    }

    #[test]
    fn nullary_token_inside_text() {
        let inv = find_invocation("please help:: me", NAMES).unwrap();
        assert_eq!(inv.name, "help");
        assert_eq!(inv.span, (7, 13));
    }

    #[test]
    fn unary_argument_keeps_interior_colons() {
        let inv = find_invocation("get:https://example/:", NAMES).unwrap();
        assert_eq!(inv.arg.as_deref(), Some("https://example/"));
        assert_eq!(inv.span, (0, 21));

        let inv = find_invocation("settings:model:ollama:llama3:latest:", NAMES).unwrap();
        assert_eq!(inv.arg.as_deref(), Some("model:ollama:llama3:latest"));
    }

    #[test]
    fn unary_argument_may_contain_whitespace() {
        let inv = find_invocation("search:rust async traits:", NAMES).unwrap();
        assert_eq!(inv.arg.as_deref(), Some("rust async traits"));
    }

    #[test]
    fn escaped_colons_unescape() {
        let inv = find_invocation(r"settings:model:ollama\:llama3\:latest:", NAMES).unwrap();
        assert_eq!(inv.arg.as_deref(), Some("model:ollama:llama3:latest"));
    }

    #[test]
    fn terminator_requires_whitespace_or_end() {
        let inv = find_invocation("Summarize the following: get:https://example/: now", NAMES)
            .unwrap();
        assert_eq!(inv.name, "get");
        assert_eq!(inv.arg.as_deref(), Some("https://example/"));
        let (start, end) = inv.span;
        assert_eq!(&"Summarize the following: get:https://example/: now"[start..end],
            "get:https://example/:");
    }

    #[test]
    fn name_embedded_in_identifier_does_not_match() {
        assert_eq!(find_invocation("forget:: it", NAMES), None);
        let inv = find_invocation("memget:key:", NAMES).unwrap();
        assert_eq!(inv.name, "memget");
    }

    #[test]
    fn leftmost_token_wins() {
        let inv = find_invocation("weather:33004: and help::", NAMES).unwrap();
        assert_eq!(inv.name, "weather");
    }

    #[test]
    fn empty_argument_is_not_a_token() {
        assert_eq!(find_invocation("get::", NAMES).map(|i| i.arg), Some(None));
        assert_eq!(find_invocation("get: :", NAMES), None);
    }

    #[test]
    fn shell_exec_name_parses() {
        let inv = find_invocation("$:ls -la:", NAMES).unwrap();
        assert_eq!(inv.name, "$");
        assert_eq!(inv.arg.as_deref(), Some("ls -la"));
    }

    #[test]
    fn splice_replaces_span() {
        let input = "Summarize: get:https://example/:";
        let inv = find_invocation(input, NAMES).unwrap();
        let spliced = splice(input, inv.span, "FETCHED");
        assert_eq!(spliced, "Summarize: FETCHED");
    }

    #[test]
    fn audio_triggers_rewrite_to_command_form() {
        assert_eq!(apply_audio_triggers("keyword get help"), "help::");
        assert_eq!(apply_audio_triggers("Keyword Get Weather 33004"), "weather:33004:");
        assert_eq!(apply_audio_triggers("keyword google rust lang"), "google:rust lang:");
    }
}
