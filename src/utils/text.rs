//! Plain-text extraction helpers used by the fetch and code handlers.

use regex::Regex;
use std::sync::OnceLock;

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>").unwrap()
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap())
}

/// Reduce an HTML document to readable text: scripts and styles removed,
/// tags dropped, entities decoded, runs of blank lines collapsed.
pub fn strip_html(html: &str) -> String {
    let without_scripts = script_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_scripts, " ");
    let decoded = decode_entities(&without_tags);

    let mut out = String::with_capacity(decoded.len());
    let mut blank_run = 0usize;
    for line in decoded.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        out.push_str(&collapsed);
        out.push('\n');
    }
    out.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}

/// Pull fenced code blocks out of markdown text, preserving order. Returns
/// `(language, body)` pairs; the language tag may be empty.
pub fn extract_code_blocks(markdown: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut lang = String::new();
    let mut body = String::new();
    let mut in_block = false;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("```") {
            if in_block {
                blocks.push((lang.clone(), body.trim_end().to_string()));
                body.clear();
                in_block = false;
            } else {
                lang = rest.trim().to_string();
                in_block = true;
            }
            continue;
        }
        if in_block {
            body.push_str(line);
            body.push('\n');
        }
    }
    // Unterminated fence: keep what was collected
    if in_block && !body.trim().is_empty() {
        blocks.push((lang, body.trim_end().to_string()));
    }
    blocks
}

/// Extract ~`width` characters of context around the byte range
/// `start..end`, clamped to char boundaries.
pub fn snippet_around(text: &str, start: usize, end: usize, width: usize) -> String {
    let half = width / 2;
    let mut lo = start.saturating_sub(half);
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + half).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    let mut snippet = String::new();
    if lo > 0 {
        snippet.push('…');
    }
    snippet.push_str(&text[lo..hi]);
    if hi < text.len() {
        snippet.push('…');
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_drops_tags_and_scripts() {
        let html = "<html><head><script>var x = 1;</script></head>\
                    <body><h1>Title</h1><p>Hello &amp; goodbye</p></body></html>";
        let text = strip_html(html);
        assert!(text.contains("Title"));
        assert!(text.contains("Hello & goodbye"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn code_blocks_keep_language_and_order() {
        let md = "intro\n```rust\nfn main() {}\n```\ntext\n```\nplain\n```\n";
        let blocks = extract_code_blocks(md);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0, "rust");
        assert_eq!(blocks[0].1, "fn main() {}");
        assert_eq!(blocks[1].0, "");
        assert_eq!(blocks[1].1, "plain");
    }

    #[test]
    fn snippets_respect_char_boundaries() {
        let text = "aaaa éééé bbbb".repeat(20);
        let snippet = snippet_around(&text, 40, 44, 20);
        assert!(!snippet.is_empty());
    }
}
