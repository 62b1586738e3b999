//! Session-scoped structured memory.
//!
//! Commands park their results here under user-visible keys
//! (`weather_command`, `get_command`, …) so later commands can query them.
//! Rewriting a key preserves the prior value by re-keying it to `key[n]`;
//! search treats the whole `key[*]` family as one record.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::utils::text::snippet_around;

const SNIPPET_WIDTH: usize = 200;

#[derive(Default)]
pub struct MemoryStore {
    // Insertion-ordered; keys() and search results follow this order.
    entries: Vec<(String, Value)>,
}

/// One search result. Sibling `key[*]` entries merge into a single hit
/// with their snippets concatenated.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub parent_key: String,
    pub kind: &'static str,
    pub snippets: Vec<String>,
}

enum Matcher {
    Literal(String),
    Pattern(Regex),
}

impl Matcher {
    fn compile(needle: &str) -> Result<Matcher, String> {
        if let Some(pattern) = needle
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            if pattern.is_empty() {
                return Err("empty pattern".to_string());
            }
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| format!("bad pattern: {e}"))?;
            Ok(Matcher::Pattern(regex))
        } else {
            Ok(Matcher::Literal(needle.to_lowercase()))
        }
    }

    /// Byte range of the first match in `text`, if any.
    fn find(&self, text: &str) -> Option<(usize, usize)> {
        match self {
            Matcher::Literal(needle) => {
                let lowered = text.to_lowercase();
                lowered.find(needle).map(|start| {
                    // Map back into the original string; lowercasing can
                    // shift byte offsets for non-ASCII text, so clamp.
                    let start = start.min(text.len());
                    let end = (start + needle.len()).min(text.len());
                    (start, end)
                })
            }
            Matcher::Pattern(regex) => regex.find(text).map(|m| (m.start(), m.end())),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strip a `[n]` suffix so `key[0]` and `key` group together.
fn family_key(key: &str) -> &str {
    if let Some(open) = key.rfind('[') {
        if key.ends_with(']') && key[open + 1..key.len() - 1].chars().all(|c| c.is_ascii_digit()) {
            return &key[..open];
        }
    }
    key
}

fn collect_matches(value: &Value, matcher: &Matcher, snippets: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            if let Some((start, end)) = matcher.find(text) {
                snippets.push(snippet_around(text, start, end, SNIPPET_WIDTH));
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_matches(item, matcher, snippets);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_matches(item, matcher, snippets);
            }
        }
        // Non-string leaves are stringified before matching
        other => {
            let text = other.to_string();
            if let Some((start, end)) = matcher.find(&text) {
                snippets.push(snippet_around(&text, start, end, SNIPPET_WIDTH));
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Write `value` at `key`. An existing entry is first renamed to
    /// `key[i]` with the smallest unused index.
    pub fn create(&mut self, key: &str, value: Value) {
        if let Some(pos) = self.position(key) {
            let mut i = 0usize;
            loop {
                let candidate = format!("{key}[{i}]");
                if self.position(&candidate).is_none() {
                    self.entries[pos].0 = candidate;
                    break;
                }
                i += 1;
            }
        }
        self.entries.push((key.to_string(), value));
    }

    pub fn read(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|pos| &self.entries[pos].1)
    }

    pub fn delete(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Everything in the store as one JSON object, for `inspect` and the
    /// export command.
    pub fn export(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Search every stored value recursively. `needle` is a literal
    /// substring (case-insensitive) or a `/pattern/`. Results keep store
    /// order; `key[*]` families merge into one hit.
    pub fn search(&self, needle: &str) -> Result<Vec<SearchHit>, String> {
        let matcher = Matcher::compile(needle)?;
        let mut hits: Vec<SearchHit> = Vec::new();

        for (key, value) in &self.entries {
            let mut snippets = Vec::new();
            collect_matches(value, &matcher, &mut snippets);
            if snippets.is_empty() {
                continue;
            }
            let family = family_key(key).to_string();
            if let Some(existing) = hits.iter_mut().find(|hit| hit.key == family) {
                existing.snippets.extend(snippets);
            } else {
                hits.push(SearchHit {
                    key: family.clone(),
                    parent_key: family,
                    kind: value_kind(value),
                    snippets,
                });
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_returns_last_write() {
        let mut store = MemoryStore::new();
        store.create("k", json!("v1"));
        assert_eq!(store.read("k"), Some(&json!("v1")));
        assert_eq!(store.read("missing"), None);
    }

    #[test]
    fn rewrite_preserves_prior_value_under_indexed_key() {
        let mut store = MemoryStore::new();
        store.create("k", json!("v1"));
        store.create("k", json!("v2"));
        assert_eq!(store.read("k"), Some(&json!("v2")));
        assert_eq!(store.read("k[0]"), Some(&json!("v1")));

        store.create("k", json!("v3"));
        assert_eq!(store.read("k"), Some(&json!("v3")));
        assert_eq!(store.read("k[1]"), Some(&json!("v2")));
        assert_eq!(store.read("k[0]"), Some(&json!("v1")));
    }

    #[test]
    fn delete_and_keys_track_entries() {
        let mut store = MemoryStore::new();
        store.create("a", json!(1));
        store.create("b", json!(2));
        assert_eq!(store.keys(), vec!["a", "b"]);
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.keys(), vec!["b"]);
    }

    #[test]
    fn search_traverses_nested_values() {
        let mut store = MemoryStore::new();
        store.create(
            "get_command",
            json!({
                "url": "https://example/",
                "content": {"body": ["no match", "an ERROR occurred here"]}
            }),
        );
        store.create("other", json!({"n": 42}));

        let hits = store.search("error").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "get_command");
        assert_eq!(hits[0].kind, "object");
        assert!(hits[0].snippets[0].contains("ERROR occurred"));
    }

    #[test]
    fn search_pattern_is_case_insensitive() {
        let mut store = MemoryStore::new();
        store.create("doc", json!("Download FAILED at step 3"));

        let lower = store.search("/failed/").unwrap();
        let upper = store.search("/FAILED/").unwrap();
        assert_eq!(
            lower.iter().map(|h| &h.key).collect::<Vec<_>>(),
            upper.iter().map(|h| &h.key).collect::<Vec<_>>()
        );
        assert!(!lower.is_empty());
    }

    #[test]
    fn search_rejects_bad_patterns() {
        let store = MemoryStore::new();
        assert!(store.search("/(/").is_err());
        assert!(store.search("//").is_err());
    }

    #[test]
    fn search_merges_key_families() {
        let mut store = MemoryStore::new();
        store.create("w", json!("first error"));
        store.create("w", json!("second error"));

        let hits = store.search("error").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "w");
        assert_eq!(hits[0].snippets.len(), 2);
    }

    #[test]
    fn non_string_leaves_are_stringified() {
        let mut store = MemoryStore::new();
        store.create("n", json!({"value": 33004}));
        let hits = store.search("33004").unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn search_does_not_mutate_store() {
        let mut store = MemoryStore::new();
        store.create("k", json!("error text"));
        let before = store.export();
        let _ = store.search("error").unwrap();
        assert_eq!(store.export(), before);
    }
}
