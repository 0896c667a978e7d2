//! Name rewriting helpers used when splicing a connected body into its host.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Replaces every occurrence of original names with their resolved names in
/// free-form text such as mimic equations.
///
/// Scans left to right in a single pass. When several names match at the same
/// position the longest one wins; replaced text is never rescanned.
#[derive(Debug)]
pub struct NameSubstitution {
    pattern: Regex,
    replacements: HashMap<String, String>,
}

impl NameSubstitution {
    /// Builds a substitution from `(original, resolved)` pairs. Returns `None`
    /// when there is nothing to substitute.
    pub fn new<'a, I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut replacements = HashMap::new();
        for (from, to) in pairs {
            if !from.is_empty() {
                replacements
                    .entry(from.to_string())
                    .or_insert_with(|| to.to_string());
            }
        }
        if replacements.is_empty() {
            return None;
        }

        let mut names: Vec<&str> = replacements.keys().map(String::as_str).collect();
        // leftmost-first alternation: longest names must come first
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&alternation).ok()?;
        Some(Self {
            pattern,
            replacements,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let found = &caps[0];
                self.replacements
                    .get(found)
                    .cloned()
                    .unwrap_or_else(|| found.to_string())
            })
            .into_owned()
    }
}

/// Whether `key` ends with any of `suffixes`, ignoring ASCII case.
pub fn field_matches(key: &str, suffixes: &[String]) -> bool {
    let key = key.to_ascii_lowercase();
    suffixes
        .iter()
        .any(|suffix| key.ends_with(&suffix.to_ascii_lowercase()))
}

/// Walks a schema-less document and prefixes every string stored under a key
/// matching one of `suffixes`. Arrays inherit the match state of their key, so
/// `{"fingerLinkNames": ["a", "b"]}` rewrites both entries. Numbers, booleans
/// and nulls are left alone.
pub fn prefix_reference_fields(value: &mut Value, prefix: &str, suffixes: &[String]) {
    prefix_matching(value, prefix, suffixes, false);
}

fn prefix_matching(value: &mut Value, prefix: &str, suffixes: &[String], matching: bool) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_matching = field_matches(key, suffixes);
                prefix_matching(child, prefix, suffixes, child_matching);
            }
        }
        Value::Array(items) => {
            for item in items {
                prefix_matching(item, prefix, suffixes, matching);
            }
        }
        Value::String(s) if matching => {
            s.insert_str(0, prefix);
        }
        _ => {}
    }
}
