//! Restorer: reverses placeholders in strings / JSON / SSE chunks using a
//! session's mapping table. Three passes per string leaf: canonical
//! bracketed, bracket-stripped bare form, and a fabricated-placeholder
//! pass-through that never invents replacement text.

use crate::pii::Category;
use crate::vault::MappingTable;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub struct Restorer;

impl Restorer {
    /// Recursively restore every string leaf of `value` using `mapping`.
    pub fn restore(value: &Value, mapping: &MappingTable) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, val) in map {
                    out.insert(key.clone(), Self::restore(val, mapping));
                }
                Value::Object(out)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(|v| Self::restore(v, mapping)).collect()),
            Value::String(s) => Value::String(Self::restore_string(s, mapping)),
            other => other.clone(),
        }
    }

    /// Restore all three passes against a single string.
    pub fn restore_string(text: &str, mapping: &MappingTable) -> String {
        let mut working = canonical_pass(text, mapping);
        working = bracket_stripped_pass(&working, mapping);
        warn_on_fabricated_placeholders(&working, mapping);
        working
    }

    /// Strip the `data: ` SSE prefix, preserve the `[DONE]` sentinel,
    /// parse the remainder as JSON when possible and restore recursively,
    /// else fall back to plain string restoration, then re-emit the line.
    pub fn restore_sse_line(line: &str, mapping: &MappingTable) -> String {
        let Some(payload) = line.strip_prefix("data: ") else {
            return line.to_string();
        };
        let payload = payload.trim_end_matches(['\n', '\r']);

        if payload == "[DONE]" {
            return "data: [DONE]\n".to_string();
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                let restored = Self::restore(&value, mapping);
                format!("data: {}\n", restored)
            }
            Err(_) => format!("data: {}\n", Self::restore_string(payload, mapping)),
        }
    }
}

/// Canonical pass: replace every literal `[cat_n]` occurrence, longest
/// bracketed form first. The trailing `]` in every bracketed form already
/// prevents `[person_1]` from matching inside `[person_10]`, but entries
/// are still applied longest-first per the design.
fn canonical_pass(text: &str, mapping: &MappingTable) -> String {
    let mut entries: Vec<(String, &String)> = mapping
        .iter()
        .map(|(placeholder, original)| (placeholder.to_string(), original))
        .collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut working = text.to_string();
    for (bracketed, original) in entries {
        if working.contains(bracketed.as_str()) {
            working = working.replace(bracketed.as_str(), original);
        }
    }
    working
}

/// Bracket-stripped pass: also matches the bare `cat_n` token as a
/// word (bounded by non-word characters), tolerating upstream models that
/// drop square brackets as markdown.
fn bracket_stripped_pass(text: &str, mapping: &MappingTable) -> String {
    let mut entries: Vec<(String, &String)> = mapping
        .iter()
        .map(|(placeholder, original)| (placeholder.bare(), original))
        .collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut working = text.to_string();
    for (bare, original) in entries {
        let pattern = format!(r"\b{}\b", regex::escape(&bare));
        if let Ok(re) = Regex::new(&pattern) {
            if re.is_match(&working) {
                working = re.replace_all(&working, regex::NoExpand(original)).to_string();
            }
        }
    }
    working
}

static FABRICATED_PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    Regex::new(&format!(r"\[?(?:{})_\d+\]?", categories.join("|"))).unwrap()
});

/// Fabricated-placeholder pass: anything placeholder-shaped still present
/// after the first two passes has no mapping entry by construction. Pass
/// it through unchanged — producing confident-sounding but wrong output is
/// strictly worse than showing the raw placeholder — and emit a
/// structured warning so the operator can see it happened.
fn warn_on_fabricated_placeholders(text: &str, mapping: &MappingTable) {
    for m in FABRICATED_PLACEHOLDER_RE.find_iter(text) {
        if mapping.iter().any(|(p, _)| p.to_string() == m.as_str() || p.bare() == m.as_str()) {
            tracing::warn!(token = %m.as_str(), "placeholder survived restoration passes despite a mapping entry");
            continue;
        }
        tracing::warn!(token = %m.as_str(), "fabricated placeholder with no mapping entry passed through unchanged");
    }
}
