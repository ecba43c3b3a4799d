//! Sanitizer: walks arbitrary JSON-shaped values, detects entities in
//! string leaves, and allocates reversible placeholders through the vault.

use crate::pii::detector::EntityDetector;
use crate::pii::{Category, EntityMatch};
use crate::vault::{MappingTable, TokenVault};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// JSON field names whose values are protocol metadata and are never sent
/// to the detector regardless of content — protects the LLM-protocol
/// contract (a tool-call id that happens to look like an SSN must survive
/// untouched).
pub const STRUCTURAL_KEYS: &[&str] = &[
    "tool_call_id",
    "tool_use_id",
    "id",
    "model",
    "role",
    "type",
    "finish_reason",
    "name",
    "object",
    "created",
    "index",
    "system_fingerprint",
    "stream",
    "max_tokens",
    "temperature",
    "top_p",
    "top_k",
    "stop_reason",
    "stop_sequence",
    "media_type",
    "source_type",
    "prompt_tokens",
    "completion_tokens",
    "total_tokens",
    "input_tokens",
    "output_tokens",
    "refusal",
];

fn is_structural_key(key: &str) -> bool {
    STRUCTURAL_KEYS.contains(&key)
}

/// Result of one `Sanitizer::sanitize` call. `mapping_table` covers
/// exactly the placeholders present in `sanitized_value` from this call
/// (whether newly allocated or idempotently reused); `redactions_by_category`
/// is the session's live counters, which may be larger than this call's own
/// contribution if the session's state was already populated.
pub struct SanitizeResult {
    pub sanitized_value: Value,
    pub mapping_table: MappingTable,
    pub redaction_count: usize,
    pub redactions_by_category: HashMap<Category, u32>,
}

pub struct Sanitizer {
    detector: EntityDetector,
}

impl Sanitizer {
    pub fn new(detector: EntityDetector) -> Self {
        Self { detector }
    }

    /// `value` is JSON-shaped (string, number, bool, null, array, or
    /// object). Only string leaves may change; structural keys are copied
    /// verbatim regardless of their value's content.
    pub fn sanitize(&self, value: &Value, vault: &TokenVault, session_id: Uuid) -> SanitizeResult {
        let mut mapping_table = MappingTable::default();
        let sanitized_value = self.walk(value, vault, session_id, &mut mapping_table);
        let redaction_count = mapping_table.len();
        let redactions_by_category = vault.counters_snapshot(session_id);

        SanitizeResult {
            sanitized_value,
            mapping_table,
            redaction_count,
            redactions_by_category,
        }
    }

    fn walk(&self, value: &Value, vault: &TokenVault, session_id: Uuid, mapping: &mut MappingTable) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (key, val) in map {
                    if is_structural_key(key) {
                        out.insert(key.clone(), val.clone());
                    } else {
                        out.insert(key.clone(), self.walk(val, vault, session_id, mapping));
                    }
                }
                Value::Object(out)
            }
            Value::Array(arr) => Value::Array(
                arr.iter()
                    .map(|v| self.walk(v, vault, session_id, mapping))
                    .collect(),
            ),
            Value::String(s) => Value::String(self.sanitize_string(s, vault, session_id, mapping)),
            other => other.clone(),
        }
    }

    /// Deduplicate detected candidates by `original_text` (first wins),
    /// sort longest-first so e.g. `"Karen Wilson"` tokenizes before
    /// `"Karen"` would, and skip any candidate already consumed by a
    /// longer replacement — this is what keeps placeholder counters gap-free.
    fn sanitize_string(&self, text: &str, vault: &TokenVault, session_id: Uuid, mapping: &mut MappingTable) -> String {
        let matches = self.detector.detect(text);
        if matches.is_empty() {
            return text.to_string();
        }

        let mut seen = std::collections::HashSet::new();
        let mut deduped: Vec<EntityMatch> = Vec::new();
        for m in matches {
            if seen.insert(m.original_text.clone()) {
                deduped.push(m);
            }
        }
        deduped.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut working = text.to_string();
        for candidate in deduped {
            if !working.contains(candidate.original_text.as_str()) {
                // Consumed by a longer match already applied; skip
                // entirely so no counter gap appears for this category.
                continue;
            }
            let placeholder = vault.store(session_id, &candidate.original_text, candidate.category);
            working = working.replace(candidate.original_text.as_str(), &placeholder.to_string());
            mapping.set(placeholder, candidate.original_text);
        }

        working
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii::person::RuleBasedPersonRecognizer;
    use crate::vault::{TokenVault, DEFAULT_MAX_ENTRIES};
    use serde_json::json;
    use tempfile::tempdir;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(EntityDetector::new(Box::new(RuleBasedPersonRecognizer::new())))
    }

    fn vault() -> (std::sync::Arc<TokenVault>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault").join("token-vault.json");
        (TokenVault::open(path, 300, DEFAULT_MAX_ENTRIES).unwrap(), dir)
    }

    #[test]
    fn sanitizes_ssn_and_name_in_user_content() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let value = json!({
            "messages": [{"role": "user", "content": "My SSN is 123-45-6789 and I am John Smith"}]
        });
        let result = sanitizer.sanitize(&value, &vault, session);
        let content = result.sanitized_value["messages"][0]["content"].as_str().unwrap();
        assert!(!content.contains("123-45-6789"));
        assert!(!content.contains("John Smith"));
        assert_eq!(result.redaction_count, 2);
    }

    #[test]
    fn preserves_structural_keys_even_when_pii_shaped() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let value = json!({
            "messages": [{
                "role": "tool",
                "tool_call_id": "call_abc123def456xyz",
                "content": "SSN 987-65-4321"
            }]
        });
        let result = sanitizer.sanitize(&value, &vault, session);
        assert_eq!(
            result.sanitized_value["messages"][0]["tool_call_id"],
            "call_abc123def456xyz"
        );
        let content = result.sanitized_value["messages"][0]["content"].as_str().unwrap();
        assert!(!content.contains("987-65-4321"));
    }

    #[test]
    fn itin_wins_over_ssn_in_mapping() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let value = json!("ITIN: 912-34-5678");
        let result = sanitizer.sanitize(&value, &vault, session);
        let has_itin_key = result
            .mapping_table
            .iter()
            .any(|(p, _)| p.category == Category::Itin);
        assert!(has_itin_key);
    }

    #[test]
    fn longer_match_consumes_shorter_overlapping_one() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let value = json!("Karen Wilson signed the form.");
        let result = sanitizer.sanitize(&value, &vault, session);
        let sanitized = result.sanitized_value.as_str().unwrap();
        assert!(!sanitized.contains("Karen Wilson"));
        // Only one person placeholder should appear, not a second for "Karen" alone.
        let person_count = result
            .mapping_table
            .iter()
            .filter(|(p, _)| p.category == Category::Person)
            .count();
        assert_eq!(person_count, 1);
    }

    #[test]
    fn idempotent_allocation_for_repeated_value_in_same_text() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let value = json!("Email alice@example.com twice: alice@example.com again.");
        let result = sanitizer.sanitize(&value, &vault, session);
        assert_eq!(result.mapping_table.len(), 1);
        let sanitized = result.sanitized_value.as_str().unwrap();
        assert_eq!(sanitized.matches("[email_1]").count(), 2);
    }

    #[test]
    fn second_sanitize_call_on_own_output_finds_nothing_new() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let value = json!("SSN 123-45-6789");
        let first = sanitizer.sanitize(&value, &vault, session);
        let second = sanitizer.sanitize(&first.sanitized_value, &vault, session);
        assert_eq!(second.mapping_table.len(), 0);
    }
}
