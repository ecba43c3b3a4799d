//! AuthShield: masks auth-lookup flag values in shell commands before
//! detection runs, and restores them afterward. These flags select a
//! local credential; the value is never transmitted outward, and
//! redacting it as if it were PII would break the tool invocation.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Default auth-lookup flags. Tied to one third-party CLI in the source
/// this behavior was lifted from; kept configurable here since the
/// algorithm itself is general.
pub const DEFAULT_SHIELDED_FLAGS: &[&str] = &["account", "client"];

fn flag_regex(flags: &[&str]) -> Regex {
    let alternation = flags.iter().map(|f| regex::escape(f)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(
        r#"--(?:{alternation})(?:=|\s+)(?:"([^"]*)"|'([^']*)'|(\S+))"#
    ))
    .unwrap()
}

static DEFAULT_FLAG_RE: LazyLock<Regex> = LazyLock::new(|| flag_regex(DEFAULT_SHIELDED_FLAGS));

/// Result of shielding a command: the command with flag values replaced by
/// inert markers, and the map needed to swap them back.
pub struct ShieldResult {
    pub masked_command: String,
    pub restore_map: HashMap<String, String>,
}

/// Shield occurrences of `--account`/`--client` (or a custom flag list)
/// in `command`, matching `--flag=value`, `--flag value`, and the double-
/// and single-quoted forms.
pub fn shield(command: &str) -> ShieldResult {
    shield_with_flags(command, &DEFAULT_FLAG_RE)
}

/// Same as `shield`, but against a caller-supplied flag set rather than
/// the default `--account`/`--client` pair.
pub fn shield_with_custom_flags(command: &str, flags: &[&str]) -> ShieldResult {
    let re = flag_regex(flags);
    shield_with_flags(command, &re)
}

fn shield_with_flags(command: &str, re: &Regex) -> ShieldResult {
    let mut restore_map = HashMap::new();
    let mut counter = 0u32;

    let masked = re
        .replace_all(command, |caps: &regex::Captures| {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            counter += 1;
            let marker = format!("__MOLTGUARD_AUTH_{counter}__");
            restore_map.insert(marker.clone(), value.to_string());

            let whole = caps.get(0).unwrap().as_str();
            whole.replacen(value, &marker, 1)
        })
        .to_string();

    ShieldResult { masked_command: masked, restore_map }
}

/// Swap shielded markers back to their original values after the
/// sanitizer has run over the masked command.
pub fn unshield(text: &str, restore_map: &HashMap<String, String>) -> String {
    let mut result = text.to_string();
    for (marker, original) in restore_map {
        result = result.replace(marker, original);
    }
    result
}
