//! ToolCallGuard: classifies outgoing tool invocations that reach a
//! network boundary, so the same sanitize/restore cycle applied to LLM
//! traffic is applied to them too.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Command words that indicate a `Bash` invocation talks to the network.
static NETWORK_COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(curl|gog|wget|http|httpie|ssh|scp|sftp|rsync)\b").unwrap());

/// Tool names that always imply outbound network traffic regardless of
/// their arguments, matched case-insensitively with `_`/`-` treated alike.
static NETWORK_TOOL_NAMES: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from(["websearch", "webfetch"]));

fn normalize_tool_name(name: &str) -> String {
    name.to_lowercase().replace(['_', '-'], "")
}

/// One tool invocation as seen by the host, before it reaches the guard.
pub struct ToolCall<'a> {
    pub name: &'a str,
    pub command: Option<&'a str>,
}

/// Whether `call` needs to flow through the sanitize/restore cycle before
/// being allowed to execute.
pub fn requires_sanitization(call: &ToolCall) -> bool {
    if NETWORK_TOOL_NAMES.contains(normalize_tool_name(call.name).as_str()) {
        return true;
    }
    if call.name.eq_ignore_ascii_case("bash") {
        if let Some(command) = call.command {
            return NETWORK_COMMAND_RE.is_match(command);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_curl_command() {
        let call = ToolCall { name: "Bash", command: Some("curl https://api.example.com/data") };
        assert!(requires_sanitization(&call));
    }

    #[test]
    fn flags_wget_and_ssh_too() {
        for cmd in ["wget http://x", "ssh user@host", "scp file host:/", "rsync -av a b"] {
            let call = ToolCall { name: "Bash", command: Some(cmd) };
            assert!(requires_sanitization(&call), "expected {cmd} to require sanitization");
        }
    }

    #[test]
    fn ignores_non_network_bash_command() {
        let call = ToolCall { name: "Bash", command: Some("ls -la /tmp") };
        assert!(!requires_sanitization(&call));
    }

    #[test]
    fn flags_websearch_tool_regardless_of_casing() {
        let call = ToolCall { name: "WebSearch", command: None };
        assert!(requires_sanitization(&call));
        let call = ToolCall { name: "web_fetch", command: None };
        assert!(requires_sanitization(&call));
    }

    #[test]
    fn ignores_unrelated_tool() {
        let call = ToolCall { name: "Read", command: None };
        assert!(!requires_sanitization(&call));
    }
}
