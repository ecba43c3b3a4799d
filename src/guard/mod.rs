//! Guard layer around outbound tool invocations: `ToolCallGuard` classifies
//! which calls need the sanitize/restore cycle, `AuthShield` exempts local
//! credential-lookup flags from it, and this module wires both to the
//! `Sanitizer`/`Restorer` pair for the host-embedding API described in
//! (`Host → ToolCallGuard → AuthShield → Sanitizer → Tool
//! process; Tool result → Restorer → Host`).

pub mod auth_shield;
pub mod canary;
pub mod tool_call_guard;

pub use tool_call_guard::{requires_sanitization, ToolCall};

use crate::pii::Category;
use crate::restorer::Restorer;
use crate::sanitizer::Sanitizer;
use crate::vault::TokenVault;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of guarding one outbound tool invocation: the command to
/// actually execute (sanitized, with shielded flag values restored) and
/// the redaction counters from this call, for audit/logging.
pub struct GuardedCommand {
    pub command: String,
    pub redactions_by_category: HashMap<Category, u32>,
}

/// Run the full guard pipeline over one `Bash`/`WebSearch`/`WebFetch`
/// invocation. Returns `None` when the call doesn't need sanitization at
/// all (`ToolCallGuard::requires_sanitization` is false) — the host should
/// execute the original command unchanged in that case.
pub fn guard_tool_command(
    sanitizer: &Sanitizer,
    vault: &TokenVault,
    session_id: Uuid,
    call: &ToolCall,
) -> Option<GuardedCommand> {
    if !requires_sanitization(call) {
        return None;
    }
    let Some(command) = call.command else {
        // WebSearch/WebFetch calls carry their sensitive content in other
        // parameters the host passes as plain text, not a `command`
        // field; sanitize the tool name's own argument text is the host's
        // responsibility to hand over as a string. Nothing to shield here.
        return None;
    };

    let shielded = auth_shield::shield(command);
    let value = Value::String(shielded.masked_command);
    let result = sanitizer.sanitize(&value, vault, session_id);
    let sanitized_command = result.sanitized_value.as_str().unwrap_or_default();
    let unshielded = auth_shield::unshield(sanitized_command, &shielded.restore_map);

    Some(GuardedCommand {
        command: unshielded,
        redactions_by_category: result.redactions_by_category,
    })
}

/// Restore placeholders in a tool result before handing it back to the
/// host. Handles the several content shapes a tool result message may
/// take: a plain string, an array of `{type: "text", text}` blocks, or an
/// array of `{type: "tool_result", content}` blocks (which may themselves
/// nest either of the above).
pub fn restore_tool_result(value: &Value, vault: &TokenVault, session_id: Uuid) -> Value {
    let mapping = vault.mapping_snapshot(session_id);
    if mapping.is_empty() {
        return value.clone();
    }
    Restorer::restore(value, &mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii::detector::EntityDetector;
    use crate::pii::person::RuleBasedPersonRecognizer;
    use crate::vault::DEFAULT_MAX_ENTRIES;
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
    fn guards_and_restores_auth_shielded_curl_command() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let call = ToolCall {
            name: "Bash",
            command: Some(
                r#"gog gmail send --to recipient@example.com --account owner@corp.com --body "SSN 123-45-6789""#,
            ),
        };

        let guarded = guard_tool_command(&sanitizer, &vault, session, &call).unwrap();
        assert!(guarded.command.contains("owner@corp.com"));
        assert!(!guarded.command.contains("recipient@example.com"));
        assert!(!guarded.command.contains("123-45-6789"));

        let result = json!({"type": "tool_result", "content": guarded.command});
        let restored = restore_tool_result(&result, &vault, session);
        let restored_text = restored["content"].as_str().unwrap();
        assert!(restored_text.contains("recipient@example.com"));
        assert!(restored_text.contains("123-45-6789"));
    }

    #[test]
    fn non_network_command_is_not_guarded() {
        let sanitizer = sanitizer();
        let (vault, _dir) = vault();
        let session = vault.create_session();
        let call = ToolCall { name: "Bash", command: Some("ls -la /tmp") };
        assert!(guard_tool_command(&sanitizer, &vault, session, &call).is_none());
    }
}
