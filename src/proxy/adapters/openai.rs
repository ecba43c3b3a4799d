//! OpenAI-compatible chat completions adapter
//! (`/v1/chat/completions`, `/chat/completions`). Also backs the `kimi`
//! backend, which speaks the same wire shape.

use super::{body_wants_stream, force_non_streaming, Adapter};
use crate::error::{GatewayError, Result};
use crate::proxy::instructions::ANTI_HALLUCINATION_INSTRUCTION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

pub struct OpenAiAdapter {
    pub backend_name: &'static str,
}

impl OpenAiAdapter {
    pub fn new(backend_name: &'static str) -> Self {
        Self { backend_name }
    }
}

impl Adapter for OpenAiAdapter {
    fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    fn upstream_path(&self) -> String {
        "/v1/chat/completions".to_string()
    }

    fn client_wants_stream(&self, body: &Value) -> bool {
        body_wants_stream(body)
    }

    fn prepare_outbound(&self, body: &mut Value, needs_restoration: bool) {
        if needs_restoration && body_wants_stream(body) {
            force_non_streaming(body);
        }

        let reasoner = is_reasoner_model(body);
        if reasoner {
            merge_system_into_leading_user(body);
        }
        if needs_restoration {
            inject_instruction(body, reasoner);
        }
    }

    fn auth_headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {api_key}");
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|_| {
                GatewayError::Internal("backend api key is not a valid header value".to_string())
            })?,
        );
        Ok(headers)
    }

    fn encode_as_sse(&self, restored_body: &Value) -> String {
        super::super::sse::encode_openai_completion_as_sse(restored_body)
    }
}

/// `o1`-family "reasoner" models and DeepSeek's `-r1` models reject a
/// `system`-role message outright; the model name is the only signal the
/// request body carries.
fn is_reasoner_model(body: &Value) -> bool {
    body.get("model")
        .and_then(Value::as_str)
        .map(|m| m.contains("reasoner") || m.contains("-r1"))
        .unwrap_or(false)
}

/// Remove every `system`- or `developer`-role message and prepend their
/// concatenated content (in original order) to the first remaining
/// message if it's a `user` message, or to a newly-inserted `user`
/// message otherwise, so the request carries neither role — reasoner
/// models reject both.
fn merge_system_into_leading_user(body: &mut Value) {
    let Some(messages) = body.get_mut("messages").and_then(Value::as_array_mut) else {
        return;
    };

    let is_instruction_role = |m: &Value| {
        matches!(m.get("role").and_then(Value::as_str), Some("system") | Some("developer"))
    };

    let mut prefix_parts: Vec<String> = Vec::new();
    let mut first_index = None;
    let mut i = 0;
    while i < messages.len() {
        if is_instruction_role(&messages[i]) {
            if first_index.is_none() {
                first_index = Some(i);
            }
            let removed = messages.remove(i);
            if let Some(text) = removed.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    prefix_parts.push(text.to_string());
                }
            }
        } else {
            i += 1;
        }
    }

    if prefix_parts.is_empty() {
        return;
    }
    let prefix = prefix_parts.join("\n\n");
    let insert_at = first_index.unwrap_or(0).min(messages.len());

    if let Some(next) = messages.get_mut(insert_at) {
        if next.get("role").and_then(Value::as_str) == Some("user") {
            if let Some(content) = next.get("content").and_then(Value::as_str) {
                let merged = format!("{prefix}\n\n{content}");
                next["content"] = Value::String(merged);
                return;
            }
        }
    }
    messages.insert(insert_at, json!({"role": "user", "content": prefix}));
}

/// Inject the anti-hallucination instruction. Ordinary models get it
/// appended to (or as) a `system` message; reasoner models, which never
/// carry one, get it merged into the leading user message instead.
fn inject_instruction(body: &mut Value, reasoner: bool) {
    let Some(messages) = body.get_mut("messages").and_then(Value::as_array_mut) else {
        return;
    };

    if reasoner {
        if let Some(first) = messages.first_mut() {
            if let Some(content) = first.get("content").and_then(Value::as_str) {
                let merged = format!("{ANTI_HALLUCINATION_INSTRUCTION}\n\n{content}");
                first["content"] = Value::String(merged);
                return;
            }
        }
        messages.insert(0, json!({"role": "user", "content": ANTI_HALLUCINATION_INSTRUCTION}));
        return;
    }

    if let Some(system_message) = messages.iter_mut().find(|m| m.get("role").and_then(Value::as_str) == Some("system")) {
        if let Some(content) = system_message.get("content").and_then(Value::as_str) {
            let merged = format!("{content}\n\n{ANTI_HALLUCINATION_INSTRUCTION}");
            system_message["content"] = Value::String(merged);
            return;
        }
    }
    messages.insert(0, json!({"role": "system", "content": ANTI_HALLUCINATION_INSTRUCTION}));
}
