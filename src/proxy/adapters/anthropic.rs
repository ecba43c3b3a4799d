//! Anthropic Messages API adapter (`/v1/messages`).

use super::{body_wants_stream, force_non_streaming, Adapter};
use crate::error::{GatewayError, Result};
use crate::proxy::instructions::ANTI_HALLUCINATION_INSTRUCTION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

pub struct AnthropicAdapter;

impl Adapter for AnthropicAdapter {
    fn backend_name(&self) -> &'static str {
        "anthropic"
    }

    fn upstream_path(&self) -> String {
        "/v1/messages".to_string()
    }

    fn client_wants_stream(&self, body: &Value) -> bool {
        body_wants_stream(body)
    }

    fn prepare_outbound(&self, body: &mut Value, needs_restoration: bool) {
        if needs_restoration && body_wants_stream(body) {
            force_non_streaming(body);
        }
        if needs_restoration {
            inject_system_instruction(body);
        }
    }

    fn auth_headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|_| {
                GatewayError::Internal("backend api key is not a valid header value".to_string())
            })?,
        );
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static("2023-06-01"),
        );
        Ok(headers)
    }

    fn encode_as_sse(&self, restored_body: &Value) -> String {
        super::super::sse::encode_anthropic_message_as_sse(restored_body)
    }
}

/// Anthropic's `system` field accepts either a plain string or an array of
/// content blocks; append the instruction in whichever shape is present,
/// creating the field if the request had none.
fn inject_system_instruction(body: &mut Value) {
    let Value::Object(map) = body else { return };
    match map.get_mut("system") {
        Some(Value::String(existing)) => {
            existing.push_str("\n\n");
            existing.push_str(ANTI_HALLUCINATION_INSTRUCTION);
        }
        Some(Value::Array(blocks)) => {
            blocks.push(json!({"type": "text", "text": ANTI_HALLUCINATION_INSTRUCTION}));
        }
        _ => {
            map.insert("system".to_string(), Value::String(ANTI_HALLUCINATION_INSTRUCTION.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_existing_string_system_prompt() {
        let mut body = json!({"system": "Be helpful."});
        inject_system_instruction(&mut body);
        let system = body["system"].as_str().unwrap();
        assert!(system.starts_with("Be helpful."));
        assert!(system.contains(ANTI_HALLUCINATION_INSTRUCTION));
    }

    #[test]
    fn appends_block_to_array_system_prompt() {
        let mut body = json!({"system": [{"type": "text", "text": "Be helpful."}]});
        inject_system_instruction(&mut body);
        assert_eq!(body["system"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn creates_system_field_when_absent() {
        let mut body = json!({"messages": []});
        inject_system_instruction(&mut body);
        assert_eq!(body["system"], ANTI_HALLUCINATION_INSTRUCTION);
    }

    #[test]
    fn forces_non_streaming_when_restoration_needed() {
        let adapter = AnthropicAdapter;
        let mut body = json!({"stream": true, "messages": []});
        adapter.prepare_outbound(&mut body, true);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn leaves_stream_untouched_when_no_restoration_needed() {
        let adapter = AnthropicAdapter;
        let mut body = json!({"stream": true, "messages": []});
        adapter.prepare_outbound(&mut body, false);
        assert_eq!(body["stream"], true);
        assert!(body.get("system").is_none());
    }
}
