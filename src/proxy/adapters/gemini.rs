//! Gemini `generateContent` adapter
//! (`/v1/models/{model}:generateContent`). The route carries no streaming
//! variant, so `client_wants_stream` is always `false` here; the
//! streaming-downgrade machinery never actually engages for this adapter,
//! but `encode_as_sse` is still implemented for interface completeness.

use super::Adapter;
use crate::error::{GatewayError, Result};
use crate::proxy::instructions::ANTI_HALLUCINATION_INSTRUCTION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};

pub struct GeminiAdapter {
    pub model: String,
}

impl GeminiAdapter {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Adapter for GeminiAdapter {
    fn backend_name(&self) -> &'static str {
        "gemini"
    }

    fn upstream_path(&self) -> String {
        format!("/v1/models/{}:generateContent", self.model)
    }

    fn client_wants_stream(&self, _body: &Value) -> bool {
        false
    }

    fn prepare_outbound(&self, body: &mut Value, needs_restoration: bool) {
        if needs_restoration {
            inject_system_instruction(body);
        }
    }

    fn auth_headers(&self, api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-goog-api-key"),
            HeaderValue::from_str(api_key).map_err(|_| {
                GatewayError::Internal("backend api key is not a valid header value".to_string())
            })?,
        );
        Ok(headers)
    }

    fn encode_as_sse(&self, restored_body: &Value) -> String {
        format!("data: {}\n\n", restored_body)
    }
}

/// Gemini carries its system prompt as a top-level `systemInstruction`
/// object (`{parts: [{text}]}`), distinct from the `contents` array.
fn inject_system_instruction(body: &mut Value) {
    let Value::Object(map) = body else { return };
    match map.get_mut("systemInstruction") {
        Some(Value::Object(existing)) => {
            let parts = existing.entry("parts").or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(parts) = parts {
                parts.push(json!({"text": ANTI_HALLUCINATION_INSTRUCTION}));
            }
        }
        _ => {
            map.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": ANTI_HALLUCINATION_INSTRUCTION}]}),
            );
        }
    }
}
