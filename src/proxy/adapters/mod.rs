//! Per-protocol adapters for the three upstream wire formats the proxy
//! speaks: Anthropic Messages, OpenAI-compatible chat completions, and
//! Gemini `generateContent`. Each adapter owns the handful of places
//! where the pipeline must special-case the wire shape; everything else (sanitize, canary,
//! forward, restore) is shared, protocol-agnostic code in `proxy::mod`.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use crate::error::Result;
use axum::http::HeaderMap;
use serde_json::Value;

/// One upstream wire protocol's request/response shape-specific behavior.
pub trait Adapter: Send + Sync {
    /// The config key this adapter's upstream is configured under
    /// (`backends.<name>`).
    fn backend_name(&self) -> &'static str;

    /// Path appended to the backend's configured base URL.
    fn upstream_path(&self) -> String;

    /// Whether the client's inbound payload asked for a streaming
    /// response.
    fn client_wants_stream(&self, body: &Value) -> bool;

    /// Mutate the sanitized outbound payload in place: force non-streaming
    /// (and strip stream-only sibling fields) if
    /// `needs_restoration` and the client wanted streaming, apply any
    /// protocol-specific model fixup (the OpenAI reasoner-model system/
    /// developer-role merge), then inject the anti-hallucination
    /// instruction if `needs_restoration`.
    fn prepare_outbound(&self, body: &mut Value, needs_restoration: bool);

    /// Authentication headers this upstream expects.
    fn auth_headers(&self, api_key: &str) -> Result<HeaderMap>;

    /// Re-encode a fully-restored, buffered (non-streaming) upstream
    /// response as this protocol's SSE event sequence, ending with its
    /// termination marker. Used only for the streaming-downgrade-then-
    /// restore response mode (used when the client wanted streaming and
    /// the payload needed restoration).
    fn encode_as_sse(&self, restored_body: &Value) -> String;
}

/// `true` iff `body.stream` is JSON `true`. Shared by all three adapters;
/// Gemini's route never sets it (no streaming request shape), so this
/// always returns `false` there.
pub fn body_wants_stream(body: &Value) -> bool {
    body.get("stream").and_then(Value::as_bool).unwrap_or(false)
}

/// Force `body.stream = false` and drop OpenAI's `stream_options` sibling
/// field so upstreams that validate mutual exclusion between the two
/// don't reject the forced-non-streaming request.
pub fn force_non_streaming(body: &mut Value) {
    if let Value::Object(map) = body {
        map.insert("stream".to_string(), Value::Bool(false));
        map.remove("stream_options");
    }
}
