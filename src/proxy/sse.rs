//! Re-encoding a buffered, fully-restored upstream response as Server-Sent
//! Events, for the one response mode where the client asked to stream but
//! the gateway had to force a non-streaming upstream call to restore
//! placeholders safely (the `sanitized && client wants stream`
//! row). Every field the upstream returned is carried through unchanged;
//! only the event framing changes shape.

use serde_json::{json, Value};

fn sse_event(event: &str, data: &Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

/// Re-encode one OpenAI-shaped `chat.completion` object as the
/// `chat.completion.chunk` stream its streaming endpoint would have
/// produced: a single delta chunk per choice, terminated by `[DONE]`.
pub fn encode_openai_completion_as_sse(body: &Value) -> String {
    let mut chunk = body.clone();
    let choices = body.get("choices").and_then(Value::as_array).cloned().unwrap_or_default();

    let new_choices: Vec<Value> = choices
        .into_iter()
        .map(|choice| {
            let index = choice.get("index").cloned().unwrap_or(json!(0));
            let finish_reason = choice.get("finish_reason").cloned().unwrap_or(Value::Null);
            let mut delta = choice.get("message").cloned().unwrap_or_else(|| json!({}));
            if let Value::Object(delta_map) = &mut delta {
                if let Some(Value::Array(tool_calls)) = delta_map.get_mut("tool_calls") {
                    for (i, tool_call) in tool_calls.iter_mut().enumerate() {
                        if let Value::Object(tool_call_map) = tool_call {
                            tool_call_map.insert("index".to_string(), json!(i));
                        }
                    }
                }
            }
            json!({"index": index, "delta": delta, "finish_reason": finish_reason})
        })
        .collect();

    if let Value::Object(map) = &mut chunk {
        map.insert("object".to_string(), json!("chat.completion.chunk"));
        map.insert("choices".to_string(), Value::Array(new_choices));
    }

    format!("data: {chunk}\n\ndata: [DONE]\n\n")
}

/// Re-encode one Anthropic Messages `message` object as its event
/// sequence: `message_start`, one `content_block_start`/`_delta`/`_stop`
/// triple per content block, `message_delta`, `message_stop`.
pub fn encode_anthropic_message_as_sse(body: &Value) -> String {
    let mut out = String::new();

    let mut message_start = body.clone();
    if let Value::Object(map) = &mut message_start {
        map.insert("content".to_string(), json!([]));
        map.remove("stop_reason");
        map.remove("stop_sequence");
    }
    out.push_str(&sse_event(
        "message_start",
        &json!({"type": "message_start", "message": message_start}),
    ));

    let content = body.get("content").and_then(Value::as_array).cloned().unwrap_or_default();
    for (index, block) in content.iter().enumerate() {
        let block_type = block.get("type").and_then(Value::as_str).unwrap_or("text");

        let start_block = match block_type {
            "tool_use" => json!({
                "type": "tool_use",
                "id": block.get("id").cloned().unwrap_or(Value::Null),
                "name": block.get("name").cloned().unwrap_or(Value::Null),
                "input": {},
            }),
            _ => json!({"type": "text", "text": ""}),
        };
        out.push_str(&sse_event(
            "content_block_start",
            &json!({"type": "content_block_start", "index": index, "content_block": start_block}),
        ));

        match block_type {
            "tool_use" => {
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                out.push_str(&sse_event(
                    "content_block_delta",
                    &json!({
                        "type": "content_block_delta",
                        "index": index,
                        "delta": {"type": "input_json_delta", "partial_json": input.to_string()},
                    }),
                ));
            }
            _ => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    out.push_str(&sse_event(
                        "content_block_delta",
                        &json!({
                            "type": "content_block_delta",
                            "index": index,
                            "delta": {"type": "text_delta", "text": text},
                        }),
                    ));
                }
            }
        }

        out.push_str(&sse_event(
            "content_block_stop",
            &json!({"type": "content_block_stop", "index": index}),
        ));
    }

    out.push_str(&sse_event(
        "message_delta",
        &json!({
            "type": "message_delta",
            "delta": {
                "stop_reason": body.get("stop_reason").cloned().unwrap_or(Value::Null),
                "stop_sequence": body.get("stop_sequence").cloned().unwrap_or(Value::Null),
            },
            "usage": body.get("usage").cloned().unwrap_or_else(|| json!({})),
        }),
    ));
    out.push_str(&sse_event("message_stop", &json!({"type": "message_stop"})));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_encoding_ends_with_done_sentinel() {
        let body = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
        });
        let encoded = encode_openai_completion_as_sse(&body);
        assert!(encoded.ends_with("data: [DONE]\n\n"));
        assert!(encoded.contains("chat.completion.chunk"));
        assert!(encoded.contains("\"delta\""));
        assert!(encoded.contains("hi"));
    }

    #[test]
    fn openai_tool_calls_get_an_index() {
        let body = json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "tool_calls": [{"id": "call_1", "type": "function", "function": {"name": "f", "arguments": "{}"}}]},
                "finish_reason": "tool_calls",
            }],
        });
        let encoded = encode_openai_completion_as_sse(&body);
        assert!(encoded.contains("\"index\":0"));
    }

    #[test]
    fn anthropic_encoding_preserves_text_and_ends_with_message_stop() {
        let body = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "hello there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 3},
        });
        let encoded = encode_anthropic_message_as_sse(&body);
        assert!(encoded.starts_with("event: message_start"));
        assert!(encoded.contains("hello there"));
        assert!(encoded.trim_end().ends_with("data: {\"type\":\"message_stop\"}"));
    }

    #[test]
    fn anthropic_encoding_handles_tool_use_blocks() {
        let body = json!({
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}}],
            "stop_reason": "tool_use",
        });
        let encoded = encode_anthropic_message_as_sse(&body);
        assert!(encoded.contains("input_json_delta"));
        assert!(encoded.contains("toolu_1"));
    }
}
