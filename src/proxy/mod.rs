//! ProxyPipeline: the reverse-proxy HTTP server sitting between the AI
//! host and the configured upstream LLM backends. Owns the per-request
//! sanitize → forward → restore → canary cycle and exposes
//! the `/health` endpoint.

pub mod adapters;
pub mod instructions;
pub mod session;
pub mod sse;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::guard::canary;
use crate::pii::detector::EntityDetector;
use crate::pii::person::RuleBasedPersonRecognizer;
use crate::sanitizer::Sanitizer;
use crate::security::redact_config_for_response;
use crate::vault::TokenVault;
use adapters::anthropic::AnthropicAdapter;
use adapters::gemini::GeminiAdapter;
use adapters::openai::OpenAiAdapter;
use adapters::Adapter;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default cap on inbound request bodies: large enough for a sizable
/// conversation history, small enough to bound memory use from a
/// misbehaving client.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Shared state every request handler needs.
pub struct AppState {
    pub config: Config,
    pub vault: Arc<TokenVault>,
    pub sanitizer: Sanitizer,
    pub http_client: reqwest::Client,
    pub shared_session_id: Uuid,
}

impl AppState {
    pub fn new(config: Config, vault: Arc<TokenVault>) -> Self {
        let sanitizer = Sanitizer::new(EntityDetector::new(Box::new(RuleBasedPersonRecognizer::new())));
        let timeout_secs = config
            .request_timeout_seconds
            .unwrap_or(crate::config::DEFAULT_REQUEST_TIMEOUT_SECONDS);
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client configuration is valid");
        let shared_session_id = vault.create_session();

        Self { config, vault, sanitizer, http_client, shared_session_id }
    }
}

/// Build the axum router for the full gateway surface (every upstream
/// protocol route plus `/health`) with the configured body-size limit
/// applied to every route.
pub fn build_router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/v1/messages", post(handle_anthropic))
        .route("/v1/chat/completions", post(handle_openai))
        .route("/chat/completions", post(handle_openai))
        .route("/v1/models/{model}:generateContent", post(handle_gemini))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
}

/// Run the gateway until a shutdown signal (SIGINT, or SIGTERM on Unix, or
/// `shutdown` being cancelled by the caller) arrives, then cancel
/// `shutdown` so the vault's background tasks stop, and drain and flush
/// the vault before returning.
pub async fn run(config: Config, vault: Arc<TokenVault>, shutdown: CancellationToken) -> Result<()> {
    let port = config.port.unwrap_or(8900);
    let state = Arc::new(AppState::new(config, Arc::clone(&vault)));
    let router = build_router(Arc::clone(&state), DEFAULT_BODY_LIMIT_BYTES);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Internal(format!("binding {addr}: {e}")))?;

    tracing::info!(address = %addr, "moltguard gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(|e| GatewayError::Internal(format!("server error: {e}")))?;

    tracing::info!("shutting down, flushing vault");
    shutdown.cancel();
    vault.close().await?;
    Ok(())
}

/// Resolves once any of: SIGINT, SIGTERM (Unix only), or an
/// externally-triggered cancellation of `shutdown` arrives.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend_names: Vec<&String> = state.config.backends.keys().collect();
    let redacted_config = redact_config_for_response(&serde_json::to_value(&state.config).unwrap_or(json!({})));
    Json(json!({
        "status": "ok",
        "backends": backend_names,
        "vaultSessionEntries": state.vault.mapping_snapshot(state.shared_session_id).len(),
        "config": redacted_config,
    }))
}

async fn handle_not_found() -> Response {
    GatewayError::UnknownRoute.into_response()
}

async fn handle_anthropic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let backend = state.config.backends.get("anthropic").cloned();
    let Some(backend) = backend else {
        return GatewayError::BackendNotConfigured("anthropic").into_response();
    };
    run_pipeline(&state, &headers, body, &AnthropicAdapter, &backend).await
}

async fn handle_openai(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let backend_name = resolve_openai_backend_name(&body);
    let backend = state.config.backends.get(backend_name).cloned();
    let Some(backend) = backend else {
        return GatewayError::BackendNotConfigured("openai").into_response();
    };
    let adapter = OpenAiAdapter::new(backend_name);
    run_pipeline(&state, &headers, body, &adapter, &backend).await
}

/// Requests whose `model` field names a known Kimi model route to the
/// `kimi` backend instead of `openai`; both speak the same wire shape.
fn resolve_openai_backend_name(body: &Value) -> &'static str {
    let is_kimi = body
        .get("model")
        .and_then(Value::as_str)
        .map(|m| m.to_lowercase().contains("kimi") || m.to_lowercase().contains("moonshot"))
        .unwrap_or(false);
    if is_kimi {
        "kimi"
    } else {
        "openai"
    }
}

async fn handle_gemini(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let backend = state.config.backends.get("gemini").cloned();
    let Some(backend) = backend else {
        return GatewayError::BackendNotConfigured("gemini").into_response();
    };
    let adapter = GeminiAdapter::new(model);
    run_pipeline(&state, &headers, body, &adapter, &backend).await
}

/// The full per-request procedure: resolve session, sanitize, mutate for
/// the wire protocol, canary-check, forward, then restore and re-encode
/// the response in whichever of the three response modes the request
/// calls for.
async fn run_pipeline(
    state: &AppState,
    headers: &HeaderMap,
    body: Value,
    adapter: &dyn Adapter,
    backend: &crate::config::BackendConfig,
) -> Response {
    let session_id = session::resolve_session_id(headers, state.shared_session_id);
    let client_wants_stream = adapter.client_wants_stream(&body);

    let sanitize_result = state.sanitizer.sanitize(&body, &state.vault, session_id);
    let needs_restoration = !sanitize_result.mapping_table.is_empty();

    let mut outbound = sanitize_result.sanitized_value;
    adapter.prepare_outbound(&mut outbound, needs_restoration);

    if let Err(e) = canary::assert_no_leaked_pii(&outbound.to_string()) {
        return e.into_response();
    }

    let (base_url, api_key) = match (&backend.base_url, &backend.api_key) {
        (Some(url), Some(key)) => (url.clone(), key.clone()),
        _ => return GatewayError::BackendNotConfigured(adapter.backend_name()).into_response(),
    };

    let auth_headers = match adapter.auth_headers(&api_key) {
        Ok(h) => h,
        Err(e) => return e.into_response(),
    };

    let url = format!("{}{}", base_url.trim_end_matches('/'), adapter.upstream_path());
    let upstream_request = state.http_client.post(url).headers(auth_headers).json(&outbound);

    // Nothing was redacted, so the outbound payload went out with the
    // client's original stream flag untouched: no placeholder can
    // straddle a chunk boundary, so pass the upstream's own SSE stream
    // through line-by-line rather than buffering the whole response.
    if client_wants_stream && !needs_restoration {
        let upstream_response = match upstream_request.send().await {
            Ok(r) => r,
            Err(e) => return GatewayError::Upstream(e).into_response(),
        };
        let status = upstream_response.status();
        let mapping = state.vault.mapping_snapshot(session_id);
        let body = Body::from_stream(stream_restored_sse_lines(upstream_response, mapping));
        return (status, [(axum::http::header::CONTENT_TYPE, "text/event-stream")], body).into_response();
    }

    let upstream_response = match upstream_request.send().await {
        Ok(r) => r,
        Err(e) => return GatewayError::Upstream(e).into_response(),
    };

    let status = upstream_response.status();
    let upstream_body: Value = match upstream_response.json().await {
        Ok(v) => v,
        Err(e) => return GatewayError::Upstream(e).into_response(),
    };

    if !needs_restoration {
        return (status, Json(upstream_body)).into_response();
    }

    let mapping = state.vault.mapping_snapshot(session_id);
    let restored = crate::restorer::Restorer::restore(&upstream_body, &mapping);

    if client_wants_stream {
        let encoded = adapter.encode_as_sse(&restored);
        return (
            status,
            [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
            encoded,
        )
            .into_response();
    }

    (status, Json(restored)).into_response()
}

/// Turn an upstream's raw SSE byte stream into a restored one, line by
/// line, buffering across chunk boundaries so a line split mid-chunk is
/// never handed to the restorer half-formed.
fn stream_restored_sse_lines(
    upstream: reqwest::Response,
    mapping: crate::vault::MappingTable,
) -> impl futures_util::Stream<Item = std::result::Result<Bytes, reqwest::Error>> {
    let byte_stream = upstream.bytes_stream();
    stream::unfold(
        (byte_stream, String::new(), mapping, false),
        |(mut byte_stream, mut buffer, mapping, mut done)| async move {
            loop {
                if let Some(pos) = buffer.find('\n') {
                    let line: String = buffer.drain(..=pos).collect();
                    let restored = crate::restorer::Restorer::restore_sse_line(&line, &mapping);
                    return Some((Ok(Bytes::from(restored)), (byte_stream, buffer, mapping, done)));
                }
                if done {
                    if buffer.is_empty() {
                        return None;
                    }
                    let restored = crate::restorer::Restorer::restore_sse_line(&buffer, &mapping);
                    return Some((Ok(Bytes::from(restored)), (byte_stream, String::new(), mapping, done)));
                }
                match byte_stream.next().await {
                    Some(Ok(chunk)) => buffer.push_str(&String::from_utf8_lossy(&chunk)),
                    Some(Err(e)) => return Some((Err(e), (byte_stream, buffer, mapping, true))),
                    None => done = true,
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_kimi_backend_from_model_name() {
        assert_eq!(resolve_openai_backend_name(&json!({"model": "moonshot-v1-8k"})), "kimi");
        assert_eq!(resolve_openai_backend_name(&json!({"model": "kimi-k2"})), "kimi");
        assert_eq!(resolve_openai_backend_name(&json!({"model": "gpt-4o"})), "openai");
    }
}
