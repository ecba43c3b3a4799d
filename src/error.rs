//! Gateway error types
//!
//! One variant per failure class in the error-handling design: transient
//! upstream failures are relayed, not wrapped here; only conditions the
//! gateway itself cannot route around become a `GatewayError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors raised by the gateway's own components (vault, sanitizer,
/// restorer, proxy pipeline, config loading).
///
/// Display strings here must never include a PII value, a placeholder's
/// original text, or a backend API key — only category names, counts, and
/// paths.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0} backend not configured")]
    BackendNotConfigured(&'static str),

    #[error("unknown route")]
    UnknownRoute,

    #[error("request body exceeds configured limit")]
    BodyTooLarge,

    #[error("failed to parse request body: {0}")]
    RequestParse(#[from] serde_json::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("residual PII-shaped content detected in outbound payload")]
    CanaryTripped,

    #[error("vault I/O error: {0}")]
    VaultIo(String),

    #[error("vault file is locked by another process")]
    VaultLocked,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl GatewayError {
    /// HTTP status code this error maps to.
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::BackendNotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UnknownRoute => StatusCode::NOT_FOUND,
            GatewayError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestParse(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::CanaryTripped => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::VaultIo(_) | GatewayError::VaultLocked => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A generic, safe message for the client — never the underlying detail
    /// for classes that could leak request content (canary trips, parse
    /// errors of upstream payloads containing restored text).
    fn client_message(&self) -> String {
        match self {
            GatewayError::CanaryTripped => {
                "sanitization check failed; request was not forwarded".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Stable, machine-readable error code for the response body.
    fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config",
            GatewayError::BackendNotConfigured(_) => "backend_not_configured",
            GatewayError::UnknownRoute => "unknown_route",
            GatewayError::BodyTooLarge => "body_too_large",
            GatewayError::RequestParse(_) => "request_parse",
            GatewayError::Upstream(_) => "upstream",
            GatewayError::CanaryTripped => "canary_tripped",
            GatewayError::VaultIo(_) => "vault_io",
            GatewayError::VaultLocked => "vault_locked",
            GatewayError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "gateway error");
        let body = ErrorBody { error: self.code().to_string(), message: self.client_message() };
        (self.status(), axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
