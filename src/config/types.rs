//! Typed configuration structures
//!
//! Provides strongly-typed access to the gateway's configuration, with
//! environment-variable fallbacks layered over the file and validation run
//! once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration structure, loaded from a JSON5 file and then
/// overlaid with environment variables for any backend left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Port the reverse-proxy HTTP listener binds to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Upstream LLM backends, keyed by name (`anthropic`, `openai`,
    /// `gemini`, `kimi`, ...).
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    /// Optional path-prefix routing overrides (route prefix -> backend
    /// name). Backends not named here are routed by the adapter the
    /// inbound request shape matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<HashMap<String, String>>,

    /// Vault persistence configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultConfig>,

    /// Logging configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Per-request timeout for upstream calls, in seconds. Defaults to 60.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u64>,
}

/// Default per-request upstream timeout when unset in config.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// A single upstream backend's connection details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Vault persistence and eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultConfig {
    /// Path to the vault's persistence file. Defaults to
    /// `~/.moltguard/token-vault.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Session TTL in seconds before a session's entries are purged.
    pub ttl_seconds: u64,

    /// Global cap on the number of vault entries kept across all sessions
    /// before least-recently-used entries are evicted.
    pub max_entries: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_seconds: 300,
            max_entries: 10_000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"moltguard=debug,tower_http=info"`.
    pub filter: String,

    /// Emit logs as JSON lines instead of the default human-readable
    /// formatter.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// A single configuration validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Known backend adapter names. Routing entries must point at one of
/// these, or at a backend actually present in `backends`.
const KNOWN_ADAPTERS: &[&str] = &["anthropic", "openai", "gemini", "kimi"];

impl Config {
    /// Validate the loaded configuration. Does not require that every
    /// backend referenced elsewhere is configured — a missing backend at
    /// route time fails that request with 500, not the whole process at
    /// startup (per the error-handling design). This only rejects
    /// structurally invalid configuration: an out-of-range port, a
    /// partially-specified backend, or a routing entry naming a backend
    /// that isn't configured at all.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(port) = self.port {
            if port == 0 {
                errors.push(ValidationError {
                    path: "port".to_string(),
                    message: "port must be between 1 and 65535".to_string(),
                });
            }
        }

        if let Some(timeout) = self.request_timeout_seconds {
            if timeout == 0 {
                errors.push(ValidationError {
                    path: "requestTimeoutSeconds".to_string(),
                    message: "requestTimeoutSeconds must be greater than 0".to_string(),
                });
            }
        }

        for (name, backend) in &self.backends {
            let has_url = backend.base_url.as_deref().is_some_and(|s| !s.is_empty());
            let has_key = backend.api_key.as_deref().is_some_and(|s| !s.is_empty());
            if has_url != has_key {
                errors.push(ValidationError {
                    path: format!("backends.{name}"),
                    message: "a configured backend needs both baseUrl and apiKey, or neither"
                        .to_string(),
                });
            }
            if !has_url && !KNOWN_ADAPTERS.contains(&name.as_str()) {
                errors.push(ValidationError {
                    path: format!("backends.{name}"),
                    message: format!(
                        "unknown backend name (expected one of {KNOWN_ADAPTERS:?})"
                    ),
                });
            }
        }

        if let Some(routing) = &self.routing {
            for (prefix, backend) in routing {
                if !self.backends.contains_key(backend) {
                    errors.push(ValidationError {
                        path: format!("routing.{prefix}"),
                        message: format!("routes to unconfigured backend '{backend}'"),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str, key: &str) -> BackendConfig {
        BackendConfig {
            base_url: Some(url.to_string()),
            api_key: Some(key.to_string()),
        }
    }

    #[test]
    fn empty_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_port_zero() {
        let config = Config {
            port: Some(0),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.path == "port"));
    }

    #[test]
    fn rejects_half_specified_backend() {
        let mut backends = HashMap::new();
        backends.insert(
            "anthropic".to_string(),
            BackendConfig {
                base_url: Some("https://api.anthropic.com/v1".to_string()),
                api_key: None,
            },
        );
        let config = Config {
            backends,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.path == "backends.anthropic"));
    }

    #[test]
    fn accepts_fully_specified_backend() {
        let mut backends = HashMap::new();
        backends.insert(
            "anthropic".to_string(),
            backend("https://api.anthropic.com/v1", "sk-ant-test"),
        );
        let config = Config {
            backends,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_request_timeout() {
        let config = Config {
            request_timeout_seconds: Some(0),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.path == "requestTimeoutSeconds"));
    }

    #[test]
    fn rejects_routing_to_unconfigured_backend() {
        let mut backends = HashMap::new();
        backends.insert(
            "anthropic".to_string(),
            backend("https://api.anthropic.com/v1", "sk-ant-test"),
        );
        let mut routing = HashMap::new();
        routing.insert("/v1/messages".to_string(), "openai".to_string());
        let config = Config {
            backends,
            routing: Some(routing),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.path == "routing./v1/messages"));
    }
}
