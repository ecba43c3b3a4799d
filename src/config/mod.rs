//! Gateway configuration loading
//!
//! Configuration is read from a JSON5 file (path given on argv, or
//! `~/.moltguard/gateway.json5` by default), then any backend left
//! unconfigured in the file is filled in from environment variables so the
//! gateway can run from env alone in container deployments.

pub mod types;

pub use types::{
    BackendConfig, Config, LoggingConfig, ValidationError, VaultConfig,
    DEFAULT_REQUEST_TIMEOUT_SECONDS,
};

use crate::error::{GatewayError, Result};
use std::path::{Path, PathBuf};

/// Default config file location: `~/.moltguard/gateway.json5`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".moltguard").join("gateway.json5"))
}

/// Load configuration from `path` if it exists, falling back to an empty
/// config otherwise, then apply environment-variable overlays and validate.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| GatewayError::Config(format!("reading {}: {e}", path.display())))?;
            json5::from_str(&contents)
                .map_err(|e| GatewayError::Config(format!("parsing {}: {e}", path.display())))?
        }
        _ => Config::default(),
    };

    apply_env_overlay(&mut config);

    config.validate().map_err(|errors| {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        GatewayError::Config(joined)
    })?;

    Ok(config)
}

/// Fill in any backend left unconfigured in the file from environment
/// variables, matching the host-process convention of API-key env vars for
/// each upstream provider.
fn apply_env_overlay(config: &mut Config) {
    if let Ok(port) = std::env::var("MOLTGUARD_GATEWAY_PORT") {
        if let Ok(port) = port.parse() {
            config.port = Some(port);
        }
    }

    if config.request_timeout_seconds.is_none() {
        if let Ok(timeout) = std::env::var("MOLTGUARD_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse() {
                config.request_timeout_seconds = Some(timeout);
            }
        }
    }

    overlay_backend(config, "anthropic", "ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL");
    overlay_backend(config, "openai", "OPENAI_API_KEY", "OPENAI_BASE_URL");
    overlay_backend_multi(
        config,
        "kimi",
        &["KIMI_API_KEY", "MOONSHOT_API_KEY"],
        "KIMI_BASE_URL",
    );
    overlay_backend_multi(
        config,
        "gemini",
        &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "GEMINI_BASE_URL",
    );
}

fn overlay_backend(config: &mut Config, name: &str, key_var: &str, url_var: &str) {
    overlay_backend_multi(config, name, &[key_var], url_var);
}

fn overlay_backend_multi(config: &mut Config, name: &str, key_vars: &[&str], url_var: &str) {
    let key = key_vars.iter().find_map(|v| std::env::var(v).ok());
    let url = std::env::var(url_var).ok();

    if key.is_none() && url.is_none() {
        return;
    }

    let entry = config.backends.entry(name.to_string()).or_default();
    if entry.api_key.is_none() {
        entry.api_key = key;
    }
    if entry.base_url.is_none() {
        entry.base_url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_path_is_under_home() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(".moltguard/gateway.json5"));
        }
    }

    #[test]
    fn missing_file_yields_default_config() {
        let config = load(Some(Path::new("/nonexistent/path/gateway.json5"))).unwrap();
        assert!(config.backends.is_empty());
    }

    #[test]
    fn env_overlay_fills_unconfigured_backend() {
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-test-key");
        std::env::set_var("ANTHROPIC_BASE_URL", "https://api.anthropic.com/v1");
        let mut config = Config::default();
        apply_env_overlay(&mut config);
        let backend = config.backends.get("anthropic").unwrap();
        assert_eq!(backend.api_key.as_deref(), Some("sk-ant-test-key"));
        std::env::remove_var("ANTHROPIC_API_KEY");
        std::env::remove_var("ANTHROPIC_BASE_URL");
    }

    #[test]
    fn env_overlay_does_not_override_file_value() {
        std::env::set_var("OPENAI_API_KEY", "sk-env-value");
        let mut backends = HashMap::new();
        backends.insert(
            "openai".to_string(),
            BackendConfig {
                base_url: Some("https://api.openai.com/v1".to_string()),
                api_key: Some("sk-file-value".to_string()),
            },
        );
        let mut config = Config {
            backends,
            ..Default::default()
        };
        apply_env_overlay(&mut config);
        assert_eq!(
            config.backends.get("openai").unwrap().api_key.as_deref(),
            Some("sk-file-value")
        );
        std::env::remove_var("OPENAI_API_KEY");
    }
}
