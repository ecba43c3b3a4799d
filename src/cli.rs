//! CLI subcommand definitions and handlers.
//!
//! - `start` (default) -- start the gateway server
//! - `config show|path` -- read configuration / print its resolved path
//! - `status` -- query a running instance's `/health` endpoint
//! - `version` -- print build/version info

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// moltguard: a local PII-sanitization gateway for AI-assistant hosts.
#[derive(Parser, Debug)]
#[command(
    name = "moltguard",
    version = env!("CARGO_PKG_VERSION"),
    about = "moltguard -- reversible PII sanitization between an AI host and LLM APIs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the gateway's JSON5 config file. Defaults to
    /// `~/.moltguard/gateway.json5`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Start,

    /// Read configuration values.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Query a running instance's `/health` endpoint.
    Status {
        /// Port of the running instance (default: from config or 8900).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host of the running instance.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

const DEFAULT_PORT: u16 = 8900;

/// Run the `config show` subcommand.
pub fn handle_config_show(config_path: Option<&std::path::Path>) -> crate::error::Result<()> {
    let resolved = resolve_config_path(config_path);
    let config = crate::config::load(resolved.as_deref())?;
    let value = serde_json::to_value(&config)
        .map_err(|e| crate::error::GatewayError::Internal(e.to_string()))?;
    let redacted = crate::security::redact_config_for_response(&value);
    println!("{}", serde_json::to_string_pretty(&redacted).unwrap_or_default());
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(config_path: Option<&std::path::Path>) {
    match resolve_config_path(config_path) {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("could not resolve a home directory for the default config path"),
    }
}

fn resolve_config_path(explicit: Option<&std::path::Path>) -> Option<PathBuf> {
    explicit.map(PathBuf::from).or_else(crate::config::default_config_path)
}

/// Run the `status` subcommand: hit a running instance's `/health`.
pub async fn handle_status(host: &str, port: Option<u16>) {
    let port = port.unwrap_or(DEFAULT_PORT);
    let url = format!("http://{host}:{port}/health");

    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to build http client: {e}");
            std::process::exit(1);
        }
    };

    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("could not connect to moltguard at {host}:{port}");
            eprintln!("  error: {e}");
            eprintln!("is the server running? start it with: moltguard start");
            std::process::exit(1);
        }
    };

    if !response.status().is_success() {
        eprintln!("health endpoint returned HTTP {}", response.status());
        std::process::exit(1);
    }

    let body: serde_json::Value = match response.json().await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("could not parse health response: {e}");
            std::process::exit(1);
        }
    };

    println!("moltguard gateway status");
    println!("========================");
    println!("  address: {host}:{port}");
    if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
        println!("  status:  {status}");
    }
    if let Some(entries) = body.get("vaultSessionEntries").and_then(|v| v.as_u64()) {
        println!("  vault entries (shared session): {entries}");
    }
    if let Some(backends) = body.get("backends").and_then(|v| v.as_array()) {
        let names: Vec<&str> = backends.iter().filter_map(|v| v.as_str()).collect();
        println!("  backends: {}", names.join(", "));
    }
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("moltguard {}", env!("CARGO_PKG_VERSION"));
    println!("  build date: {}", env!("MOLTGUARD_BUILD_DATE"));
    println!("  git commit: {}", env!("MOLTGUARD_GIT_HASH"));
    println!("  platform:   {} ({})", std::env::consts::OS, std::env::consts::ARCH);
}
