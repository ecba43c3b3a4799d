use clap::Parser;
use moltguard::cli::{Cli, Command, ConfigCommand};
use moltguard::{config, proxy, vault::TokenVault};

fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Start) {
        Command::Start => {
            if let Err(e) = run_gateway(cli.config.as_deref()) {
                eprintln!("moltguard: {e}");
                std::process::exit(1);
            }
        }
        Command::Config(ConfigCommand::Show) => {
            if let Err(e) = moltguard::cli::handle_config_show(cli.config.as_deref()) {
                eprintln!("moltguard: {e}");
                std::process::exit(1);
            }
        }
        Command::Config(ConfigCommand::Path) => {
            moltguard::cli::handle_config_path(cli.config.as_deref());
        }
        Command::Status { host, port } => {
            let runtime = tokio::runtime::Runtime::new().expect("building tokio runtime");
            runtime.block_on(moltguard::cli::handle_status(&host, port));
        }
        Command::Version => {
            moltguard::cli::handle_version();
        }
    }
}

fn run_gateway(config_path: Option<&std::path::Path>) -> moltguard::Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| moltguard::GatewayError::Internal(format!("building tokio runtime: {e}")))?;

    runtime.block_on(async {
        let resolved_path = config_path
            .map(std::path::PathBuf::from)
            .or_else(config::default_config_path);
        let cfg = config::load(resolved_path.as_deref())?;

        init_logging(&cfg);

        let vault_path = cfg
            .vault
            .as_ref()
            .and_then(|v| v.path.clone())
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| {
                moltguard::vault::default_vault_path().unwrap_or_else(|| {
                    std::path::PathBuf::from(".moltguard/token-vault.json")
                })
            });
        let ttl_seconds = cfg.vault.as_ref().map(|v| v.ttl_seconds).unwrap_or(300);
        let max_entries = cfg.vault.as_ref().map(|v| v.max_entries).unwrap_or(10_000);

        let vault = TokenVault::open(vault_path, ttl_seconds, max_entries)?;
        let shutdown = tokio_util::sync::CancellationToken::new();
        let _background_tasks = vault.spawn_background_tasks(shutdown.clone());

        proxy::run(cfg, vault, shutdown).await
    })
}

fn init_logging(cfg: &config::Config) {
    let filter = cfg
        .logging
        .as_ref()
        .map(|l| l.filter.clone())
        .unwrap_or_else(|| "info".to_string());
    let json = cfg.logging.as_ref().map(|l| l.json).unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter));

    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
