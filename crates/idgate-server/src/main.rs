use std::path::{Path, PathBuf};

use clap::Parser;
use idgate_server::{AppConfig, IdgateServer};
use idgate_server::cli::{Cli, Commands};
use idgate_server::commands::{self, print_error};
use idgate_server::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, loader::load_config};
use idgate_server::open_storage;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config or IDGATE_CONFIG
    Argument,
    /// Default path (idgate.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argument => write!(f, "--config or {CONFIG_PATH_ENV}"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    let (config_path, source) = match &cli.config {
        Some(path) => (path.clone(), ConfigSource::Argument),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), ConfigSource::Default),
    };

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    idgate_server::observability::init_tracing(&cfg.logging.level);

    tracing::info!(
        path = %display_path(&config_path),
        source = %source,
        "Configuration loaded"
    );

    if let Err(e) = run(&cli, &cfg).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, cfg: &AppConfig) -> anyhow::Result<()> {
    match cli.command() {
        Commands::Serve => IdgateServer::from_config(cfg).await?.run().await,
        Commands::RegisterClient(args) => {
            commands::register(&open_storage(cfg).await?, args).await?;
            Ok(())
        }
        Commands::ListClients(args) => {
            commands::list_clients(&open_storage(cfg).await?, args).await?;
            Ok(())
        }
        Commands::ShowClient(args) => {
            commands::show_client(&open_storage(cfg).await?, args).await?;
            Ok(())
        }
        Commands::CreateUser(args) => commands::create(&open_storage(cfg).await?, args).await,
        Commands::DisableUser(args) => commands::disable(&open_storage(cfg).await?, args).await,
        Commands::PurgeExpired => commands::purge(&open_storage(cfg).await?).await,
    }
}

fn display_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    }
}
