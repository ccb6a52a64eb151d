//! Hotwire Chat host
//!
//! Loads the module directory, then reads admin commands (e.g. `/reload`)
//! from stdin until SIGINT/SIGTERM.
//!
//! Usage:
//!   hotwire-chat --config config.toml [--force] [--modules-dir <dir>]

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use hotwire_chat::config::HostConfig;
use hotwire_chat::module::ModuleManager;
use hotwire_chat::modules::{builtin_catalog, Caller, CommandService, COMMAND_SERVICE, LEVEL_ROOT};
use hotwire_chat::utils::{create_shutdown_receiver, init_logging_from_config};

#[derive(Parser, Debug)]
#[command(name = "hotwire-chat", version, about = "Chat host with hot-reloadable modules")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Load every valid module even if some module files are rejected
    #[arg(long)]
    force: bool,

    /// Module directory, overriding the configuration file
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Log filter, overriding the configuration file (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, config_missing) = if args.config.exists() {
        let config = HostConfig::from_file(&args.config)
            .with_context(|| format!("reading {}", args.config.display()))?;
        (config, false)
    } else {
        (HostConfig::default(), true)
    };
    if let Some(dir) = args.modules_dir {
        config.kernel.modules_dir = dir;
    }

    init_logging_from_config(config.logging.as_ref(), args.log_filter.as_deref());
    if config_missing {
        warn!("{} not found, using defaults", args.config.display());
    }
    info!("Starting {}", config.project_name);

    let manager = ModuleManager::with_config(config.kernel.clone(), builtin_catalog());
    let report = manager
        .initialize(args.force)
        .await
        .context("loading modules")?;
    info!("Load order: {}", report.loaded.join(", "));

    run_console(&manager).await?;

    info!("{} stopped", config.project_name);
    Ok(())
}

/// Dispatch stdin lines as root-level commands until shutdown or EOF
async fn run_console(manager: &ModuleManager) -> anyhow::Result<()> {
    let mut shutdown = create_shutdown_receiver();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let caller = Caller::new("console", LEVEL_ROOT);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    info!("Console closed");
                    // Keep serving until a signal arrives
                    let _ = shutdown.changed().await;
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // Looked up per line: a full reload installs a new service
                let Some(service) = manager.capabilities().get::<CommandService>(COMMAND_SERVICE) else {
                    error!("No command service installed, ignoring {:?}", line);
                    continue;
                };
                for reply in service.dispatch(line, caller.clone()).await {
                    println!("{}", reply.to_json());
                }
            }
        }
    }
    Ok(())
}
