//! LanShare Daemon
//!
//! Serves one directory tree to browsers on the local network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::{default_config_path, Config};
use daemon::server::FileShareServer;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix for rolling log files.
const LOG_FILE_PREFIX: &str = "lanshare.log";

/// LanShare - share a directory over the local network.
#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the share root over HTTP
    Serve {
        /// Directory to share (overrides the config file and FILE_SHARE_ROOT)
        #[arg(long, short, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Address to bind to
        #[arg(long, short)]
        bind: Option<String>,

        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        save: bool,
    },
}

impl Commands {
    /// Apply command-line overrides on top of the file and environment.
    fn apply_overrides(&self, config: &mut Config) {
        if let Commands::Serve { root, bind, port } = self {
            if let Some(root) = root {
                config.share.root = root.clone();
            }
            if let Some(bind) = bind {
                config.server.bind = bind.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
    }
}

/// Install the tracing subscriber.
///
/// Logs go to stderr, and additionally to a daily rolling file when a log
/// directory is configured. The returned guard flushes the file writer and
/// must live until exit.
fn init_tracing(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;

    // Apply environment variable and command-line overrides
    config.apply_env_overrides();
    cli.command.apply_overrides(&mut config);

    // Initialize tracing
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.server.log_level.to_lowercase()
    };
    let _log_guard = init_tracing(&level, config.server.log_dir.as_deref());

    tracing::info!("Using config file: {:?}", config_path);

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("LanShare starting...");
            let server = Arc::new(FileShareServer::new(config)?);

            let stopper = Arc::clone(&server);
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                tracing::info!("Received shutdown signal");
                stopper.stop();
            });

            server.run().await?;
        }
        Commands::Config { save } => {
            print!("{}", config.to_toml()?);
            if save {
                config
                    .save(&config_path)
                    .with_context(|| format!("Failed to save {}", config_path.display()))?;
                tracing::info!("Configuration written to {:?}", config_path);
            }
        }
    }

    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or Ctrl-C).
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!("Failed to register SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Received Ctrl-C"),
                Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
            }
        }
    }
}
