//! Window Watch CLI
//!
//! Command-line interface for the window text watcher and notification service.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use window_watch::{load_config, Config};

#[derive(Parser)]
#[command(name = "window-watch")]
#[command(about = "Watch a window for matching text and send notifications")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            tracing::warn!("No --config given, watching window.txt with the log sender");
            Config::default()
        }
    };
    config.resolve_secrets()?;
    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    tracing::info!(
        "Starting window-watch: scanner {}, sender {}, history {:?}, max {} entries",
        config.scanner.type_name(),
        config.sender.type_name(),
        config.history_file,
        config.max_history
    );

    window_watch::run(config).await?;

    Ok(())
}
