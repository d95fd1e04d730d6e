//! Window Watch - desktop text watcher and notification service
//!
//! Scans a monitored surface for text matching a pattern and sends new or
//! changed matches through a notification channel, with debounce, backoff,
//! watchdog recovery and health reporting.

pub mod backoff;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod factory;
pub mod history;
pub mod io;
pub mod persist;
pub mod policy;
pub mod pushover;
pub mod scanner;
pub mod sender;
pub mod status;
pub mod telemetry;
pub mod webhook;


pub use config::{load_config, Config};
pub use error::{Result, WatchError};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::{Command, Engine};
use crate::factory::ConfiguredFactory;
use crate::io::ReqwestHttpClient;

/// Capacity of the UI-to-engine command channel
const COMMAND_QUEUE_SIZE: usize = 16;

/// Run the window watch service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::new());
    let factory = Arc::new(ConfiguredFactory::new(&config, http));
    let cancel = CancellationToken::new();
    let status = status::new_status_handle(config.dashboard.history_size);
    let (command_tx, command_rx) = mpsc::channel::<Command>(COMMAND_QUEUE_SIZE);

    let mut engine = Engine::new(
        &config,
        factory,
        Arc::clone(&status),
        command_rx,
        cancel.clone(),
    )?;

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
        }
        cancel_for_signal.cancel();
    });

    if config.dashboard.enabled {
        let dashboard_port = config.dashboard.port;
        let dashboard_status = Arc::clone(&status);
        let cancel_for_dashboard = cancel.clone();

        tokio::spawn(async move {
            let router = dashboard::build_router(dashboard_status, command_tx);
            let addr = SocketAddr::from(([127, 0, 0, 1], dashboard_port));
            tracing::info!("Dashboard listening on http://{}", addr);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    let err = WatchError::Dashboard(format!(
                        "failed to bind port {}: {}",
                        dashboard_port, e
                    ));
                    tracing::error!("{}. Continuing without dashboard.", err);
                    return;
                }
            };

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_dashboard.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Dashboard stopped");
        });
    }

    // Runs until cancelled
    engine.run().await;

    Ok(())
}
