//! Builds scanners and senders from configuration
//!
//! The engine builds its collaborators through this seam at startup and again
//! whenever the watchdog asks for a clean re-initialization.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, RetryConfig, ScannerConfig, SenderConfig};
use crate::io::HttpClient;
use crate::pushover::PushoverSender;
use crate::scanner::{CommandScanner, FileScanner, Scanner};
use crate::sender::{LogSender, RetryingSender, Sender};
use crate::webhook::WebhookSender;
use crate::WatchError;

/// Constructs fresh scanner and sender instances
pub trait ComponentFactory: Send + Sync {
    fn build_scanner(&self) -> crate::Result<Arc<dyn Scanner>>;

    fn build_sender(&self) -> crate::Result<Arc<dyn Sender>>;
}

/// Factory driven by the loaded configuration
pub struct ConfiguredFactory {
    scanner: ScannerConfig,
    sender: SenderConfig,
    retry: Option<RetryConfig>,
    target: String,
    http: Arc<dyn HttpClient>,
}

impl ConfiguredFactory {
    pub fn new(config: &Config, http: Arc<dyn HttpClient>) -> Self {
        Self {
            scanner: config.scanner.clone(),
            sender: config.sender.clone(),
            retry: config.sender_retry.clone(),
            target: config.target.clone(),
            http,
        }
    }
}

impl ComponentFactory for ConfiguredFactory {
    fn build_scanner(&self) -> crate::Result<Arc<dyn Scanner>> {
        let scanner: Arc<dyn Scanner> = match &self.scanner {
            ScannerConfig::File { path } => Arc::new(FileScanner::new(path.clone())),
            ScannerConfig::Command {
                program,
                args,
                timeout_seconds,
            } => {
                if program.is_empty() {
                    return Err(WatchError::Config(
                        "command scanner needs a program".to_string(),
                    ));
                }
                Arc::new(CommandScanner::new(
                    program,
                    args,
                    &self.target,
                    Duration::from_secs(*timeout_seconds),
                ))
            }
        };
        Ok(scanner)
    }

    fn build_sender(&self) -> crate::Result<Arc<dyn Sender>> {
        let sender: Arc<dyn Sender> = match &self.sender {
            SenderConfig::Log => Arc::new(LogSender),
            SenderConfig::Webhook { url } => {
                if url.is_empty() {
                    return Err(WatchError::Config("webhook sender needs a url".to_string()));
                }
                Arc::new(WebhookSender::new(url, Arc::clone(&self.http)))
            }
            SenderConfig::Pushover {
                api_token,
                user_key,
                title,
            } => {
                if api_token.is_empty() || user_key.is_empty() {
                    return Err(WatchError::Config(
                        "pushover sender needs api_token and user_key".to_string(),
                    ));
                }
                Arc::new(PushoverSender::new(
                    api_token,
                    user_key,
                    title,
                    Arc::clone(&self.http),
                ))
            }
        };

        Ok(match &self.retry {
            Some(retry) => Arc::new(RetryingSender::new(sender, retry.clone())),
            None => sender,
        })
    }
}
