//! Sender trait for delivering messages, plus the log sender and retry wrapper

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RetryConfig;

/// Trait for delivering one outbound message
#[async_trait]
pub trait Sender: Send + Sync + std::fmt::Debug {
    /// Get the sender type name (e.g. "webhook")
    fn type_name(&self) -> &str;

    /// Deliver a message. Any error is final for this call.
    async fn send(&self, message: &str) -> crate::Result<()>;
}

/// Delivers by logging only; handy for dry runs
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl Sender for LogSender {
    fn type_name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &str) -> crate::Result<()> {
        tracing::info!("Notification: {}", message);
        Ok(())
    }
}

/// Retries the wrapped sender with exponentially growing delays
#[derive(Debug)]
pub struct RetryingSender {
    inner: Arc<dyn Sender>,
    retry: RetryConfig,
}

impl RetryingSender {
    pub fn new(inner: Arc<dyn Sender>, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl Sender for RetryingSender {
    fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    async fn send(&self, message: &str) -> crate::Result<()> {
        let attempts = self.retry.attempts.max(1);
        let mut delay_ms = self.retry.initial_delay_ms.min(self.retry.max_delay_ms);
        let mut attempt = 1;

        loop {
            match self.inner.send(message).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::debug!("Send succeeded on attempt {}", attempt);
                    }
                    return Ok(());
                }
                Err(e) if attempt >= attempts => {
                    tracing::warn!("Send failed after {} attempts: {}", attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "Send failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt,
                        attempts,
                        e,
                        delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = delay_ms.saturating_mul(2).min(self.retry.max_delay_ms);
                    attempt += 1;
                }
            }
        }
    }
}
