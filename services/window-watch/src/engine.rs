//! Engine: the scan, filter, send, persist loop
//!
//! One engine runs on one task and is the only writer of the history store.
//! Each iteration scans the surface, filters the snippets through the scan
//! policy, sends what is new, records it, then runs the watchdog, the
//! healthcheck and the telemetry dump before waiting for the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backoff::next_wait;
use crate::config::Config;
use crate::factory::ComponentFactory;
use crate::history::HistoryStore;
use crate::policy::{self, MatchFilter};
use crate::scanner::Scanner;
use crate::sender::Sender;
use crate::status::{DeliveryKind, DeliveryRecord, StatusHandle};
use crate::telemetry::TelemetryWriter;

/// Stand-in deadline for waits too long to represent as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Control commands from UI surfaces, applied between cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    /// End the current wait and scan right away
    ScanNow,
}

enum Wake {
    Cancelled,
    Elapsed,
    Command(Option<Command>),
}

/// The notification loop
pub struct Engine {
    config: Config,
    match_filter: MatchFilter,
    factory: Arc<dyn ComponentFactory>,
    scanner: Arc<dyn Scanner>,
    sender: Arc<dyn Sender>,
    history: HistoryStore,
    status: StatusHandle,
    telemetry: TelemetryWriter,
    commands: mpsc::Receiver<Command>,
    commands_open: bool,
    cancel: CancellationToken,
    error_count: u32,
    paused: bool,
    started_at: Instant,
    last_healthcheck_attempt: Option<Instant>,
}

impl Engine {
    pub fn new(
        config: &Config,
        factory: Arc<dyn ComponentFactory>,
        status: StatusHandle,
        commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        let match_filter = MatchFilter::new(&config.match_pattern)?;
        let scanner = factory.build_scanner()?;
        let sender = factory.build_sender()?;
        let history = HistoryStore::open(&config.history_file);
        tracing::debug!(
            "Engine using scanner '{}', sender '{}', {} history entries",
            scanner.type_name(),
            sender.type_name(),
            history.len()
        );

        Ok(Self {
            config: config.clone(),
            match_filter,
            factory,
            scanner,
            sender,
            history,
            status,
            telemetry: TelemetryWriter::new(config.telemetry_file.clone()),
            commands,
            commands_open: true,
            cancel,
            error_count: 0,
            paused: false,
            started_at: Instant::now(),
            last_healthcheck_attempt: None,
        })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    /// Consecutive failed cycles
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Loop until the cancellation token fires
    pub async fn run(&mut self) {
        self.status.set_running(true);
        tracing::info!(
            "Engine started (poll every {}s, debounce {}s)",
            self.config.poll_interval_seconds,
            self.config.debounce_seconds
        );

        loop {
            self.drain_commands();
            if self.cancel.is_cancelled() {
                break;
            }
            let wait = self.run_once().await;
            tracing::debug!("Next cycle in {:?}", wait);
            if !self.wait(wait).await {
                break;
            }
        }

        self.status.set_running(false);
        self.telemetry.write(self.status.snapshot());
        tracing::info!("Engine stopped");
    }

    /// One iteration: cycle, watchdog, healthcheck, telemetry.
    /// Returns how long to wait before the next one.
    pub async fn run_once(&mut self) -> Duration {
        if self.paused {
            tracing::debug!("Paused, skipping scan");
        } else {
            let started = Instant::now();
            match self.run_cycle().await {
                Ok(sent) => {
                    if self.error_count > 0 {
                        tracing::info!("Recovered after {} failed cycles", self.error_count);
                    }
                    tracing::debug!("Cycle complete, {} sent", sent);
                    self.error_count = 0;
                }
                Err(e) => {
                    self.report_error(&format!("error: {}", e)).await;
                    self.error_count = self.error_count.saturating_add(1);
                }
            }
            // failed cycles included
            self.enforce_history_cap();
            self.status.set_error_count(self.error_count);
            self.check_watchdog(started.elapsed()).await;
        }

        self.maybe_healthcheck().await;
        self.telemetry.write(self.status.snapshot());

        next_wait(
            self.config.poll_interval_seconds,
            self.error_count,
            self.config.error_backoff_base_seconds,
            self.config.error_backoff_max_seconds,
        )
    }

    /// Scan, filter, send and persist. Returns the number of messages sent.
    async fn run_cycle(&mut self) -> crate::Result<usize> {
        let now = Utc::now();
        self.status.mark_scan(now);

        let raw = self.scanner.scan(&self.config.match_pattern).await?;
        let snippets = self.match_filter.filter(policy::prepare(raw));
        let (unique, removed) = policy::dedupe(snippets);
        if removed > 0 {
            tracing::debug!("Dropped {} duplicate snippets in this scan", removed);
        }

        let outcome = policy::filter_debounce(
            unique,
            self.history.last_sent(),
            self.config.debounce_seconds,
            now,
        );
        for (text, age) in &outcome.skipped {
            tracing::debug!("Skipping '{}', last sent {}s ago", text, age.num_seconds());
        }

        let accepted = if self.config.skip_lower_leading_number {
            let (accepted, skipped) =
                policy::filter_monotonic(outcome.accepted, self.history.latest_leading_number());
            for text in &skipped {
                tracing::debug!("Skipping '{}', leading number went down", text);
            }
            accepted
        } else {
            outcome.accepted
        };

        if let Some(first) = accepted.first() {
            self.status.mark_match(first, now);
        }

        self.send_accepted(accepted).await
    }

    async fn send_accepted(&mut self, accepted: Vec<String>) -> crate::Result<usize> {
        let mut sent = 0;
        for text in accepted {
            // the index is updated after every send, so repeats in one cycle debounce too
            if !policy::is_due(
                &text,
                self.history.last_sent(),
                self.config.debounce_seconds,
                Utc::now(),
            ) {
                continue;
            }
            if self.config.skip_lower_leading_number
                && !policy::passes_monotonic(&text, self.history.latest_leading_number())
            {
                continue;
            }

            self.deliver(DeliveryKind::Match, &text).await?;

            let sent_at = Utc::now();
            if let Err(e) = self.history.append(&text, sent_at) {
                tracing::warn!("Failed to persist history: {}", e);
            }
            self.status.mark_send(sent_at);
            sent += 1;
        }
        Ok(sent)
    }

    fn enforce_history_cap(&mut self) {
        let result = if self.history.len() > self.config.max_history {
            self.history.truncate(self.config.max_history).map(|_| ())
        } else if self.history.is_dirty() {
            self.history.save()
        } else {
            Ok(())
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist history: {}", e);
        }
    }

    /// Send one message and record the attempt in the status store
    async fn deliver(&self, kind: DeliveryKind, message: &str) -> crate::Result<()> {
        let result = self.sender.send(message).await;
        let at = Utc::now();

        match &result {
            Ok(()) => tracing::info!("Sent {:?} via {}: {}", kind, self.sender.type_name(), message),
            Err(e) => tracing::warn!("Sending {:?} via {} failed: {}", kind, self.sender.type_name(), e),
        }

        self.status.add_delivery(DeliveryRecord {
            kind,
            message: message.to_string(),
            sender: self.sender.type_name().to_string(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            at,
        });
        result
    }

    /// Record an error and try to notify about it.
    ///
    /// If that notification fails too it is only logged, never reported again.
    pub async fn report_error(&self, message: &str) {
        let message = policy::to_ascii_safe(message);
        tracing::error!("{}", message);
        self.status.mark_error(&message, Utc::now());

        if let Err(e) = self.deliver(DeliveryKind::Error, &message).await {
            tracing::warn!("Could not deliver error notification: {}", e);
        }
    }

    async fn check_watchdog(&mut self, elapsed: Duration) {
        let timeout = self.config.watchdog_timeout_seconds;
        if timeout == 0 || elapsed <= Duration::from_secs(timeout) {
            return;
        }

        // rebuild first so the report does not go through a wedged sender
        let rebuild_failures = if self.config.watchdog_restart {
            self.restart_components()
        } else {
            Vec::new()
        };

        self.report_error(&format!(
            "error: watchdog timeout after {}s",
            elapsed.as_secs()
        ))
        .await;

        for failure in rebuild_failures {
            self.report_error(&format!("error: watchdog restart failed: {}", failure))
                .await;
        }
    }

    /// Replace scanner and sender with fresh instances. A component that fails
    /// to rebuild is kept as is.
    fn restart_components(&mut self) -> Vec<String> {
        tracing::warn!("Watchdog re-initializing scanner and sender");
        let mut failures = Vec::new();

        match self.factory.build_scanner() {
            Ok(scanner) => self.scanner = scanner,
            Err(e) => failures.push(format!("scanner: {}", e)),
        }
        match self.factory.build_sender() {
            Ok(sender) => self.sender = sender,
            Err(e) => failures.push(format!("sender: {}", e)),
        }
        failures
    }

    async fn maybe_healthcheck(&mut self) {
        let interval = self.config.healthcheck_interval_seconds;
        if interval == 0 {
            return;
        }
        let since = self.last_healthcheck_attempt.unwrap_or(self.started_at);
        if since.elapsed() < Duration::from_secs(interval) {
            return;
        }
        self.last_healthcheck_attempt = Some(Instant::now());

        let message = healthcheck_message(&self.status.snapshot());
        match self.deliver(DeliveryKind::Healthcheck, &message).await {
            Ok(()) => {
                let now = Utc::now();
                self.status.mark_send(now);
                self.status.mark_healthcheck(now);
            }
            Err(e) => {
                self.report_error(&format!("error: healthcheck failed: {}", e))
                    .await;
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }
    }

    /// Apply a command; true when it should cut the current wait short
    fn apply_command(&mut self, command: Command) -> bool {
        tracing::info!("Received command {:?}", command);
        match command {
            Command::Pause => {
                self.paused = true;
                self.status.set_paused(true);
                false
            }
            Command::Resume => {
                self.paused = false;
                self.status.set_paused(false);
                true
            }
            Command::ScanNow => true,
        }
    }

    /// Wait for `duration`, a stop signal, or a command that ends the wait.
    /// Returns false when stopped.
    async fn wait(&mut self, duration: Duration) -> bool {
        let now = Instant::now();
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let cancel = self.cancel.clone();

        loop {
            let commands_open = self.commands_open;
            let wake = tokio::select! {
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Wake::Elapsed,
                command = self.commands.recv(), if commands_open => Wake::Command(command),
            };

            match wake {
                Wake::Cancelled => return false,
                Wake::Elapsed => return true,
                Wake::Command(Some(command)) => {
                    if self.apply_command(command) {
                        return true;
                    }
                }
                Wake::Command(None) => self.commands_open = false,
            }
        }
    }
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string())
}

/// Liveness message with uptime and the last scan/send/error/healthcheck fields
pub fn healthcheck_message(status: &crate::status::StatusSnapshot) -> String {
    format!(
        "healthcheck: uptime {}s, last scan {}, last send {}, last error {} ({}), last healthcheck {}",
        status.uptime_seconds,
        format_time(status.last_scan),
        format_time(status.last_send),
        status.last_error.as_deref().unwrap_or("none"),
        format_time(status.last_error_at),
        format_time(status.last_healthcheck),
    )
}
