//! Shared runtime status, written by the engine and read by the dashboard and telemetry

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// What an outbound message was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Match,
    Healthcheck,
    Error,
}

/// Record of one send attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub kind: DeliveryKind,
    pub message: String,
    pub sender: String,
    pub success: bool,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Point-in-time copy of the status, taken under the lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub paused: bool,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_match: Option<String>,
    pub last_match_at: Option<DateTime<Utc>>,
    pub last_send: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_healthcheck: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    /// Consecutive failed cycles, drives the backoff
    pub error_count: u32,
    /// Every error event since start
    pub total_errors: u64,
}

#[derive(Debug, Default)]
struct StatusFields {
    running: bool,
    paused: bool,
    last_scan: Option<DateTime<Utc>>,
    last_match: Option<String>,
    last_match_at: Option<DateTime<Utc>>,
    last_send: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
    last_healthcheck: Option<DateTime<Utc>>,
    error_count: u32,
    total_errors: u64,
    recent: VecDeque<DeliveryRecord>,
}

/// Thread-safe status store.
///
/// All fields sit behind one mutex. Critical sections only copy values, so
/// readers never wait on network or disk.
#[derive(Debug)]
pub struct StatusStore {
    fields: Mutex<StatusFields>,
    recent_max: usize,
    started_at: Instant,
}

impl StatusStore {
    pub fn new(recent_max: usize) -> Self {
        Self {
            fields: Mutex::new(StatusFields {
                recent: VecDeque::with_capacity(recent_max),
                ..StatusFields::default()
            }),
            recent_max,
            started_at: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusFields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn set_paused(&self, paused: bool) {
        self.lock().paused = paused;
    }

    pub fn mark_scan(&self, at: DateTime<Utc>) {
        self.lock().last_scan = Some(at);
    }

    pub fn mark_match(&self, text: &str, at: DateTime<Utc>) {
        let mut fields = self.lock();
        fields.last_match = Some(text.to_string());
        fields.last_match_at = Some(at);
    }

    pub fn mark_send(&self, at: DateTime<Utc>) {
        self.lock().last_send = Some(at);
    }

    /// Record an error event; also bumps the lifetime error total
    pub fn mark_error(&self, message: &str, at: DateTime<Utc>) {
        let mut fields = self.lock();
        fields.last_error = Some(message.to_string());
        fields.last_error_at = Some(at);
        fields.total_errors += 1;
    }

    pub fn mark_healthcheck(&self, at: DateTime<Utc>) {
        self.lock().last_healthcheck = Some(at);
    }

    pub fn set_error_count(&self, error_count: u32) {
        self.lock().error_count = error_count;
    }

    /// Add a delivery record, evicting the oldest beyond capacity
    pub fn add_delivery(&self, record: DeliveryRecord) {
        if self.recent_max == 0 {
            return;
        }
        let mut fields = self.lock();
        if fields.recent.len() >= self.recent_max {
            fields.recent.pop_front();
        }
        fields.recent.push_back(record);
    }

    pub fn recent_deliveries(&self) -> Vec<DeliveryRecord> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let uptime_seconds = self.started_at.elapsed().as_secs();
        let fields = self.lock();
        StatusSnapshot {
            running: fields.running,
            paused: fields.paused,
            last_scan: fields.last_scan,
            last_match: fields.last_match.clone(),
            last_match_at: fields.last_match_at,
            last_send: fields.last_send,
            last_error: fields.last_error.clone(),
            last_error_at: fields.last_error_at,
            last_healthcheck: fields.last_healthcheck,
            uptime_seconds,
            error_count: fields.error_count,
            total_errors: fields.total_errors,
        }
    }
}

/// Thread-safe shared status handle
pub type StatusHandle = Arc<StatusStore>;

pub fn new_status_handle(recent_max: usize) -> StatusHandle {
    Arc::new(StatusStore::new(recent_max))
}
