//! Best-effort status dump for tray icons, consoles and monitoring

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persist::write_json_atomic;
use crate::policy::to_ascii_safe;
use crate::status::StatusSnapshot;

/// What lands in the telemetry file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(flatten)]
    pub status: StatusSnapshot,
    pub updated_at: DateTime<Utc>,
    pub last_match_ascii: Option<String>,
    pub last_error_ascii: Option<String>,
}

impl TelemetryRecord {
    pub fn new(status: StatusSnapshot, updated_at: DateTime<Utc>) -> Self {
        let last_match_ascii = status.last_match.as_deref().map(to_ascii_safe);
        let last_error_ascii = status.last_error.as_deref().map(to_ascii_safe);
        Self {
            status,
            updated_at,
            last_match_ascii,
            last_error_ascii,
        }
    }
}

/// Overwrites the telemetry file each cycle. Disabled when no path is set.
#[derive(Debug, Clone, Default)]
pub struct TelemetryWriter {
    path: Option<PathBuf>,
}

impl TelemetryWriter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Write the snapshot. Failures are logged and otherwise ignored.
    pub fn write(&self, status: StatusSnapshot) {
        let Some(path) = &self.path else {
            return;
        };
        let record = TelemetryRecord::new(status, Utc::now());
        if let Err(e) = write_json_atomic(path, &record) {
            tracing::warn!("Failed to write telemetry to {:?}: {}", path, e);
        }
    }
}
