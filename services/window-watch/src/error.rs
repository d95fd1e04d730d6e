//! Error types for the window watch service

/// Errors that can occur in the window watch service
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Sender error: {0}")]
    Sender(String),

    #[error("Dashboard error: {0}")]
    Dashboard(String),
}

impl WatchError {
    /// True when the monitored surface could not be found this time around.
    ///
    /// Everything else is an unexpected fault. The loop currently handles both
    /// the same way.
    pub fn is_transient(&self) -> bool {
        matches!(self, WatchError::SurfaceUnavailable(_))
    }
}

impl From<tempfile::PersistError> for WatchError {
    fn from(e: tempfile::PersistError) -> Self {
        WatchError::Io(e.error)
    }
}

/// Result type alias for window watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
