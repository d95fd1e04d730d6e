//! Scanner trait and the portable scanners
//!
//! A scanner produces the text snippets currently visible on the monitored
//! surface. How it gets them (window automation, OCR, a dump file, a helper
//! program) is its own business.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

use crate::policy::MatchFilter;
use crate::WatchError;

/// Placeholder in command arguments replaced by the target pattern
const TARGET_PLACEHOLDER: &str = "{target}";

/// Trait for reading text snippets from the monitored surface
#[async_trait]
pub trait Scanner: Send + Sync + std::fmt::Debug {
    /// Get the scanner type name (e.g. "file")
    fn type_name(&self) -> &str;

    /// Return the snippets currently matching `pattern`.
    ///
    /// `WatchError::SurfaceUnavailable` means the surface could not be found
    /// this time; any other error is an unexpected fault.
    async fn scan(&self, pattern: &str) -> crate::Result<Vec<String>>;
}

fn matching_lines(text: &str, pattern: &str) -> crate::Result<Vec<String>> {
    let filter = MatchFilter::new(pattern)?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| filter.is_match(line))
        .map(str::to_string)
        .collect())
}

/// Reads a text file that an external agent keeps filled with the window text
#[derive(Debug)]
pub struct FileScanner {
    path: PathBuf,
}

impl FileScanner {
    pub fn new(path: PathBuf) -> Self {
        tracing::debug!("Created FileScanner for {:?}", path);
        Self { path }
    }
}

#[async_trait]
impl Scanner for FileScanner {
    fn type_name(&self) -> &str {
        "file"
    }

    async fn scan(&self, pattern: &str) -> crate::Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WatchError::SurfaceUnavailable(format!(
                    "{} not found",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(WatchError::Scanner(format!(
                    "reading {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        matching_lines(&content, pattern)
    }
}

/// Runs a helper program and treats each stdout line as a snippet
#[derive(Debug)]
pub struct CommandScanner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandScanner {
    /// `{target}` in any argument is replaced by `target`
    pub fn new(program: &str, args: &[String], target: &str, timeout: Duration) -> Self {
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.replace(TARGET_PLACEHOLDER, target))
            .collect();
        tracing::debug!("Created CommandScanner '{}' with args {:?}", program, args);
        Self {
            program: program.to_string(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    fn type_name(&self) -> &str {
        "command"
    }

    async fn scan(&self, pattern: &str) -> crate::Result<Vec<String>> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                WatchError::Scanner(format!(
                    "'{}' did not finish within {:?}",
                    self.program, self.timeout
                ))
            })?
            .map_err(|e| WatchError::Scanner(format!("failed to run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WatchError::SurfaceUnavailable(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        matching_lines(&stdout, pattern)
    }
}
