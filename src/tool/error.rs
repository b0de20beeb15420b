//! Error types for external tool invocation.
//!
//! Every failure of a single tool run maps to one [`ToolError`] variant so
//! callers can classify it without parsing message text.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Maximum stderr characters kept in a [`ToolError::ProcessExecution`] message.
const STDERR_PREVIEW_CHARS: usize = 500;

/// Errors that can occur while running the extraction tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The resolved executable does not exist or is not on `PATH`.
    #[error("extraction tool not found at {path}")]
    BinaryNotFound {
        /// The path (or bare program name) that could not be launched.
        path: PathBuf,
    },

    /// The process could not be started for a reason other than a missing binary.
    #[error("failed to start {path}: {source}")]
    Spawn {
        /// The program that failed to start.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its timeout and was killed.
    #[error("extraction tool timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The process exited unsuccessfully.
    #[error("extraction tool exited with {}: {}", exit_label(.code), stderr_preview(.stderr))]
    ProcessExecution {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Reading the process pipes failed.
    #[error("IO error reading extraction tool output: {0}")]
    Io(#[source] std::io::Error),
}

impl ToolError {
    /// Creates a process execution error.
    pub fn process_execution(code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ProcessExecution {
            code,
            stderr: stderr.into(),
        }
    }

    /// Returns captured stderr for process execution failures.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ProcessExecution { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }

    /// Returns whether this error is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| format!("code {code}"))
}

fn stderr_preview(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "(no stderr)".to_string();
    }
    if trimmed.chars().count() > STDERR_PREVIEW_CHARS {
        let head: String = trimmed.chars().take(STDERR_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}
