//! External extraction tool access.
//!
//! [`ExternalToolInvoker`] runs the real binary. Everything above it talks to
//! a [`ToolRunner`] through a [`ToolClient`], which admits each call through
//! the shared rate limiter pool.

mod client;
mod error;
mod invoker;
mod locator;

use std::time::Duration;

use async_trait::async_trait;

pub use client::ToolClient;
pub use error::ToolError;
pub use invoker::ExternalToolInvoker;
pub use locator::{
    BinaryLocator, BinarySource, DEFAULT_BINARY_NAME, NoSettings, ResolvedBinary, ToolSettings,
    platform_binary_name,
};

/// Default cap on captured stdout (100 MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100 * 1024 * 1024;

/// Per-call limits for one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeOptions {
    /// Hard deadline after which the process is killed.
    pub timeout: Duration,
    /// Maximum stdout bytes kept; the rest is discarded.
    pub max_output_bytes: usize,
}

impl InvokeOptions {
    /// Creates options with `timeout` and the default output cap.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Overrides the stdout cap.
    #[must_use]
    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }
}

/// Runs the extraction tool with arguments and returns its stdout.
///
/// Implemented by [`ExternalToolInvoker`]; tests substitute scripted fakes.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Executes one invocation.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] classifying why the run failed.
    async fn run(&self, args: &[String], options: &InvokeOptions) -> Result<String, ToolError>;
}
