//! Rate-limited handle on a [`ToolRunner`].

use std::sync::Arc;

use tracing::instrument;

use super::{InvokeOptions, ToolError, ToolRunner};
use crate::rate_limiter::{RateLimiter, TOOL_EXEC_POOL};

/// Explicitly constructed tool client shared by the extractors.
///
/// Cloning is cheap; clones share the runner and the limiter, so every call
/// through any clone counts against the same pool.
#[derive(Clone)]
pub struct ToolClient {
    runner: Arc<dyn ToolRunner>,
    limiter: Arc<RateLimiter>,
    pool: String,
}

impl std::fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolClient")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ToolClient {
    /// Creates a client admitting calls through [`TOOL_EXEC_POOL`].
    #[must_use]
    pub fn new(runner: Arc<dyn ToolRunner>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            runner,
            limiter,
            pool: TOOL_EXEC_POOL.to_string(),
        }
    }

    /// Routes calls through a different limiter pool.
    #[must_use]
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = pool.into();
        self
    }

    /// Returns the limiter pool this client uses.
    #[must_use]
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Waits for rate-limit admission, then runs the tool.
    ///
    /// # Errors
    ///
    /// Returns the runner's [`ToolError`] unchanged.
    #[instrument(skip(self, args, options), fields(pool = %self.pool))]
    pub async fn invoke(&self, args: &[String], options: &InvokeOptions) -> Result<String, ToolError> {
        let runner = Arc::clone(&self.runner);
        self.limiter
            .execute(&self.pool, || async move { runner.run(args, options).await })
            .await
    }
}
