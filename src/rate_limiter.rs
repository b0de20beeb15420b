//! Per-pool rate limiting for external tool invocations.
//!
//! This module provides the [`RateLimiter`] struct which enforces, for each named
//! pool, a sliding-window request cap and a minimum cooldown between consecutive
//! requests. Every call to the extraction tool is admitted through a pool so the
//! remote service never sees bursts above policy.
//!
//! # Overview
//!
//! Each pool has an immutable [`RateLimitPolicy`] and a ledger of request
//! timestamps. Pools are independent: admission in one pool never waits on
//! another. Within one pool, [`RateLimiter::wait_for_rate_limit`] runs
//! "compute wait, sleep, record" as a single unit under a per-pool async mutex,
//! so concurrent callers are admitted one at a time.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use playlist_sync_core::rate_limiter::{RateLimitPolicy, RateLimiter, TOOL_EXEC_POOL};
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new());
//! limiter.register_pool(TOOL_EXEC_POOL, RateLimitPolicy::new(10, 1, 500));
//!
//! let answer = limiter.execute(TOOL_EXEC_POOL, || async { 42 }).await;
//! assert_eq!(answer, 42);
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Pool name shared by every playlist/video tool invocation.
pub const TOOL_EXEC_POOL: &str = "tool-exec";

/// Default maximum requests per window for the tool pool.
pub const DEFAULT_MAX_REQUESTS: u32 = 20;

/// Default window length, in minutes, for the tool pool.
pub const DEFAULT_WINDOW_MINUTES: u32 = 1;

/// Default cooldown between consecutive tool requests, in milliseconds.
pub const DEFAULT_COOLDOWN_MS: u64 = 1000;

/// Rate limit settings for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum number of requests allowed inside one window.
    pub max_requests: u32,
    /// Window length in minutes.
    pub per_minute_window: u32,
    /// Minimum delay between two consecutive requests, in milliseconds.
    pub cooldown_ms: u64,
}

impl RateLimitPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_requests: u32, per_minute_window: u32, cooldown_ms: u64) -> Self {
        Self {
            max_requests,
            per_minute_window,
            cooldown_ms,
        }
    }

    /// Sliding window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.per_minute_window) * 60)
    }

    /// Requests admitted per window. A `max_requests` of 0 counts as 1.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_requests.max(1) as usize
    }

    /// Minimum spacing between consecutive requests.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_REQUESTS,
            DEFAULT_WINDOW_MINUTES,
            DEFAULT_COOLDOWN_MS,
        )
    }
}

/// Per-pool rate limiter for tool invocations.
///
/// Designed to be wrapped in `Arc` and shared by every component that talks to
/// the extraction tool. Policies live in a `DashMap`; each pool's ledger sits
/// behind a short-lived `std::sync::Mutex` (never held across an await) and the
/// admission sequence is serialized by a `tokio::sync::Mutex` per pool.
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Registered policies by pool name.
    policies: DashMap<String, RateLimitPolicy>,

    /// Per-pool state. Uses Arc so the `DashMap` shard lock can be released
    /// before awaiting on the admission mutex.
    pools: DashMap<String, Arc<PoolState>>,
}

/// State tracked for each pool.
#[derive(Debug, Default)]
struct PoolState {
    /// Request timestamps, oldest first.
    ledger: Mutex<VecDeque<Instant>>,

    /// Held for the whole wait-then-record sequence.
    admission: tokio::sync::Mutex<()>,
}

impl PoolState {
    fn ledger(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RateLimiter {
    /// Creates a rate limiter with no registered pools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rate limiter with the tool pool registered under `policy`.
    #[must_use]
    #[instrument(skip_all, fields(max_requests = policy.max_requests, cooldown_ms = policy.cooldown_ms))]
    pub fn with_tool_pool(policy: RateLimitPolicy) -> Self {
        debug!("creating rate limiter");
        let limiter = Self::new();
        limiter.register_pool(TOOL_EXEC_POOL, policy);
        limiter
    }

    /// Registers `policy` for `name`, replacing any earlier policy.
    ///
    /// The ledger survives re-registration; only the limits change.
    pub fn register_pool(&self, name: &str, policy: RateLimitPolicy) {
        debug!(pool = name, ?policy, "registering rate limit pool");
        self.policies.insert(name.to_string(), policy);
    }

    /// Returns the policy registered for `name`, if any.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<RateLimitPolicy> {
        self.policies.get(name).map(|entry| *entry.value())
    }

    /// Returns whether the window of `name` still has room for a request.
    ///
    /// Unregistered pools always allow requests (fail-open) and log a warning.
    #[must_use]
    pub fn can_make_request(&self, name: &str) -> bool {
        let Some(policy) = self.policy(name) else {
            warn!(pool = name, "rate limit pool not registered, allowing request");
            return true;
        };

        let state = self.state(name);
        let mut ledger = state.ledger();
        prune(&mut ledger, policy.window(), Instant::now());
        in_window_count(&ledger) < policy.capacity()
    }

    /// Returns how long a caller must wait before the next request in `name`.
    ///
    /// Cooldown takes precedence over window occupancy. Never negative.
    #[must_use]
    pub fn time_until_next_request(&self, name: &str) -> Duration {
        let Some(policy) = self.policy(name) else {
            warn!(pool = name, "rate limit pool not registered, no wait applied");
            return Duration::ZERO;
        };

        let state = self.state(name);
        let mut ledger = state.ledger();
        compute_wait(&mut ledger, &policy, Instant::now())
    }

    /// Appends the current time to the ledger of `name`.
    pub fn record_request(&self, name: &str) {
        let state = self.state(name);
        state.ledger().push_back(Instant::now());
    }

    /// Waits until `name` admits a request, then records it.
    ///
    /// Callers on the same pool are admitted one at a time through the whole
    /// sequence, so the policy holds under concurrency.
    #[instrument(skip(self))]
    pub async fn wait_for_rate_limit(&self, name: &str) {
        let state = self.state(name);
        let _admission = state.admission.lock().await;

        // Cooldown and window can each impose a wait; admit only once both are clear.
        loop {
            let wait = self.time_until_next_request(name);
            if wait.is_zero() {
                break;
            }
            debug!(pool = name, wait_ms = wait.as_millis(), "applying rate limit delay");
            tokio::time::sleep(wait).await;
        }

        state.ledger().push_back(Instant::now());
    }

    /// Waits for admission in `name`, then runs `f`.
    ///
    /// Whatever `f` returns, errors included, is passed through unchanged.
    pub async fn execute<F, Fut, T>(&self, name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.wait_for_rate_limit(name).await;
        f().await
    }

    /// Get or create pool state, cloning the Arc to release the `DashMap` lock.
    fn state(&self, name: &str) -> Arc<PoolState> {
        self.pools
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(PoolState::default()))
            .clone()
    }
}

/// Drops timestamps that have aged out of `window`.
fn prune(ledger: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(oldest) = ledger.front() {
        if now.saturating_duration_since(*oldest) >= window {
            ledger.pop_front();
        } else {
            break;
        }
    }
}

fn in_window_count(ledger: &VecDeque<Instant>) -> usize {
    ledger.len()
}

fn compute_wait(
    ledger: &mut VecDeque<Instant>,
    policy: &RateLimitPolicy,
    now: Instant,
) -> Duration {
    let Some(last) = ledger.back().copied() else {
        return Duration::ZERO;
    };

    let since_last = now.saturating_duration_since(last);
    let cooldown = policy.cooldown();
    if since_last < cooldown {
        return cooldown - since_last;
    }

    let window = policy.window();
    prune(ledger, window, now);
    if in_window_count(ledger) >= policy.capacity() {
        if let Some(oldest) = ledger.front() {
            return (*oldest + window).saturating_duration_since(now);
        }
    }

    Duration::ZERO
}
