//! Asynchronous reconciliation primitives
//!
//! The small set of building blocks every resource handler's Create/Update/
//! Delete path is made of: authenticated request execution with bounded
//! retry ([`executor::execute`]), polling a remote entity until it reaches a
//! target state ([`poller::poll_until`]), and polling until a remote entity
//! is confirmed absent ([`poller::poll_until_deletion`]).
//!
//! All primitives are sequential: one in-flight request, one timer. The only
//! suspension points are remote I/O and the inter-poll sleep, and both are
//! bounded by the caller's [`Deadline`]. Dropping a returned future cancels
//! the primitive within one timer tick.

pub mod executor;
pub mod poller;

pub use executor::execute;
pub use poller::{poll_until, poll_until_deletion, AbsencePolicy, PollSpec};

use std::time::Duration;
use tokio::time::Instant;

/// Absolute expiry for one provider operation, derived from the caller's
/// per-action timeout configuration
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Whether the deadline has passed
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left until expiry (zero once expired)
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Sleep for `duration`, but never past the deadline.
    ///
    /// Returns `false` if the deadline has been reached, `true` if the full
    /// duration elapsed with time to spare.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let wake = Instant::now() + duration;
        tokio::time::sleep_until(wake.min(self.at)).await;
        !self.expired()
    }
}

/// Retry configuration for the authenticated executor
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts for transient failures
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry following failed attempt number `attempt`
    /// (zero-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}
