//! Bounded polling primitives.
//!
//! Every phase of session startup waits on some externally observable
//! condition (a process appearing, a filesystem mounting, a UI state
//! changing). All of those waits go through the single [`wait_for`]
//! utility here: a bounded loop that re-evaluates an async predicate at a
//! fixed interval until it produces a value or the deadline expires.
//!
//! There are no parallel polls and no overlapping waits within one
//! session; cancellation is expressed purely through the per-wait timeout.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::{Error, Result};

// ============================================================================
// RetryPolicy
// ============================================================================

/// Interval and deadline for one bounded wait.
///
/// Policies are plain values; no state is retained across separate waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between predicate evaluations.
    pub poll_interval: Duration,

    /// Total time budget for the wait.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Default delay between predicate evaluations.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Creates a policy with an explicit interval and timeout.
    #[inline]
    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Creates a policy with the default interval and a timeout in seconds.
    #[inline]
    #[must_use]
    pub const fn timeout_secs(secs: u64) -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Duration::from_secs(secs),
        }
    }

    /// Timeout in whole milliseconds, for error reporting.
    #[inline]
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

// ============================================================================
// Polling
// ============================================================================

/// Polls `predicate` until it yields a value or the policy deadline expires.
///
/// The predicate is re-evaluated once per `poll_interval`:
///
/// - `Ok(Some(value))` completes the wait with `value`
/// - `Ok(None)` re-polls after the interval
/// - `Err(e)` aborts the wait immediately with `e`
///
/// The predicate is always evaluated at least once, even with a zero
/// timeout.
///
/// # Errors
///
/// Returns [`Error::Timeout`] naming `operation` if the deadline expires.
pub async fn wait_for<F, Fut, T>(policy: RetryPolicy, operation: &str, mut predicate: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + policy.timeout;

    loop {
        if let Some(value) = predicate().await? {
            return Ok(value);
        }

        if Instant::now() >= deadline {
            return Err(Error::timeout(operation, policy.timeout_ms()));
        }

        sleep(policy.poll_interval).await;
    }
}

/// Boolean convenience wrapper over [`wait_for`].
///
/// # Errors
///
/// Returns [`Error::Timeout`] naming `operation` if the condition does not
/// hold within the deadline.
pub async fn wait_until<F, Fut>(policy: RetryPolicy, operation: &str, mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    wait_for(policy, operation, || {
        let fut = condition();
        async move { Ok(fut.await?.then_some(())) }
    })
    .await
}

// ============================================================================
// Tests
// ============================================================================
