//! Bounded retry with a fixed delay.

use std::future::Future;
use std::time::Duration;

use crate::context::Context;
use crate::error::{Error, Result};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never below 1.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// `on_failure` sees every failed attempt (1-based). The last error is
/// returned once attempts run out. Cancellation errors and a finished
/// `ctx` stop the loop immediately without further attempts.
pub async fn retry<T, F, Fut, L>(ctx: &Context, policy: RetryPolicy, mut op: F, mut on_failure: L) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    L: FnMut(u32, &Error),
{
    let mut attempt = 1;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_cancellation() => return Err(err),
            Err(err) => err,
        };

        on_failure(attempt, &err);
        if attempt >= policy.attempts {
            return Err(err);
        }
        attempt += 1;

        tokio::select! {
            biased;
            done = ctx.done() => return Err(done),
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}
