//! Request-scoped cancellation and deadlines.
//!
//! Every facade call takes a [`Context`]. Store work runs on the blocking
//! pool and the caller gets control back as soon as the context is cancelled
//! or its deadline passes. The abandoned store call still runs to
//! completion in the background; the store's own atomicity keeps that safe.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Context {
    request_id: Uuid,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled unless [`Context::cancel`] is called.
    pub fn background() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().with_deadline(Instant::now() + timeout)
    }

    /// Tighten the deadline. A later deadline than the current one is ignored.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Derive a context that is cancelled along with `self` but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Wrap an existing token, e.g. one owned by a process lifecycle.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            token,
            deadline: None,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => Error::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Run blocking store work, returning early if the context finishes first.
    pub async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.check()?;
        let handle = tokio::task::spawn_blocking(work);
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            joined = handle => joined.map_err(|err| {
                Error::OperationFailed(format!("store task failed: {err}"))
            })?,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_work_returns_value() {
        let ctx = Context::background();
        let value = ctx.run_blocking(|| Ok(41 + 1)).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn cancelled_context_rejects_before_running() {
        let ctx = Context::background();
        ctx.cancel();
        let result = ctx.run_blocking(|| Ok(())).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_work() {
        let ctx = Context::with_timeout(Duration::from_millis(20));
        let result = ctx
            .run_blocking(|| {
                std::thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn child_follows_parent_cancellation() {
        let parent = Context::background();
        let child = parent.child();
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
        assert_ne!(parent.request_id(), child.request_id());
    }

    #[test]
    fn with_deadline_keeps_the_earlier_one() {
        let early = Instant::now() + Duration::from_secs(1);
        let late = early + Duration::from_secs(10);
        let ctx = Context::background().with_deadline(early).with_deadline(late);
        assert_eq!(ctx.deadline(), Some(early));
    }
}
