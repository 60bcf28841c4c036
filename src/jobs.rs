//! Periodic background jobs: analytics refresh and retention sweep.
//!
//! Each job runs one cycle per period, the first one a full period after
//! start. Failures inside a cycle are retried per [`RetryPolicy`], reported
//! to the observer and then dropped; nothing escapes the loop. Cancelling the
//! job's token stops the timer and abandons any in-flight cycle.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::analytics::{AnalyticsComputer, AnalyticsSnapshot};
use crate::cache::AnalyticsCache;
use crate::context::Context;
use crate::error::Error;
use crate::events::{Event, EventKind, Observer};
use crate::retry::{retry, RetryPolicy};
use crate::storage::TaskStore;

pub const REFRESH_JOB: &str = "refresh";
pub const SWEEP_JOB: &str = "sweep";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
}

/// Shared, lock-free job state.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn get(&self) -> JobState {
        match self.0.load(Ordering::Acquire) {
            0 => JobState::Idle,
            _ => JobState::Running,
        }
    }

    fn enter(&self) -> RunningGuard {
        self.0.store(1, Ordering::Release);
        RunningGuard(self.clone())
    }
}

/// Puts the state back to idle when a cycle ends or is dropped mid-flight.
struct RunningGuard(StateCell);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0 .0.store(0, Ordering::Release);
    }
}

/// Result of a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Refreshed(AnalyticsSnapshot),
    Swept { removed: usize },
    /// Retries ran out on `step`; nothing was changed by this cycle.
    Abandoned { step: &'static str, attempts: u32, error: String },
    Cancelled,
}

#[derive(Clone)]
pub struct RefreshJob {
    computer: AnalyticsComputer,
    cache: Arc<dyn AnalyticsCache>,
    policy: RetryPolicy,
    observer: Arc<dyn Observer>,
    state: StateCell,
}

impl RefreshJob {
    pub fn new(
        computer: AnalyticsComputer,
        cache: Arc<dyn AnalyticsCache>,
        policy: RetryPolicy,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            computer,
            cache,
            policy,
            observer,
            state: StateCell::default(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }

    /// Compute a snapshot and store it. The cache is only written after a
    /// successful compute, so a failing cycle keeps the previous snapshot.
    pub async fn run_cycle(&self, ctx: &Context) -> CycleOutcome {
        let _running = self.state.enter();
        let reporter = Reporter::new(REFRESH_JOB, &self.observer, self.policy);
        reporter.started();

        let computed = retry(
            ctx,
            self.policy,
            || {
                let computer = self.computer.clone();
                ctx.run_blocking(move || computer.compute())
            },
            |attempt, err| reporter.attempt_failed("compute", attempt, err),
        )
        .await;
        let snapshot = match computed {
            Ok(snapshot) => snapshot,
            Err(err) => return reporter.abandoned("compute", err),
        };

        let stored = retry(
            ctx,
            self.policy,
            || {
                let cache = Arc::clone(&self.cache);
                let snapshot = snapshot.clone();
                ctx.run_blocking(move || cache.set(&snapshot))
            },
            |attempt, err| reporter.attempt_failed("cache_set", attempt, err),
        )
        .await;
        if let Err(err) = stored {
            return reporter.abandoned("cache_set", err);
        }

        reporter.completed(json!({
            "done": snapshot.done,
            "in_progress": snapshot.in_progress,
            "pending": snapshot.pending,
        }));
        CycleOutcome::Refreshed(snapshot)
    }

    /// Start the periodic loop on the current runtime.
    pub fn spawn(&self, period: Duration, token: CancellationToken) -> JobHandle {
        let job = self.clone();
        let ctx = Context::from_token(token.child_token());
        spawn_periodic(REFRESH_JOB, period, token, self.state.clone(), move || {
            let job = job.clone();
            let ctx = ctx.clone();
            async move { job.run_cycle(&ctx).await }
        })
    }
}

#[derive(Clone)]
pub struct SweepJob {
    store: Arc<dyn TaskStore>,
    policy: RetryPolicy,
    observer: Arc<dyn Observer>,
    state: StateCell,
}

impl SweepJob {
    pub fn new(store: Arc<dyn TaskStore>, policy: RetryPolicy, observer: Arc<dyn Observer>) -> Self {
        Self {
            store,
            policy,
            observer,
            state: StateCell::default(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }

    /// Delete overdue unfinished tasks.
    pub async fn run_cycle(&self, ctx: &Context) -> CycleOutcome {
        let _running = self.state.enter();
        let reporter = Reporter::new(SWEEP_JOB, &self.observer, self.policy);
        reporter.started();

        let swept = retry(
            ctx,
            self.policy,
            || {
                let store = Arc::clone(&self.store);
                ctx.run_blocking(move || store.delete_stale())
            },
            |attempt, err| reporter.attempt_failed("delete_stale", attempt, err),
        )
        .await;

        match swept {
            Ok(removed) => {
                reporter.completed(json!({ "removed": removed }));
                CycleOutcome::Swept { removed }
            }
            Err(err) => reporter.abandoned("delete_stale", err),
        }
    }

    pub fn spawn(&self, period: Duration, token: CancellationToken) -> JobHandle {
        let job = self.clone();
        let ctx = Context::from_token(token.child_token());
        spawn_periodic(SWEEP_JOB, period, token, self.state.clone(), move || {
            let job = job.clone();
            let ctx = ctx.clone();
            async move { job.run_cycle(&ctx).await }
        })
    }
}

/// Handle to a spawned job loop.
pub struct JobHandle {
    name: &'static str,
    state: StateCell,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop. An in-flight cycle is dropped, not awaited.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the loop task to exit after [`JobHandle::stop`].
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                tracing::error!(job = self.name, error = %err, "job task panicked");
            }
        }
    }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    token: CancellationToken,
    state: StateCell,
    mut cycle: F,
) -> JobHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = CycleOutcome> + Send + 'static,
{
    let loop_token = token.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(job = name, period_secs = period.as_secs(), "job started");

        loop {
            tokio::select! {
                biased;
                _ = loop_token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = loop_token.cancelled() => break,
                outcome = cycle() => {
                    tracing::debug!(job = name, outcome = ?outcome, "job cycle finished");
                }
            }
        }

        tracing::info!(job = name, "job stopped");
    });

    JobHandle {
        name,
        state,
        token,
        task,
    }
}

/// Emits job lifecycle events.
struct Reporter<'a> {
    job: &'static str,
    observer: &'a Arc<dyn Observer>,
    policy: RetryPolicy,
}

impl<'a> Reporter<'a> {
    fn new(job: &'static str, observer: &'a Arc<dyn Observer>, policy: RetryPolicy) -> Self {
        Self { job, observer, policy }
    }

    fn started(&self) {
        self.observer
            .observe(&Event::new(EventKind::JobCycleStarted).with_data(json!({ "job": self.job })));
    }

    fn attempt_failed(&self, step: &str, attempt: u32, err: &Error) {
        self.observer.observe(&Event::new(EventKind::JobAttemptFailed).with_data(json!({
            "job": self.job,
            "step": step,
            "attempt": attempt,
            "max_attempts": self.policy.attempts,
            "error": err.to_string(),
        })));
    }

    fn completed(&self, mut data: serde_json::Value) {
        data["job"] = json!(self.job);
        self.observer
            .observe(&Event::new(EventKind::JobCycleCompleted).with_data(data));
    }

    fn abandoned(&self, step: &'static str, err: Error) -> CycleOutcome {
        if err.is_cancellation() {
            return CycleOutcome::Cancelled;
        }
        self.observer.observe(&Event::new(EventKind::JobCycleAbandoned).with_data(json!({
            "job": self.job,
            "step": step,
            "attempts": self.policy.attempts,
            "error": err.to_string(),
        })));
        CycleOutcome::Abandoned {
            step,
            attempts: self.policy.attempts,
            error: err.to_string(),
        }
    }
}
