//! Request-facing facade over the store, cache and analytics.
//!
//! Every operation takes a [`Context`]; store work runs on the blocking pool
//! and the call returns early with [`Error::Cancelled`] or
//! [`Error::DeadlineExceeded`] when the context finishes first. Errors from
//! the store are logged and returned unchanged.

use std::sync::Arc;

use serde_json::json;

use crate::analytics::{AnalyticsComputer, AnalyticsSnapshot};
use crate::cache::AnalyticsCache;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, Observer};
use crate::storage::TaskStore;
use crate::task::{NewTask, Task, TaskFilter, TaskUpdate};

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    cache: Arc<dyn AnalyticsCache>,
    computer: AnalyticsComputer,
    observer: Arc<dyn Observer>,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, cache: Arc<dyn AnalyticsCache>, observer: Arc<dyn Observer>) -> Self {
        let computer = AnalyticsComputer::new(Arc::clone(&store));
        Self {
            store,
            cache,
            computer,
            observer,
        }
    }

    pub async fn create_task(&self, ctx: &Context, task: NewTask) -> Result<i64> {
        let store = Arc::clone(&self.store);
        let id = ctx
            .run_blocking(move || store.create(&task))
            .await
            .inspect_err(|err| log_failure(ctx, "create_task", err))?;

        self.emit(EventKind::TaskCreated, json!({ "id": id }));
        Ok(id)
    }

    pub async fn get_tasks(&self, ctx: &Context, filter: TaskFilter) -> Result<Vec<Task>> {
        let store = Arc::clone(&self.store);
        ctx.run_blocking(move || store.list(&filter))
            .await
            .inspect_err(|err| log_failure(ctx, "get_tasks", err))
    }

    /// Apply a partial update. Fields the store rejects come back as
    /// [`Error::Validation`].
    pub async fn update_task(&self, ctx: &Context, id: i64, update: TaskUpdate) -> Result<Task> {
        let store = Arc::clone(&self.store);
        let task = ctx
            .run_blocking(move || store.update(id, &update))
            .await
            .inspect_err(|err| log_failure(ctx, "update_task", err))?;

        self.emit(EventKind::TaskUpdated, json!({ "id": id }));
        Ok(task)
    }

    pub async fn delete_task(&self, ctx: &Context, id: i64) -> Result<()> {
        let store = Arc::clone(&self.store);
        ctx.run_blocking(move || store.delete(id))
            .await
            .inspect_err(|err| log_failure(ctx, "delete_task", err))?;

        self.emit(EventKind::TaskDeleted, json!({ "id": id }));
        Ok(())
    }

    /// Cached analytics, computed on the spot when the cache is empty.
    ///
    /// A cache read failure counts as a miss. The computed value is not
    /// written back; only the refresh job writes the cache.
    pub async fn get_analytics(&self, ctx: &Context) -> Result<AnalyticsSnapshot> {
        let cache = Arc::clone(&self.cache);
        match ctx.run_blocking(move || cache.get()).await {
            Ok(Some(snapshot)) => {
                self.emit(EventKind::AnalyticsCacheHit, json!({ "computed_at": snapshot.computed_at }));
                return Ok(snapshot);
            }
            Ok(None) => self.emit(EventKind::AnalyticsCacheMiss, json!({})),
            Err(err) if err.is_cancellation() => return Err(err),
            Err(err) => {
                tracing::warn!(request_id = %ctx.request_id(), error = %err, "analytics cache unavailable");
                self.emit(EventKind::AnalyticsCacheUnavailable, json!({ "error": err.to_string() }));
            }
        }

        self.compute_analytics(ctx).await
    }

    /// Compute a snapshot from the store, bypassing the cache.
    pub async fn compute_analytics(&self, ctx: &Context) -> Result<AnalyticsSnapshot> {
        let computer = self.computer.clone();
        ctx.run_blocking(move || computer.compute())
            .await
            .inspect_err(|err| log_failure(ctx, "get_analytics", err))
    }

    /// Insert every task or none. Returns the new ids in input order.
    pub async fn import_tasks(&self, ctx: &Context, tasks: Vec<NewTask>) -> Result<Vec<i64>> {
        let store = Arc::clone(&self.store);
        let ids = ctx
            .run_blocking(move || store.import_batch(&tasks))
            .await
            .inspect_err(|err| log_failure(ctx, "import_tasks", err))?;

        self.emit(EventKind::TasksImported, json!({ "count": ids.len() }));
        Ok(ids)
    }

    pub async fn export_tasks(&self, ctx: &Context) -> Result<Vec<Task>> {
        let store = Arc::clone(&self.store);
        let tasks = ctx
            .run_blocking(move || store.export_all())
            .await
            .inspect_err(|err| log_failure(ctx, "export_tasks", err))?;

        self.emit(EventKind::TasksExported, json!({ "count": tasks.len() }));
        Ok(tasks)
    }

    fn emit(&self, kind: EventKind, data: serde_json::Value) {
        self.observer.observe(&Event::new(kind).with_data(data));
    }
}

fn log_failure(ctx: &Context, operation: &str, err: &Error) {
    if err.is_cancellation() {
        tracing::debug!(request_id = %ctx.request_id(), operation, error = %err, "request abandoned");
    } else {
        tracing::error!(request_id = %ctx.request_id(), operation, error = %err, "request failed");
    }
}
