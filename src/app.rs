//! Process wiring: builds the store, cache, observer, services and jobs from
//! a [`Config`] and owns the shutdown token.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::analytics::AnalyticsComputer;
use crate::cache::{AnalyticsCache, FileCache, MemoryCache};
use crate::config::{CacheBackend, Config};
use crate::error::Result;
use crate::events::{EventDestination, Fanout, JsonlObserver, Observer, TracingObserver};
use crate::jobs::{JobHandle, RefreshJob, SweepJob};
use crate::service::TaskService;
use crate::storage::SqliteStore;
use crate::user::UserService;

pub struct App {
    store: Arc<SqliteStore>,
    tasks: TaskService,
    users: UserService,
    refresh: RefreshJob,
    sweep: SweepJob,
    refresh_period: Duration,
    sweep_period: Duration,
    shutdown: CancellationToken,
    handles: Vec<JobHandle>,
}

impl App {
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(SqliteStore::open(config.database_path())?);

        let cache: Arc<dyn AnalyticsCache> = match config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCache::new()),
            CacheBackend::File => {
                Arc::new(FileCache::new(config.cache_dir()).with_lock_timeout(config.cache.lock_timeout_ms))
            }
        };

        let mut fanout = Fanout::new().with(Arc::new(TracingObserver));
        if let Some(destination) = EventDestination::parse(config.log.events.as_deref()) {
            let destination = match destination {
                EventDestination::File(path) => EventDestination::File(config.resolve(&path)),
                other => other,
            };
            fanout = fanout.with(Arc::new(JsonlObserver::new(destination.open()?)));
        }
        let observer: Arc<dyn Observer> = Arc::new(fanout);

        Self::with_parts(store, cache, observer, config)
    }

    /// Assemble from already-built parts. Used by [`App::open`] and by
    /// callers that bring their own cache or observer.
    pub fn with_parts(
        store: Arc<SqliteStore>,
        cache: Arc<dyn AnalyticsCache>,
        observer: Arc<dyn Observer>,
        config: &Config,
    ) -> Result<Self> {
        let tasks = TaskService::new(store.clone(), Arc::clone(&cache), Arc::clone(&observer));
        let users = UserService::new(store.clone());
        let refresh = RefreshJob::new(
            AnalyticsComputer::new(store.clone()),
            cache,
            config.refresh.policy()?,
            Arc::clone(&observer),
        );
        let sweep = SweepJob::new(store.clone(), config.sweep.policy()?, observer);

        Ok(Self {
            store,
            tasks,
            users,
            refresh,
            sweep,
            refresh_period: config.refresh_period()?,
            sweep_period: config.sweep_period()?,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
        })
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn refresh_job(&self) -> &RefreshJob {
        &self.refresh
    }

    pub fn sweep_job(&self) -> &SweepJob {
        &self.sweep
    }

    /// Spawn both periodic jobs on the current runtime. Calling it again
    /// while jobs are running is a no-op.
    pub fn start_jobs(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        self.handles.push(
            self.refresh
                .spawn(self.refresh_period, self.shutdown.child_token()),
        );
        self.handles
            .push(self.sweep.spawn(self.sweep_period, self.shutdown.child_token()));
        tracing::info!(
            refresh_secs = self.refresh_period.as_secs(),
            sweep_secs = self.sweep_period.as_secs(),
            "background jobs started"
        );
    }

    pub fn jobs(&self) -> &[JobHandle] {
        &self.handles
    }

    /// Token cancelled by [`App::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the timers and wait for the loops to exit. In-flight cycles are
    /// dropped, not finished.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        for handle in self.handles.drain(..) {
            handle.join().await;
        }
        tracing::info!("background jobs stopped");
    }
}
