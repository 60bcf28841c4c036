#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_cmd::Command;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use tasklens::analytics::{AnalyticsSnapshot, StatusCounts, WeeklyReport};
use tasklens::cache::AnalyticsCache;
use tasklens::error::{Error, Result};
use tasklens::storage::{SqliteStore, TaskStore};
use tasklens::task::{NewTask, Task, TaskFilter, TaskUpdate};

/// Temp directory holding a fresh SQLite store.
pub struct TestEnv {
    dir: TempDir,
    store: Arc<SqliteStore>,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let store = SqliteStore::open(dir.path().join("tasks.db")).expect("open store");
        Self {
            dir,
            store: Arc::new(store),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("tasks.db")
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Config used by CLI tests: file cache inside the temp dir and fast
    /// retries.
    pub fn write_cli_config(&self) -> std::io::Result<PathBuf> {
        self.write_file(
            "tasklens.toml",
            r#"
[database]
path = "tasks.db"

[cache]
backend = "file"
dir = "cache"

[refresh]
retry_delay = "10ms"

[sweep]
retry_delay = "10ms"
"#,
        )
    }

    /// `tasklens` binary pointed at this environment.
    pub fn cmd(&self) -> Command {
        let config = self.write_cli_config().expect("write config");
        self.cmd_with_config(config)
    }

    /// `tasklens` binary using the given config file as-is.
    pub fn cmd_with_config(&self, config: PathBuf) -> Command {
        let mut cmd = Command::cargo_bin("tasklens").expect("binary");
        cmd.current_dir(self.path())
            .env("TASKLENS_CONFIG", config)
            .env_remove("TASKLENS_DB")
            .env_remove("TASKLENS_EVENTS")
            .env_remove("TASKLENS_TIMEOUT")
            .env_remove("TASKLENS_PASSWORD")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn add(&self, task: NewTask) -> i64 {
        self.store.create(&task).expect("create task")
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

pub fn days_ahead(days: i64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::days(days)
}

pub fn snapshot(done: u64) -> AnalyticsSnapshot {
    AnalyticsSnapshot::from_parts(
        StatusCounts {
            done,
            in_progress: 0,
            pending: 0,
        },
        WeeklyReport::default(),
        0.0,
    )
}

/// Store wrapper that fails the next `n` calls of selected operations, and
/// can slow down listing.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    analytics_failures: AtomicU32,
    sweep_failures: AtomicU32,
    list_delay: Mutex<Option<Duration>>,
    analytics_calls: AtomicU32,
    sweep_calls: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            analytics_failures: AtomicU32::new(0),
            sweep_failures: AtomicU32::new(0),
            list_delay: Mutex::new(None),
            analytics_calls: AtomicU32::new(0),
            sweep_calls: AtomicU32::new(0),
        }
    }

    pub fn fail_analytics(&self, times: u32) {
        self.analytics_failures.store(times, Ordering::SeqCst);
    }

    pub fn fail_sweeps(&self, times: u32) {
        self.sweep_failures.store(times, Ordering::SeqCst);
    }

    pub fn slow_list(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn analytics_calls(&self) -> u32 {
        self.analytics_calls.load(Ordering::SeqCst)
    }

    pub fn sweep_calls(&self) -> u32 {
        self.sweep_calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(counter: &AtomicU32) -> Result<()> {
        let remaining = counter.load(Ordering::SeqCst);
        if remaining > 0 {
            counter.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::OperationFailed("injected store failure".to_string()));
        }
        Ok(())
    }
}

impl TaskStore for FlakyStore {
    fn create(&self, task: &NewTask) -> Result<i64> {
        self.inner.create(task)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.inner.list(filter)
    }

    fn update(&self, id: i64, update: &TaskUpdate) -> Result<Task> {
        self.inner.update(id, update)
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id)
    }

    fn delete_stale(&self) -> Result<usize> {
        self.sweep_calls.fetch_add(1, Ordering::SeqCst);
        Self::maybe_fail(&self.sweep_failures)?;
        self.inner.delete_stale()
    }

    fn import_batch(&self, tasks: &[NewTask]) -> Result<Vec<i64>> {
        self.inner.import_batch(tasks)
    }

    fn export_all(&self) -> Result<Vec<Task>> {
        self.inner.export_all()
    }

    fn count_by_status(&self) -> Result<StatusCounts> {
        self.inner.count_by_status()
    }

    fn count_weekly(&self) -> Result<WeeklyReport> {
        self.analytics_calls.fetch_add(1, Ordering::SeqCst);
        Self::maybe_fail(&self.analytics_failures)?;
        self.inner.count_weekly()
    }

    fn avg_completion_secs(&self) -> Result<f64> {
        self.inner.avg_completion_secs()
    }
}

/// In-memory cache whose reads and writes can be made to fail.
#[derive(Default)]
pub struct ScriptedCache {
    slot: Mutex<Option<AnalyticsSnapshot>>,
    fail_reads: Mutex<bool>,
    write_failures: AtomicU32,
    writes: AtomicU32,
}

impl ScriptedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(snapshot: AnalyticsSnapshot) -> Self {
        let cache = Self::default();
        *cache.slot.lock().unwrap() = Some(snapshot);
        cache
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn fail_writes(&self, times: u32) {
        self.write_failures.store(times, Ordering::SeqCst);
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<AnalyticsSnapshot> {
        self.slot.lock().unwrap().clone()
    }
}

impl AnalyticsCache for ScriptedCache {
    fn get(&self) -> Result<Option<AnalyticsSnapshot>> {
        if *self.fail_reads.lock().unwrap() {
            return Err(Error::Cache("injected read failure".to_string()));
        }
        Ok(self.current())
    }

    fn set(&self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let remaining = self.write_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.write_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Cache("injected write failure".to_string()));
        }
        *self.slot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}
