//! Persistent store for tasks and users.
//!
//! [`TaskStore`] and [`UserStore`] are the capabilities the rest of the
//! crate depends on. [`SqliteStore`] implements both on a single SQLite
//! database file.
//!
//! # Schema
//!
//! ```text
//! tasks(id, title, description, status, priority, due_date, created_at, updated_at)
//! users(id, name UNIQUE, password_hash)
//! ```
//!
//! Timestamps are stored as fixed-width UTC text (`YYYY-MM-DD HH:MM:SS.fff`)
//! so comparisons in SQL follow chronological order.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};

use crate::analytics::{StatusCounts, WeeklyReport};
use crate::error::{Error, Result};
use crate::query::{SelectBuilder, TASK_COLUMNS};
use crate::task::{format_timestamp, parse_timestamp, NewTask, Task, TaskFilter, TaskUpdate};
use crate::user::User;

/// Tasks not done and due longer ago than this are removed by a sweep.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Width of the trailing window used by the weekly report.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'done')),
    priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high')),
    due_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_status_due ON tasks (status, due_date);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
";

const INSERT_TASK: &str = "INSERT INTO tasks (title, description, status, priority, due_date, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)";

/// Task persistence capability.
///
/// Every method may fail with [`Error::Store`] carrying the underlying
/// cause. Implementations do not retry.
pub trait TaskStore: Send + Sync {
    /// Insert a task and return its assigned id.
    fn create(&self, task: &NewTask) -> Result<i64>;

    /// List tasks matching `filter`. Without a sort directive the order is
    /// whatever the store yields.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Apply `update` to task `id`, returning the stored result.
    fn update(&self, id: i64, update: &TaskUpdate) -> Result<Task>;

    fn delete(&self, id: i64) -> Result<()>;

    /// Remove tasks that are not done and were due more than
    /// [`STALE_AFTER_DAYS`] ago. Returns how many were removed.
    fn delete_stale(&self) -> Result<usize>;

    /// Insert every task or none of them.
    fn import_batch(&self, tasks: &[NewTask]) -> Result<Vec<i64>>;

    fn export_all(&self) -> Result<Vec<Task>>;

    fn count_by_status(&self) -> Result<StatusCounts>;

    fn count_weekly(&self) -> Result<WeeklyReport>;

    /// Mean of `created_at - due_date` over done tasks, in seconds.
    fn avg_completion_secs(&self) -> Result<f64>;
}

/// User persistence capability.
pub trait UserStore: Send + Sync {
    /// Insert a user. Fails with [`Error::Conflict`] if the name is taken.
    fn create_user(&self, name: &str, password_hash: &str) -> Result<User>;

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>>;
}

/// SQLite-backed store. Each call opens its own connection, so the store
/// can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = store.connect()?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %store.path.display(), "task store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Task> {
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            parse_task,
        )
        .optional()?
        .ok_or(Error::NotFound(id))
    }

    fn count_where(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<u64> {
        let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl TaskStore for SqliteStore {
    fn create(&self, task: &NewTask) -> Result<i64> {
        let conn = self.connect()?;
        let now = format_timestamp(&Utc::now());
        conn.execute(
            INSERT_TASK,
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                format_timestamp(&task.due_date),
                now,
            ],
        )
        .map_err(rejected_fields)?;
        Ok(conn.last_insert_rowid())
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.connect()?;
        let query = SelectBuilder::for_tasks(filter);
        let mut stmt = conn.prepare(&query.sql())?;
        let tasks = stmt
            .query_map(query.params().as_slice(), parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn update(&self, id: i64, update: &TaskUpdate) -> Result<Task> {
        if update.is_empty() {
            return Err(Error::Validation("update has no fields to change".to_string()));
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let mut assignments = vec!["updated_at = MAX(updated_at, ?)"];
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(format_timestamp(&Utc::now()))];

        if let Some(title) = &update.title {
            assignments.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(description) = &update.description {
            assignments.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(status) = update.status {
            assignments.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(priority) = update.priority {
            assignments.push("priority = ?");
            values.push(Box::new(priority.as_str()));
        }
        if let Some(due_date) = &update.due_date {
            assignments.push("due_date = ?");
            values.push(Box::new(format_timestamp(due_date)));
        }
        values.push(Box::new(id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", assignments.join(", "));
        let params: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let changed = tx.execute(&sql, params.as_slice()).map_err(rejected_fields)?;
        if changed == 0 {
            return Err(Error::NotFound(id));
        }

        let task = Self::fetch(&tx, id)?;
        tx.commit()?;
        Ok(task)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let conn = self.connect()?;
        let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    fn delete_stale(&self) -> Result<usize> {
        let conn = self.connect()?;
        let cutoff = Utc::now() - chrono::Duration::days(STALE_AFTER_DAYS);
        let removed = conn.execute(
            "DELETE FROM tasks WHERE status != 'done' AND due_date < ?1",
            params![format_timestamp(&cutoff)],
        )?;
        Ok(removed)
    }

    fn import_batch(&self, tasks: &[NewTask]) -> Result<Vec<i64>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = format_timestamp(&Utc::now());
        let mut ids = Vec::with_capacity(tasks.len());
        {
            let mut stmt = tx.prepare(INSERT_TASK)?;
            for (index, task) in tasks.iter().enumerate() {
                stmt.execute(params![
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    format_timestamp(&task.due_date),
                    now,
                ])
                .map_err(|err| Error::ImportFailure {
                    index,
                    reason: err.to_string(),
                })?;
                ids.push(tx.last_insert_rowid());
            }
        }
        // Dropping an uncommitted transaction rolls it back, so any early
        // return above leaves the table untouched.
        tx.commit()?;
        Ok(ids)
    }

    fn export_all(&self) -> Result<Vec<Task>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))?;
        let tasks = stmt
            .query_map([], parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn count_by_status(&self) -> Result<StatusCounts> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, count) = row?;
            let count = count.max(0) as u64;
            match status.as_str() {
                "done" => counts.done = count,
                "in_progress" => counts.in_progress = count,
                "pending" => counts.pending = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    fn count_weekly(&self) -> Result<WeeklyReport> {
        let conn = self.connect()?;
        let now = Utc::now();
        let start = format_timestamp(&(now - chrono::Duration::days(WEEKLY_WINDOW_DAYS)));
        let end = format_timestamp(&now);

        let completed = Self::count_where(
            &conn,
            "SELECT COUNT(*) FROM tasks WHERE status = 'done' AND due_date >= ?1 AND due_date <= ?2",
            &[&start, &end],
        )?;
        let uncompleted = Self::count_where(
            &conn,
            "SELECT COUNT(*) FROM tasks WHERE status != 'done' AND due_date >= ?1 AND due_date <= ?2",
            &[&start, &end],
        )?;
        Ok(WeeklyReport {
            completed,
            uncompleted,
        })
    }

    fn avg_completion_secs(&self) -> Result<f64> {
        let conn = self.connect()?;
        let average: Option<f64> = conn.query_row(
            "SELECT AVG((julianday(created_at) - julianday(due_date)) * 86400.0)
             FROM tasks WHERE status = 'done'",
            [],
            |row| row.get(0),
        )?;
        Ok(average.unwrap_or(0.0))
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, name: &str, password_hash: &str) -> Result<User> {
        let conn = self.connect()?;
        match conn.execute(
            "INSERT INTO users (name, password_hash) VALUES (?1, ?2)",
            params![name, password_hash],
        ) {
            Ok(_) => Ok(User {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                password_hash: password_hash.to_string(),
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(Error::Conflict(name.to_string()))
            }
            Err(err) => Err(Error::Store(err)),
        }
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.connect()?;
        let user = conn
            .query_row(
                "SELECT id, name, password_hash FROM users WHERE name = ?1",
                params![name],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

/// CHECK constraints guard task fields; a violation is the caller's fault.
fn rejected_fields(err: rusqlite::Error) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Error::Validation(message.unwrap_or_else(|| failure.to_string()))
        }
        other => Error::Store(other),
    }
}

fn parse_task(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_column(row, 3)?,
        priority: parse_column(row, 4)?,
        due_date: time_column(row, 5)?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
    })
}

fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
