//! Observability events.
//!
//! Components receive an [`Observer`] at construction instead of reaching
//! for global state. [`TracingObserver`] forwards events to `tracing`,
//! [`JsonlObserver`] writes them as JSON lines to stdout or a file, and
//! [`NoopObserver`] discards them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "tasklens.event.v1";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TasksImported,
    TasksExported,
    AnalyticsCacheHit,
    AnalyticsCacheMiss,
    AnalyticsCacheUnavailable,
    JobCycleStarted,
    JobAttemptFailed,
    JobCycleCompleted,
    JobCycleAbandoned,
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    pub fn new(event: EventKind) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: Utc::now(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

pub trait Observer: Send + Sync {
    fn observe(&self, event: &Event);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _event: &Event) {}
}

/// Forwards events to `tracing` at a level matching their severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, event: &Event) {
        let data = event
            .data
            .as_ref()
            .map(|value| value.to_string())
            .unwrap_or_default();
        match event.event {
            EventKind::JobCycleAbandoned => {
                tracing::error!(event = ?event.event, %data, "background job gave up");
            }
            EventKind::JobAttemptFailed | EventKind::AnalyticsCacheUnavailable => {
                tracing::warn!(event = ?event.event, %data, "operation failed");
            }
            EventKind::JobCycleCompleted
            | EventKind::TasksImported
            | EventKind::TaskDeleted => {
                tracing::info!(event = ?event.event, %data);
            }
            _ => tracing::debug!(event = ?event.event, %data),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    /// `-` means stdout; anything else is a file path. Blank means none.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Append to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Write a single event as one JSON line.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }
}

/// Writes every event to an [`EventSink`]. Write failures are logged and
/// otherwise ignored so observability never breaks the caller.
pub struct JsonlObserver {
    sink: Mutex<EventSink>,
}

impl JsonlObserver {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

impl Observer for JsonlObserver {
    fn observe(&self, event: &Event) {
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        if let Err(err) = sink.emit(event) {
            tracing::warn!(error = %err, "failed to write event");
        }
    }
}

/// Sends every event to each inner observer in order.
#[derive(Clone, Default)]
pub struct Fanout {
    observers: Vec<Arc<dyn Observer>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl Observer for Fanout {
    fn observe(&self, event: &Event) {
        for observer in &self.observers {
            observer.observe(event);
        }
    }
}

/// Keeps every event in memory. Handy for embedding and for tests.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<Event>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|event| event.event == kind).count())
            .unwrap_or(0)
    }
}

impl Observer for MemoryObserver {
    fn observe(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn destination_parsing() {
        assert!(EventDestination::parse(None).is_none());
        assert!(EventDestination::parse(Some("  ")).is_none());
        assert!(matches!(EventDestination::parse(Some("-")), Some(EventDestination::Stdout)));
        assert!(matches!(
            EventDestination::parse(Some("events.jsonl")),
            Some(EventDestination::File(path)) if path == PathBuf::from("events.jsonl")
        ));
    }

    #[test]
    fn jsonl_observer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let observer = JsonlObserver::new(EventSink::file(&path).unwrap());

        observer.observe(&Event::new(EventKind::JobCycleStarted).with_data(json!({ "job": "refresh" })));
        observer.observe(&Event::new(EventKind::JobCycleCompleted));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "job_cycle_started");
        assert_eq!(first["data"]["job"], "refresh");
        assert_eq!(first["schema_version"], EVENT_SCHEMA_VERSION);
    }

    #[test]
    fn fanout_reaches_every_observer() {
        let left = Arc::new(MemoryObserver::new());
        let right = Arc::new(MemoryObserver::new());
        let fanout = Fanout::new()
            .with(left.clone())
            .with(Arc::new(NoopObserver))
            .with(right.clone());

        fanout.observe(&Event::new(EventKind::TaskCreated));
        assert_eq!(left.count(EventKind::TaskCreated), 1);
        assert_eq!(right.events().len(), 1);
    }
}
