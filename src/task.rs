//! Task domain types for tasklens.
//!
//! Status and priority are closed enums. Parsing a task field rejects
//! unknown values; building a [`TaskFilter`] from raw strings drops them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Storage format for timestamps. Fixed width, so text order is time order.
const STORE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const INPUT_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(Error::Validation(format!(
                "unknown status '{other}' (expected pending|in_progress|done)"
            ))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(Error::Validation(format!(
                "unknown priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

/// A stored task. `id`, `created_at` and `updated_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied fields for creating or importing a task.
///
/// Unknown fields (for example `id` or `created_at` in an export file) are
/// ignored, so an export can be fed back into an import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub due_date: DateTime<Utc>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, due_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: default_status(),
            priority: default_priority(),
            due_date,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Fields that can be updated on a task. `None` leaves the field unchanged.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Parse a sort directive. `low`/`high` are accepted as aliases for
    /// ascending/descending due date.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "low" => Some(SortOrder::Ascending),
            "desc" | "descending" | "high" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

/// Query shape for listing tasks. Every supplied field is ANDed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub title: Option<String>,
    pub sort_by_due: Option<SortOrder>,
}

impl TaskFilter {
    /// Build a filter from untyped input. Unrecognized values are dropped
    /// rather than rejected.
    pub fn from_raw(
        status: Option<&str>,
        priority: Option<&str>,
        title: Option<&str>,
        sort: Option<&str>,
    ) -> Self {
        Self {
            status: status.and_then(|raw| raw.parse().ok()),
            priority: priority.and_then(|raw| raw.parse().ok()),
            title: title
                .filter(|raw| !raw.is_empty())
                .map(|raw| raw.to_string()),
            sort_by_due: sort.and_then(SortOrder::parse),
        }
    }
}

/// Format a timestamp the way the store keeps it.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(STORE_TIME_FORMAT).to_string()
}

/// Parse a timestamp from RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (UTC) or a
/// bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Ok(value.with_timezone(&Utc));
    }
    for format in INPUT_TIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(value.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(value) = date.and_hms_opt(0, 0, 0) {
            return Ok(value.and_utc());
        }
    }
    Err(Error::Validation(format!("invalid timestamp '{raw}'")))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("Done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!(" in_progress ".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!(matches!("finished".parse::<TaskStatus>(), Err(Error::Validation(_))));
    }

    #[test]
    fn priority_rejects_unknown() {
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn filter_drops_unrecognized_values() {
        let filter = TaskFilter::from_raw(Some("bogus"), Some("high"), Some(""), Some("sideways"));
        assert_eq!(filter.status, None);
        assert_eq!(filter.priority, Some(TaskPriority::High));
        assert_eq!(filter.title, None);
        assert_eq!(filter.sort_by_due, None);
    }

    #[test]
    fn sort_accepts_legacy_aliases() {
        assert_eq!(SortOrder::parse("low"), Some(SortOrder::Ascending));
        assert_eq!(SortOrder::parse("HIGH"), Some(SortOrder::Descending));
        assert_eq!(SortOrder::parse("desc"), Some(SortOrder::Descending));
    }

    #[test]
    fn parse_timestamp_accepts_common_forms() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-03-01T14:30:00+02:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn stored_format_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(parse_timestamp(&format_timestamp(&late)).unwrap(), late);
    }

    #[test]
    fn new_task_json_defaults() {
        let task: NewTask =
            serde_json::from_str(r#"{"title":"write docs","due_date":"2024-05-01 09:00:00","id":7}"#)
                .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.description.is_empty());
    }
}
