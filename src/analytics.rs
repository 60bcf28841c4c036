//! Aggregate statistics over the task set.
//!
//! A snapshot is derived data. It is never authoritative and is rebuilt in
//! full from the store on every computation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::TaskStore;

/// Task counts per status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub done: u64,
    pub in_progress: u64,
    pub pending: u64,
}

/// Tasks due within the trailing week, split by completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyReport {
    pub completed: u64,
    pub uncompleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    pub done: u64,
    pub in_progress: u64,
    pub pending: u64,
    /// Mean of `created_at - due_date` over done tasks, in seconds. Zero
    /// when no task is done.
    pub average_completion_secs: f64,
    pub weekly: WeeklyReport,
    pub computed_at: DateTime<Utc>,
}

impl AnalyticsSnapshot {
    pub fn from_parts(counts: StatusCounts, weekly: WeeklyReport, average_completion_secs: f64) -> Self {
        Self {
            done: counts.done,
            in_progress: counts.in_progress,
            pending: counts.pending,
            average_completion_secs: if average_completion_secs.is_finite() {
                average_completion_secs
            } else {
                0.0
            },
            weekly,
            computed_at: Utc::now(),
        }
    }

    pub fn total(&self) -> u64 {
        self.done + self.in_progress + self.pending
    }
}

/// Computes snapshots from the task store.
#[derive(Clone)]
pub struct AnalyticsComputer {
    store: Arc<dyn TaskStore>,
}

impl AnalyticsComputer {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Run the aggregate queries and assemble a snapshot.
    ///
    /// The queries are independent; no single read snapshot spans them.
    pub fn compute(&self) -> Result<AnalyticsSnapshot> {
        let weekly = self.store.count_weekly()?;
        let counts = self.store.count_by_status()?;
        let average = self.store.avg_completion_secs()?;
        let snapshot = AnalyticsSnapshot::from_parts(counts, weekly, average);
        tracing::debug!(
            done = snapshot.done,
            in_progress = snapshot.in_progress,
            pending = snapshot.pending,
            "computed analytics snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_average_becomes_zero() {
        let snapshot = AnalyticsSnapshot::from_parts(StatusCounts::default(), WeeklyReport::default(), f64::NAN);
        assert_eq!(snapshot.average_completion_secs, 0.0);
        assert_eq!(snapshot.total(), 0);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let counts = StatusCounts { done: 2, in_progress: 1, pending: 3 };
        let weekly = WeeklyReport { completed: 1, uncompleted: 2 };
        let snapshot = AnalyticsSnapshot::from_parts(counts, weekly, 3600.0);
        let raw = serde_json::to_string(&snapshot).unwrap();
        let back: AnalyticsSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.total(), 6);
    }
}
