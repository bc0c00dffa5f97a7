//! Engine types
//!
//! Run configuration, the import window and the report a run produces.

use crate::types::RunMode;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// How a single run chooses its date range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(rename = "type", default)]
    pub mode: RunMode,
    /// Overrides the configured start for this run only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Overrides the configured end for this run only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl RunConfig {
    /// An incremental run resuming from the watermark
    pub fn incremental() -> Self {
        Self::default()
    }

    /// A backfill over the configured or given range
    pub fn backfill() -> Self {
        Self {
            mode: RunMode::FullBackfill,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    #[must_use]
    pub fn with_end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn is_incremental(&self) -> bool {
        self.mode == RunMode::Incremental
    }
}

/// Consecutive days a time-series node is fetched for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    /// Zero or negative means there is nothing to fetch
    pub days: i64,
}

impl DateWindow {
    pub fn new(start: NaiveDate, days: i64) -> Self {
        Self { start, days }
    }

    pub fn is_empty(&self) -> bool {
        self.days <= 0
    }

    /// Last day of the window, if any
    pub fn end(&self) -> Option<NaiveDate> {
        self.dates().last()
    }

    /// Every day in the window, oldest first
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let count = u64::try_from(self.days).unwrap_or(0);
        (0..count).filter_map(move |offset| self.start.checked_add_days(Days::new(offset)))
    }
}

/// What happened to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeOutcome {
    Done,
    /// Time-series node with an empty window
    Skipped,
}

/// Per-node result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub node: String,
    pub outcome: NodeOutcome,
    /// Rows handed to the sink
    pub rows: usize,
    /// `save_data` calls, including empty ones
    pub writes: usize,
}

impl NodeReport {
    /// A finished node with nothing counted yet
    pub fn done(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            outcome: NodeOutcome::Done,
            rows: 0,
            writes: 0,
        }
    }

    pub fn skipped(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            outcome: NodeOutcome::Skipped,
            rows: 0,
            writes: 0,
        }
    }
}

/// Statistics from a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Total rows written
    pub rows_written: usize,
    /// Total sink writes
    pub writes: usize,
    /// Fetch calls made to the source
    pub fetches: usize,
    /// Time-series days completed
    pub days_processed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_write(&mut self, rows: usize) {
        self.writes += 1;
        self.rows_written += rows;
    }

    pub fn add_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn add_day(&mut self) {
        self.days_processed += 1;
    }

    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Result of [`Orchestrator::run`](super::Orchestrator::run)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub nodes: Vec<NodeReport>,
    pub stats: RunStats,
}

impl RunReport {
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|report| report.node == name)
    }
}
