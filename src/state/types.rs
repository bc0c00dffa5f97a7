//! Persisted run state
//!
//! Serialized to JSON and carried between runs of the same configuration.

use crate::config::RunStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Log entries kept in the state file; older ones are dropped
pub const MAX_LOG_ENTRIES: usize = 500;

/// Complete state for one connector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Watermark: last time-series day that was written
    #[serde(default)]
    pub last_requested_date: Option<NaiveDate>,

    /// When the last successful import finished
    #[serde(default)]
    pub last_import_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: RunStatus,

    /// Message of the last failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When `status` last changed
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Warnings attached to the current status
    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(default)]
    pub log: Vec<LogEntry>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the watermark; earlier dates are ignored
    pub fn advance_watermark(&mut self, date: NaiveDate) -> bool {
        if self.last_requested_date.is_some_and(|current| current >= date) {
            return false;
        }
        self.last_requested_date = Some(date);
        true
    }

    /// Append a log line, keeping at most [`MAX_LOG_ENTRIES`]
    pub fn push_log(&mut self, message: &str) {
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            message: message.to_string(),
        });
        if self.log.len() > MAX_LOG_ENTRIES {
            let excess = self.log.len() - MAX_LOG_ENTRIES;
            self.log.drain(..excess);
        }
    }
}

/// A timestamped log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.last_requested_date.is_none());
        assert_eq!(state.status, RunStatus::Idle);
    }

    #[test]
    fn test_watermark_only_moves_forward() {
        let mut state = State::new();
        assert!(state.advance_watermark(date(5)));
        assert!(!state.advance_watermark(date(3)));
        assert!(!state.advance_watermark(date(5)));
        assert_eq!(state.last_requested_date, Some(date(5)));
        assert!(state.advance_watermark(date(6)));
    }

    #[test]
    fn test_log_is_capped() {
        let mut state = State::new();
        for i in 0..MAX_LOG_ENTRIES + 10 {
            state.push_log(&format!("line {i}"));
        }
        assert_eq!(state.log.len(), MAX_LOG_ENTRIES);
        assert_eq!(state.log[0].message, "line 10");
    }

    #[test]
    fn test_state_serialization() {
        let mut state = State::new();
        state.advance_watermark(date(2));
        state.status = RunStatus::Done;

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["lastRequestedDate"], "2024-01-02");
        assert_eq!(json["status"], "DONE");

        let restored: State = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }
}
