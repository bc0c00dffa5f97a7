//! State management module
//!
//! Persists the watermark, import status, warnings and log of a connector
//! configuration between runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Watermark and status as stored on disk
//! - `StateManager` - File-based persistence implementing `StatusReporter`

mod manager;
mod types;

pub use manager::{StateManager, IN_PROGRESS_TIMEOUT_MINUTES};
pub use types::{LogEntry, State, MAX_LOG_ENTRIES};

#[cfg(test)]
mod manager_tests;
