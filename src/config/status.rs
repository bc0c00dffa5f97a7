//! Status reporting contract
//!
//! The orchestrator reports progress through [`StatusReporter`] as
//! side-effecting notifications. Persistence is up to the implementor;
//! [`MemoryStatus`] keeps everything in memory and
//! [`StateManager`](crate::state::StateManager) writes it to disk.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

/// Import status of a connector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    Idle,
    InProgress,
    Done,
    Error,
}

/// A status transition, optionally carrying the failure message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: RunStatus,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(message.into()),
        }
    }
}

/// Notifications a run emits about its own progress
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Record a human-readable log line
    async fn log_message(&self, message: &str);

    /// Persist the watermark after a day was written
    async fn update_last_requested_date(&self, date: NaiveDate) -> Result<()>;

    /// Record that an import finished successfully
    async fn update_last_import_date(&self) -> Result<()>;

    /// Whether another import for this configuration is running
    async fn is_in_progress(&self) -> bool;

    /// Attach a warning to the current status
    async fn add_warning_to_current_status(&self, warning: &str);

    /// Transition the import status
    async fn handle_status_update(&self, update: StatusUpdate) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryStatusInner {
    status: RunStatus,
    error: Option<String>,
    messages: Vec<String>,
    warnings: Vec<String>,
    watermarks: Vec<NaiveDate>,
    last_import: Option<DateTime<Utc>>,
}

/// In-memory status sink; also mirrors every message to `tracing`
#[derive(Debug, Default)]
pub struct MemoryStatus {
    inner: Mutex<MemoryStatusInner>,
}

impl MemoryStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut MemoryStatusInner) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn status(&self) -> RunStatus {
        self.with_inner(|s| s.status)
    }

    pub fn last_error(&self) -> Option<String> {
        self.with_inner(|s| s.error.clone())
    }

    pub fn messages(&self) -> Vec<String> {
        self.with_inner(|s| s.messages.clone())
    }

    pub fn warnings(&self) -> Vec<String> {
        self.with_inner(|s| s.warnings.clone())
    }

    /// Every watermark reported, oldest first
    pub fn watermarks(&self) -> Vec<NaiveDate> {
        self.with_inner(|s| s.watermarks.clone())
    }

    pub fn last_requested_date(&self) -> Option<NaiveDate> {
        self.with_inner(|s| s.watermarks.last().copied())
    }

    pub fn last_import(&self) -> Option<DateTime<Utc>> {
        self.with_inner(|s| s.last_import)
    }
}

#[async_trait]
impl StatusReporter for MemoryStatus {
    async fn log_message(&self, message: &str) {
        info!("{message}");
        self.with_inner(|s| s.messages.push(message.to_string()));
    }

    async fn update_last_requested_date(&self, date: NaiveDate) -> Result<()> {
        self.with_inner(|s| s.watermarks.push(date));
        Ok(())
    }

    async fn update_last_import_date(&self) -> Result<()> {
        self.with_inner(|s| s.last_import = Some(Utc::now()));
        Ok(())
    }

    async fn is_in_progress(&self) -> bool {
        self.status() == RunStatus::InProgress
    }

    async fn add_warning_to_current_status(&self, warning: &str) {
        warn!("{warning}");
        self.with_inner(|s| s.warnings.push(warning.to_string()));
    }

    async fn handle_status_update(&self, update: StatusUpdate) -> Result<()> {
        self.with_inner(|s| {
            s.status = update.status;
            s.error = update.error;
        });
        Ok(())
    }
}
