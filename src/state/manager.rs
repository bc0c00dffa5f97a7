//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes and implements
//! the [`StatusReporter`] contract on top of it.

use super::types::State;
use crate::config::{RunStatus, StatusReporter, StatusUpdate};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// An `IN_PROGRESS` status older than this is treated as abandoned
pub const IN_PROGRESS_TIMEOUT_MINUTES: i64 = 120;

/// State manager for persisting and loading state
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file
    path: PathBuf,
    /// Current state (cached)
    state: Arc<RwLock<State>>,
    /// Whether to save on every update
    auto_save: bool,
}

impl StateManager {
    /// Create a new state manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: true,
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: false,
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save: true,
        })
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;

        Ok(Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(state)),
            auto_save: false,
        })
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = self.to_json_pretty().await?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        Ok(())
    }

    /// Get a read lock on the current state
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// The persisted watermark
    pub async fn last_requested_date(&self) -> Option<NaiveDate> {
        self.state.read().await.last_requested_date
    }

    pub async fn status(&self) -> RunStatus {
        self.state.read().await.status
    }

    /// Clear all state
    pub async fn clear(&self) -> Result<()> {
        self.update(|state| *state = State::new()).await
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    async fn update(&self, f: impl FnOnce(&mut State) + Send) -> Result<()> {
        {
            let mut state = self.state.write().await;
            f(&mut state);
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            auto_save: self.auto_save,
        }
    }
}

#[async_trait]
impl StatusReporter for StateManager {
    async fn log_message(&self, message: &str) {
        info!("{message}");
        if let Err(e) = self.update(|state| state.push_log(message)).await {
            warn!("failed to persist log message: {e}");
        }
    }

    async fn update_last_requested_date(&self, date: NaiveDate) -> Result<()> {
        self.update(|state| {
            state.advance_watermark(date);
        })
        .await
    }

    async fn update_last_import_date(&self) -> Result<()> {
        self.update(|state| state.last_import_date = Some(Utc::now()))
            .await
    }

    async fn is_in_progress(&self) -> bool {
        let state = self.state.read().await;
        if state.status != RunStatus::InProgress {
            return false;
        }
        state
            .updated_at
            .is_some_and(|at| Utc::now() - at < Duration::minutes(IN_PROGRESS_TIMEOUT_MINUTES))
    }

    async fn add_warning_to_current_status(&self, warning: &str) {
        warn!("{warning}");
        if let Err(e) = self
            .update(|state| state.warnings.push(warning.to_string()))
            .await
        {
            warn!("failed to persist warning: {e}");
        }
    }

    async fn handle_status_update(&self, update: StatusUpdate) -> Result<()> {
        self.update(|state| {
            if update.status == RunStatus::InProgress {
                state.warnings.clear();
            }
            state.status = update.status;
            state.error = update.error;
            state.updated_at = Some(Utc::now());
        })
        .await
    }
}
