//! Tests for StateManager

use super::*;
use crate::config::{RunStatus, StatusReporter, StatusUpdate};
use chrono::{Duration, NaiveDate, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_state_manager_new() {
    let manager = StateManager::new("/tmp/test-state.json");
    assert!(!manager.is_in_memory());
    assert_eq!(manager.path().to_str().unwrap(), "/tmp/test-state.json");
}

#[test]
fn test_state_manager_in_memory() {
    let manager = StateManager::in_memory();
    assert!(manager.is_in_memory());
}

#[tokio::test]
async fn test_from_json() {
    let manager = StateManager::from_json(
        r#"{"lastRequestedDate": "2024-03-04", "status": "DONE", "warnings": []}"#,
    )
    .unwrap();

    assert!(manager.is_in_memory());
    assert_eq!(manager.last_requested_date().await, Some(date(4)));
    assert_eq!(manager.status().await, RunStatus::Done);
}

#[test]
fn test_from_json_invalid() {
    let err = StateManager::from_json("{not json").unwrap_err();
    assert!(matches!(err, crate::error::Error::State { .. }));
}

// ============================================================================
// Watermark Tests
// ============================================================================

#[tokio::test]
async fn test_watermark_is_monotonic() {
    let manager = StateManager::in_memory();

    manager.update_last_requested_date(date(5)).await.unwrap();
    manager.update_last_requested_date(date(2)).await.unwrap();
    assert_eq!(manager.last_requested_date().await, Some(date(5)));

    manager.update_last_requested_date(date(6)).await.unwrap();
    assert_eq!(manager.last_requested_date().await, Some(date(6)));
}

// ============================================================================
// Status Tests
// ============================================================================

#[tokio::test]
async fn test_status_transitions() {
    let manager = StateManager::in_memory();
    assert!(!manager.is_in_progress().await);

    manager.add_warning_to_current_status("old warning").await;
    manager
        .handle_status_update(StatusUpdate::new(RunStatus::InProgress))
        .await
        .unwrap();
    assert!(manager.is_in_progress().await);
    assert!(manager.state().await.warnings.is_empty());

    manager.add_warning_to_current_status("rate limited").await;
    manager
        .handle_status_update(StatusUpdate::error("HTTP 500"))
        .await
        .unwrap();

    let state = manager.state().await;
    assert_eq!(state.status, RunStatus::Error);
    assert_eq!(state.error.as_deref(), Some("HTTP 500"));
    assert_eq!(state.warnings, vec!["rate limited"]);
}

#[tokio::test]
async fn test_stale_in_progress_is_ignored() {
    let stale = Utc::now() - Duration::minutes(IN_PROGRESS_TIMEOUT_MINUTES + 1);
    let manager = StateManager::from_json(
        &serde_json::json!({"status": "IN_PROGRESS", "updatedAt": stale}).to_string(),
    )
    .unwrap();
    assert!(!manager.is_in_progress().await);
}

#[tokio::test]
async fn test_log_and_import_date() {
    let manager = StateManager::in_memory();
    manager.log_message("Fetched 10 rows").await;
    manager.update_last_import_date().await.unwrap();

    let state = manager.state().await;
    assert_eq!(state.log.len(), 1);
    assert_eq!(state.log[0].message, "Fetched 10 rows");
    assert!(state.last_import_date.is_some());
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let manager = StateManager::from_file(&path).unwrap();
        manager.update_last_requested_date(date(9)).await.unwrap();
        manager
            .handle_status_update(StatusUpdate::new(RunStatus::Done))
            .await
            .unwrap();
    }

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());

    let manager = StateManager::from_file(&path).unwrap();
    assert_eq!(manager.last_requested_date().await, Some(date(9)));
    assert_eq!(manager.status().await, RunStatus::Done);
}

#[test]
fn test_from_file_missing_starts_empty() {
    let dir = tempdir().unwrap();
    let manager = StateManager::from_file(dir.path().join("absent.json")).unwrap();
    assert!(!manager.is_in_memory());
}

#[test]
fn test_from_file_corrupt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "garbage").unwrap();

    let err = StateManager::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse state file"));
}

#[tokio::test]
async fn test_clones_share_state() {
    let manager = StateManager::in_memory();
    let clone = manager.clone();

    clone.update_last_requested_date(date(1)).await.unwrap();
    assert_eq!(manager.last_requested_date().await, Some(date(1)));

    manager.clear().await.unwrap();
    assert!(clone.last_requested_date().await.is_none());
}
