//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: built-in source → HTTP requests →
//! orchestrator → sink, with the watermark carried in run state.

use chrono::NaiveDate;
use conduit_cdk::config::RunStatus;
use conduit_cdk::engine::{NodeOutcome, Orchestrator, RunConfig};
use conduit_cdk::runtime::{HostKind, NativeRuntime, NativeRuntimeConfig, RuntimeContext};
use conduit_cdk::sink::{JsonlSinkFactory, MemorySinkFactory};
use conduit_cdk::source::build_configuration;
use conduit_cdk::sources::GitHubSource;
use conduit_cdk::state::StateManager;
use conduit_cdk::types::BackoffType;
use conduit_cdk::{Configuration, Error};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn days_ago(days: u64) -> NaiveDate {
    today() - chrono::Days::new(days)
}

fn native_context() -> RuntimeContext {
    let config = NativeRuntimeConfig::builder()
        .max_retries(0)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .no_rate_limit()
        .build();
    RuntimeContext::from_runtime(Arc::new(NativeRuntime::with_config(config).unwrap()))
}

fn github_config(source: &GitHubSource, fields: &str) -> Configuration {
    let mut config = build_configuration(HostKind::Native, source);
    config.set_values([
        ("AccessToken", "test-token"),
        ("RepositoryName", "octo/hello"),
        ("Fields", fields),
    ]);
    config
}

async fn mount_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "hello",
            "full_name": "octo/hello",
            "owner": {"login": "octo", "id": 1},
            "stargazers_count": 17
        })))
        .mount(server)
        .await;
}

async fn mount_contributors(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello/contributors"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "login": "octo", "contributions": 10},
            {"id": 2, "login": "cat", "contributions": 3}
        ])))
        .mount(server)
        .await;
}

// ============================================================================
// GitHub End-to-End Tests
// ============================================================================

#[tokio::test]
async fn test_github_run_writes_every_node() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    mount_contributors(&server).await;

    let source = GitHubSource::new().with_base_url(server.uri());
    let config = github_config(
        &source,
        "repository name, repository full_name, contributors login, repositoryStats stars, repositoryStats contributors",
    );
    let sinks = MemorySinkFactory::new();
    let state = StateManager::in_memory();

    let mut orchestrator = Orchestrator::new(
        native_context(),
        Arc::new(source),
        Arc::new(sinks.clone()),
        config,
        RunConfig::incremental()
            .with_start_date(days_ago(2))
            .with_end_date(days_ago(1)),
    )
    .with_status(Arc::new(state.clone()));

    let report = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.nodes.len(), 3);
    assert!(report
        .nodes
        .iter()
        .all(|node| node.outcome == NodeOutcome::Done));
    assert_eq!(report.stats.days_processed, 2);

    let repository = sinks.rows("github_repository").await;
    assert_eq!(repository.len(), 1);
    assert_eq!(repository[0]["id"], 42);
    assert_eq!(repository[0]["full_name"], "octo/hello");

    let contributors = sinks.rows("github_contributors").await;
    assert_eq!(contributors.len(), 2);
    assert_eq!(contributors[1]["login"], "cat");
    // Unselected fields are completed as null
    assert!(contributors[0]["contributions"].is_null());

    // Current counts land on yesterday only; the older day is written empty
    let stats = sinks.rows("github_repository_stats").await;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0]["date"], days_ago(1).to_string());
    assert_eq!(stats[0]["stars"], 17);
    assert_eq!(stats[0]["contributors"], 2);
    assert_eq!(sinks.writes("github_repository_stats").await, 2);

    assert_eq!(state.last_requested_date().await, Some(days_ago(1)));
    assert_eq!(state.status().await, RunStatus::Done);
    assert_eq!(
        orchestrator.config().date("LastRequestedDate"),
        Some(days_ago(1))
    );
}

#[tokio::test]
async fn test_github_run_without_token_is_reported() {
    let server = MockServer::start().await;
    let source = GitHubSource::new().with_base_url(server.uri());
    let mut config = build_configuration(HostKind::Native, &source);
    config.set_values([("RepositoryName", "octo/hello"), ("Fields", "repository name")]);
    let state = StateManager::in_memory();

    let mut orchestrator = Orchestrator::new(
        native_context(),
        Arc::new(source),
        Arc::new(MemorySinkFactory::new()),
        config,
        RunConfig::incremental(),
    )
    .with_status(Arc::new(state.clone()));

    let err = orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "AccessToken"));
    assert_eq!(state.status().await, RunStatus::Error);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_failed_day_keeps_earlier_days_and_watermark() {
    let server = MockServer::start().await;
    // Yesterday's snapshot succeeds; the call for today fails
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "stargazers_count": 5})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/hello"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_contributors(&server).await;

    let output = tempfile::TempDir::new().unwrap();
    let state_path = output.path().join("state.json");
    let state = StateManager::from_file(&state_path).unwrap();

    let source = GitHubSource::new().with_base_url(server.uri());
    let config = github_config(&source, "repositoryStats stars");
    let mut orchestrator = Orchestrator::new(
        native_context(),
        Arc::new(source),
        Arc::new(JsonlSinkFactory::new(output.path())),
        config,
        RunConfig::incremental()
            .with_start_date(days_ago(1))
            .with_end_date(today()),
    )
    .with_status(Arc::new(state));

    let err = orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));

    let written = std::fs::read_to_string(output.path().join("github_repository_stats.jsonl")).unwrap();
    let rows: Vec<serde_json::Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["date"], days_ago(1).to_string());
    assert_eq!(rows[0]["stars"], 5);

    let persisted = StateManager::from_file(&state_path).unwrap();
    assert_eq!(persisted.last_requested_date().await, Some(days_ago(1)));
    assert_eq!(persisted.status().await, RunStatus::Error);
}

#[tokio::test]
async fn test_backfill_does_not_stamp_current_stats_on_past_days() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    mount_contributors(&server).await;

    let source = GitHubSource::new().with_base_url(server.uri());
    let mut config = github_config(&source, "repositoryStats stars");
    config.set_value("CreateEmptyTables", false);
    let sinks = MemorySinkFactory::new();

    let mut orchestrator = Orchestrator::new(
        native_context(),
        Arc::new(source),
        Arc::new(sinks.clone()),
        config,
        RunConfig::backfill()
            .with_start_date(date(2024, 1, 1))
            .with_end_date(date(2024, 1, 5)),
    );
    let report = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.stats.days_processed, 5);
    assert_eq!(report.node("repositoryStats").unwrap().rows, 0);
    assert!(sinks.rows("github_repository_stats").await.is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_second_run_upserts_instead_of_duplicating() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    mount_contributors(&server).await;

    let output = tempfile::TempDir::new().unwrap();
    for _ in 0..2 {
        let source = GitHubSource::new().with_base_url(server.uri());
        let config = github_config(&source, "contributors login");
        let mut orchestrator = Orchestrator::new(
            native_context(),
            Arc::new(source),
            Arc::new(JsonlSinkFactory::new(output.path())),
            config,
            RunConfig::incremental(),
        );
        orchestrator.run(&CancellationToken::new()).await.unwrap();
    }

    let written = std::fs::read_to_string(output.path().join("github_contributors.jsonl")).unwrap();
    assert_eq!(written.lines().count(), 2);
}
