//! Tests for engine module

use super::*;
use crate::config::{MemoryStatus, ParameterValue};
use crate::runtime::{HostKind, ReplayRuntime};
use crate::schema::FieldType;
use crate::sink::MemorySinkFactory;
use crate::source::build_configuration;
use crate::types::RunMode;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use test_case::test_case;

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn march(day: u32) -> NaiveDate {
    date(3, day)
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Test Source
// ============================================================================

struct FakeSource {
    schemas: Vec<NodeSchema>,
    catalog_pages: Vec<Vec<Row>>,
    catalog_tail: Vec<Row>,
    rows_per_day: usize,
    partitions: Vec<Option<String>>,
    fail_on: Option<NaiveDate>,
    fail_on_node: Option<(&'static str, NaiveDate)>,
    cancel_on: Option<(NaiveDate, CancellationToken)>,
    fetched_days: Mutex<Vec<NaiveDate>>,
    node_days: Mutex<Vec<(String, NaiveDate)>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            schemas: vec![
                NodeSchema::new("items")
                    .field("id", FieldType::Integer)
                    .field("name", FieldType::String)
                    .field("category", FieldType::String)
                    .unique_keys(["id"]),
                NodeSchema::new("dailyStats")
                    .description("Daily stats")
                    .documentation("https://example.com/docs")
                    .field("date", FieldType::Date)
                    .field("partition", FieldType::String)
                    .field("clicks", FieldType::Integer)
                    .field("cost", FieldType::Number)
                    .unique_keys(["date", "partition", "clicks"])
                    .time_series()
                    .destination_name("daily_stats"),
                NodeSchema::new("otherStats")
                    .field("date", FieldType::Date)
                    .field("partition", FieldType::String)
                    .field("clicks", FieldType::Integer)
                    .unique_keys(["date", "partition", "clicks"])
                    .time_series()
                    .destination_name("other_stats"),
                NodeSchema::new("broken").field("id", FieldType::Integer),
            ],
            catalog_pages: Vec::new(),
            catalog_tail: Vec::new(),
            rows_per_day: 2,
            partitions: vec![None],
            fail_on: None,
            fail_on_node: None,
            cancel_on: None,
            fetched_days: Mutex::new(Vec::new()),
            node_days: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetched_days(&self) -> Vec<NaiveDate> {
        self.fetched_days.lock().unwrap().clone()
    }

    fn days_of(&self, node: &str) -> Vec<NaiveDate> {
        self.node_days
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == node)
            .map(|(_, day)| *day)
            .collect()
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn parameters(&self) -> Vec<(String, crate::config::Parameter)> {
        Vec::new()
    }

    fn schemas(&self) -> &[NodeSchema] {
        &self.schemas
    }

    fn partitions(&self, _config: &Configuration) -> Result<Vec<Option<String>>> {
        Ok(self.partitions.clone())
    }

    async fn fetch_catalog(
        &self,
        _ctx: &FetchContext<'_>,
        on_batch_ready: &mut dyn BatchReady,
    ) -> Result<Vec<Row>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        for page in &self.catalog_pages {
            on_batch_ready.on_batch_ready(page.clone()).await?;
        }
        Ok(self.catalog_tail.clone())
    }

    async fn fetch_time_series_day(
        &self,
        ctx: &FetchContext<'_>,
        day: NaiveDate,
    ) -> Result<Vec<Row>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched_days.lock().unwrap().push(day);
        self.node_days
            .lock()
            .unwrap()
            .push((ctx.node.to_string(), day));

        if self.fail_on == Some(day) {
            return Err(Error::fetch(format!("HTTP 500 for {day}")));
        }
        if matches!(self.fail_on_node, Some((node, fail_day)) if node == ctx.node && fail_day == day) {
            return Err(Error::fetch(format!("HTTP 500 for {} on {day}", ctx.node)));
        }
        if let Some((cancel_day, token)) = &self.cancel_on {
            if *cancel_day == day {
                token.cancel();
            }
        }

        Ok((0..self.rows_per_day)
            .map(|clicks| {
                row(json!({
                    "date": day.to_string(),
                    "partition": ctx.partition,
                    "clicks": clicks,
                }))
            })
            .collect())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct CountingFactory {
    inner: MemorySinkFactory,
    created: AtomicUsize,
}

impl SinkFactory for CountingFactory {
    fn create(&self, config: &Configuration, spec: SinkSpec) -> Result<Box<dyn Sink>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create(config, spec)
    }
}

struct Harness {
    orchestrator: Orchestrator,
    source: Arc<FakeSource>,
    sinks: MemorySinkFactory,
    factory: Arc<CountingFactory>,
    status: Arc<MemoryStatus>,
}

fn harness(source: FakeSource, values: Vec<(&str, ParameterValue)>, run: RunConfig) -> Harness {
    let source = Arc::new(source);
    let sinks = MemorySinkFactory::new();
    let factory = Arc::new(CountingFactory {
        inner: sinks.clone(),
        created: AtomicUsize::new(0),
    });
    let status = Arc::new(MemoryStatus::new());

    let mut config = build_configuration(HostKind::Replay, source.as_ref());
    config.set_values(values);

    let runtime = ReplayRuntime::new().with_today(march(10));
    let orchestrator = Orchestrator::new(
        RuntimeContext::from_runtime(Arc::new(runtime)),
        source.clone(),
        factory.clone(),
        config,
        run,
    )
    .with_status(status.clone());

    Harness {
        orchestrator,
        source,
        sinks,
        factory,
        status,
    }
}

fn daily(values: Vec<(&'static str, ParameterValue)>) -> Vec<(&'static str, ParameterValue)> {
    let mut all = vec![("Fields", "dailyStats date, dailyStats clicks".into())];
    all.extend(values);
    all
}

// ============================================================================
// Catalog Tests
// ============================================================================

#[tokio::test]
async fn test_catalog_writes_flushed_batches_and_tail() {
    let mut source = FakeSource::new();
    source.catalog_pages = vec![vec![
        row(json!({"id": 1, "name": "a"})),
        row(json!({"id": 2, "name": "b"})),
    ]];
    source.catalog_tail = vec![row(json!({"id": 3}))];

    let mut h = harness(
        source,
        vec![("Fields", "items id, items name".into())],
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    let node = report.node("items").unwrap();
    assert_eq!(node.outcome, NodeOutcome::Done);
    assert_eq!(node.rows, 3);
    assert_eq!(node.writes, 2);

    let rows = h.sinks.rows("items").await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["name"], serde_json::Value::Null);
    assert!(rows.iter().all(|r| r.contains_key("category")));
    assert_eq!(h.status.status(), RunStatus::Done);
    assert!(h.status.last_import().is_some());
}

#[tokio::test]
async fn test_catalog_empty_creates_one_empty_write() {
    let mut h = harness(
        FakeSource::new(),
        vec![("Fields", "items id".into())],
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.node("items").unwrap().writes, 1);
    let table = h.sinks.table("items").await.unwrap();
    assert!(table.rows.is_empty());
    assert_eq!(table.writes, 1);
}

#[tokio::test]
async fn test_catalog_empty_without_create_empty_tables() {
    let mut h = harness(
        FakeSource::new(),
        vec![
            ("Fields", "items id".into()),
            ("CreateEmptyTables", false.into()),
        ],
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.node("items").unwrap().writes, 0);
    assert_eq!(h.sinks.writes("items").await, 0);
}

// ============================================================================
// Time-Series Tests
// ============================================================================

#[tokio::test]
async fn test_incremental_from_start_date_excludes_today() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![("StartDate", "2024-03-07".into())]),
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(h.source.fetched_days(), vec![march(7), march(8), march(9)]);
    assert_eq!(h.status.watermarks(), vec![march(7), march(8), march(9)]);
    assert_eq!(h.orchestrator.config().date("LastRequestedDate"), Some(march(9)));

    let node = report.node("dailyStats").unwrap();
    assert_eq!(node.rows, 6);
    assert_eq!(node.writes, 3);
    assert_eq!(report.stats.days_processed, 3);
}

#[tokio::test]
async fn test_incremental_resumes_with_lookback() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![
            ("LastRequestedDate", "2024-03-08".into()),
            ("ReimportLookbackWindow", 2.into()),
        ]),
        RunConfig::incremental(),
    );
    h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(h.source.fetched_days(), vec![march(7), march(8), march(9)]);
    // Re-fetched days never move the watermark backwards
    assert_eq!(h.status.watermarks(), vec![march(9)]);
}

#[tokio::test]
async fn test_skip_empty_window() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![
            ("LastRequestedDate", "2024-03-09".into()),
            ("ReimportLookbackWindow", 0.into()),
        ]),
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.node("dailyStats").unwrap().outcome, NodeOutcome::Skipped);
    assert_eq!(h.source.fetches(), 0);
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 0);
    assert!(h.status.watermarks().is_empty());
    assert_eq!(h.status.status(), RunStatus::Done);
}

#[tokio::test]
async fn test_watermark_stops_at_last_written_day_on_failure() {
    let mut source = FakeSource::new();
    source.fail_on = Some(march(7));

    let mut h = harness(
        source,
        daily(vec![("StartDate", "2024-03-05".into())]),
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(h.status.watermarks(), vec![march(5), march(6)]);
    assert_eq!(h.status.status(), RunStatus::Error);
    assert!(h.status.last_error().unwrap().contains("HTTP 500"));
    assert!(h.status.last_import().is_none());

    let rows = h.sinks.rows("daily_stats").await;
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r["date"] != "2024-03-07"));
}

#[tokio::test]
async fn test_empty_days_write_once_per_day() {
    let mut source = FakeSource::new();
    source.rows_per_day = 0;

    let mut h = harness(
        source,
        daily(vec![("StartDate", "2024-03-08".into())]),
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    let node = report.node("dailyStats").unwrap();
    assert_eq!(node.rows, 0);
    assert_eq!(node.writes, 2);
    assert_eq!(h.status.last_requested_date(), Some(march(9)));
}

#[tokio::test]
async fn test_empty_days_without_create_empty_tables() {
    let mut source = FakeSource::new();
    source.rows_per_day = 0;

    let mut h = harness(
        source,
        daily(vec![
            ("StartDate", "2024-03-08".into()),
            ("CreateEmptyTables", false.into()),
        ]),
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.node("dailyStats").unwrap().writes, 0);
    assert_eq!(h.sinks.writes("daily_stats").await, 0);
}

#[tokio::test]
async fn test_field_completion_uses_schema_fields() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![("StartDate", "2024-03-09".into())]),
        RunConfig::incremental(),
    );
    h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    let rows = h.sinks.rows("daily_stats").await;
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row["cost"], serde_json::Value::Null);
        assert_eq!(row.len(), 4);
    }
}

#[tokio::test]
async fn test_partitions_are_fetched_per_day() {
    let mut source = FakeSource::new();
    source.partitions = vec![Some("a".to_string()), Some("b".to_string())];

    let mut h = harness(
        source,
        daily(vec![("StartDate", "2024-03-08".into())]),
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(h.source.fetches(), 4);
    let node = report.node("dailyStats").unwrap();
    assert_eq!(node.writes, 4);
    assert_eq!(node.rows, 8);
    assert_eq!(h.sinks.rows("daily_stats").await.len(), 8);
    // One sink for the whole node
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_backfill_range_leaves_watermark_alone() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![("LastRequestedDate", "2024-03-09".into())]),
        RunConfig::backfill()
            .with_start_date(march(1))
            .with_end_date(march(3)),
    );
    h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(h.source.fetched_days(), vec![march(1), march(2), march(3)]);
    assert!(h.status.watermarks().is_empty());
    assert_eq!(h.orchestrator.config().date("LastRequestedDate"), Some(march(9)));
}

#[tokio::test]
async fn test_max_fetching_days_caps_backfill() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![
            ("StartDate", "2024-03-01".into()),
            ("MaxFetchingDays", 4.into()),
        ]),
        RunConfig::backfill(),
    );
    h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        h.source.fetched_days(),
        vec![march(1), march(2), march(3), march(4)]
    );
}

#[tokio::test]
async fn test_backfill_requires_start_date() {
    let mut h = harness(FakeSource::new(), daily(Vec::new()), RunConfig::backfill());
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "StartDate"));
    assert_eq!(h.status.status(), RunStatus::Error);
}

#[tokio::test]
async fn test_destination_prefix() {
    let mut h = harness(
        FakeSource::new(),
        daily(vec![
            ("StartDate", "2024-03-09".into()),
            ("DestinationTableNamePrefix", "acme_".into()),
        ]),
        RunConfig::incremental(),
    );
    h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(h.sinks.destinations().await, vec!["acme_daily_stats".to_string()]);
    let table = h.sinks.table("acme_daily_stats").await.unwrap();
    assert_eq!(table.spec.description, "Daily stats https://example.com/docs");
    assert_eq!(table.spec.unique_keys, vec!["date", "partition", "clicks"]);
}

// ============================================================================
// Multiple Time-Series Nodes
// ============================================================================

fn both_series(values: Vec<(&'static str, ParameterValue)>) -> Vec<(&'static str, ParameterValue)> {
    let mut all = vec![("Fields", "dailyStats date, otherStats date".into())];
    all.extend(values);
    all
}

#[tokio::test]
async fn test_time_series_nodes_share_one_window() {
    let mut h = harness(
        FakeSource::new(),
        both_series(vec![("StartDate", "2024-03-07".into())]),
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    let days = vec![march(7), march(8), march(9)];
    assert_eq!(h.source.days_of("dailyStats"), days);
    assert_eq!(h.source.days_of("otherStats"), days);
    // Every node writes a day before the next day starts
    assert_eq!(
        h.source.fetched_days(),
        vec![march(7), march(7), march(8), march(8), march(9), march(9)]
    );

    assert_eq!(report.nodes.len(), 2);
    assert_eq!(report.nodes[0].node, "dailyStats");
    assert_eq!(report.nodes[1].node, "otherStats");
    assert_eq!(report.node("otherStats").unwrap().rows, 6);
    assert_eq!(h.sinks.rows("other_stats").await.len(), 6);
    assert_eq!(report.stats.days_processed, 3);
    assert_eq!(h.status.watermarks(), days);
}

#[tokio::test]
async fn test_resumed_window_covers_every_node() {
    let mut h = harness(
        FakeSource::new(),
        both_series(vec![
            ("LastRequestedDate", "2024-03-07".into()),
            ("ReimportLookbackWindow", 0.into()),
        ]),
        RunConfig::incremental(),
    );
    h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(h.source.days_of("dailyStats"), vec![march(8), march(9)]);
    assert_eq!(h.source.days_of("otherStats"), vec![march(8), march(9)]);
    assert_eq!(h.status.watermarks(), vec![march(8), march(9)]);
}

#[tokio::test]
async fn test_failure_in_later_node_holds_watermark() {
    let mut source = FakeSource::new();
    source.fail_on_node = Some(("otherStats", march(8)));

    let mut h = harness(
        source,
        both_series(vec![("StartDate", "2024-03-07".into())]),
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::Fetch { .. }));
    // dailyStats wrote March 8 but otherStats did not
    assert_eq!(h.sinks.rows("daily_stats").await.len(), 4);
    assert_eq!(h.sinks.rows("other_stats").await.len(), 2);
    assert_eq!(h.status.watermarks(), vec![march(7)]);
    assert_eq!(h.orchestrator.config().date("LastRequestedDate"), Some(march(7)));
    assert_eq!(h.source.days_of("dailyStats"), vec![march(7), march(8)]);
}

#[tokio::test]
async fn test_catalog_and_time_series_keep_selection_order() {
    let mut h = harness(
        FakeSource::new(),
        vec![
            ("Fields", "dailyStats date, items id, otherStats date".into()),
            ("StartDate", "2024-03-09".into()),
        ],
        RunConfig::incremental(),
    );
    let report = h.orchestrator.run(&CancellationToken::new()).await.unwrap();

    let names: Vec<&str> = report.nodes.iter().map(|n| n.node.as_str()).collect();
    assert_eq!(names, vec!["dailyStats", "items", "otherStats"]);
    assert!(report.nodes.iter().all(|n| n.outcome == NodeOutcome::Done));
}

// ============================================================================
// Preflight and Status Tests
// ============================================================================

#[tokio::test]
async fn test_missing_unique_keys_fail_before_any_fetch() {
    let mut h = harness(
        FakeSource::new(),
        vec![("Fields", "items id, broken id".into())],
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, Error::Schema { ref node, .. } if node == "broken"));
    assert_eq!(h.source.fetches(), 0);
    assert!(h.sinks.destinations().await.is_empty());
    assert_eq!(h.status.status(), RunStatus::Error);
}

#[tokio::test]
async fn test_unknown_node() {
    let mut h = harness(
        FakeSource::new(),
        vec![("Fields", "campaigns id".into())],
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Schema { ref node, .. } if node == "campaigns"));
}

#[tokio::test]
async fn test_invalid_configuration_is_reported() {
    let mut h = harness(
        FakeSource::new(),
        vec![("CreateEmptyTables", "true".into())],
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(h.status.status(), RunStatus::Error);
    assert!(h.status.messages().iter().any(|m| m.starts_with("Error:")));
}

#[tokio::test]
async fn test_boolean_string_is_not_coerced() {
    let mut h = harness(
        FakeSource::new(),
        vec![
            ("Fields", "items id".into()),
            ("CreateEmptyTables", "true".into()),
        ],
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "CreateEmptyTables"));
}

#[tokio::test]
async fn test_run_refused_while_in_progress() {
    let mut h = harness(
        FakeSource::new(),
        vec![("Fields", "items id".into())],
        RunConfig::incremental(),
    );
    h.status
        .handle_status_update(StatusUpdate::new(RunStatus::InProgress))
        .await
        .unwrap();

    let err = h.orchestrator.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::State { .. }));
    assert_eq!(h.status.warnings(), vec!["Import is already in progress"]);
    assert_eq!(h.source.fetches(), 0);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancellation_between_days() {
    let cancel = CancellationToken::new();
    let mut source = FakeSource::new();
    source.cancel_on = Some((march(8), cancel.clone()));

    let mut h = harness(
        source,
        daily(vec![("StartDate", "2024-03-07".into())]),
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(h.source.fetched_days(), vec![march(7), march(8)]);
    assert_eq!(h.status.last_requested_date(), Some(march(8)));
    assert_eq!(h.status.status(), RunStatus::Error);
}

#[tokio::test]
async fn test_cancelled_before_first_node() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut h = harness(
        FakeSource::new(),
        vec![("Fields", "items id".into())],
        RunConfig::incremental(),
    );
    let err = h.orchestrator.run(&cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(h.source.fetches(), 0);
}

// ============================================================================
// Window Tests
// ============================================================================

fn window_config(values: Vec<(&str, ParameterValue)>) -> Configuration {
    let mut config = build_configuration(HostKind::Replay, &FakeSource::new());
    config.set_values(values);
    config.set_value("Fields", "items id");
    config.validate().unwrap();
    config
}

#[test_case(0, 6 ; "no lookback")]
#[test_case(2, 4 ; "lookback two")]
fn test_incremental_window(lookback: i32, start_day: u32) {
    let config = window_config(vec![
        ("LastRequestedDate", "2024-03-05".into()),
        ("ReimportLookbackWindow", lookback.into()),
    ]);

    let window = compute_window(&RunConfig::incremental(), &config, march(10)).unwrap();
    assert_eq!(window, DateWindow::new(march(start_day), i64::from(10 - start_day)));
}

#[test]
fn test_incremental_window_without_start_date() {
    let config = window_config(Vec::new());
    let err = compute_window(&RunConfig::incremental(), &config, march(10)).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref parameter, .. } if parameter == "StartDate"));
}

#[test]
fn test_backfill_window_defaults_to_yesterday() {
    let config = window_config(vec![("StartDate", "2024-03-01".into())]);
    let window = compute_window(&RunConfig::backfill(), &config, march(10)).unwrap();
    assert_eq!(window, DateWindow::new(march(1), 9));
    assert_eq!(window.end(), Some(march(9)));
}

#[test]
fn test_backfill_window_uses_end_date() {
    let config = window_config(vec![
        ("StartDate", "2024-02-28".into()),
        ("EndDate", "2024-03-01".into()),
    ]);
    let window = compute_window(&RunConfig::backfill(), &config, march(10)).unwrap();
    assert_eq!(
        window.dates().collect::<Vec<_>>(),
        vec![date(2, 28), date(2, 29), march(1)]
    );
}

#[test]
fn test_run_range_overrides_incremental() {
    let config = window_config(vec![("LastRequestedDate", "2024-03-09".into())]);
    let run = RunConfig::incremental().with_start_date(march(2));
    let window = compute_window(&run, &config, march(10)).unwrap();
    assert_eq!(window, DateWindow::new(march(2), 8));
}

#[test]
fn test_inverted_range_is_empty() {
    let config = window_config(Vec::new());
    let run = RunConfig::backfill()
        .with_start_date(march(5))
        .with_end_date(march(3));
    let window = compute_window(&run, &config, march(10)).unwrap();
    assert!(window.is_empty());
    assert_eq!(window.dates().count(), 0);
    assert_eq!(window.end(), None);
}

// ============================================================================
// Preparation Tests
// ============================================================================

#[test]
fn test_add_missing_fields_to_data() {
    let schema = NodeSchema::new("items")
        .field("id", FieldType::Integer)
        .field("name", FieldType::String);
    let mut rows = vec![row(json!({"id": 1})), row(json!({"id": 2, "name": "b", "extra": true}))];

    add_missing_fields_to_data(&mut rows, &schema);

    assert_eq!(rows[0]["name"], serde_json::Value::Null);
    assert_eq!(rows[1]["name"], "b");
    assert_eq!(rows[1]["extra"], true);
}

#[test]
fn test_destination_name() {
    let schema = NodeSchema::new("adGroupStats");
    let mut config = Configuration::new(HostKind::Replay);
    assert_eq!(destination_name(&config, &schema), "ad_group_stats");

    config.set_value("DestinationTableNamePrefix", "client_");
    assert_eq!(destination_name(&config, &schema), "client_ad_group_stats");
}

#[test]
fn test_sink_description() {
    assert_eq!(sink_description(&NodeSchema::new("a")), "");
    assert_eq!(sink_description(&NodeSchema::new("a").description("Ads")), "Ads");
}

// ============================================================================
// RunConfig Tests
// ============================================================================

#[test]
fn test_run_config_from_json() {
    let run: RunConfig =
        serde_json::from_str(r#"{"type": "MANUAL_BACKFILL", "startDate": "2024-01-01"}"#).unwrap();
    assert_eq!(run.mode, RunMode::FullBackfill);
    assert_eq!(run.start_date, Some(date(1, 1)));
    assert_eq!(run.end_date, None);

    let run: RunConfig = serde_json::from_str("{}").unwrap();
    assert!(run.is_incremental());
}

#[test]
fn test_run_stats() {
    let mut stats = RunStats::new();
    stats.add_write(3);
    stats.add_write(0);
    stats.add_fetch();
    stats.add_day();
    assert_eq!(stats.writes, 2);
    assert_eq!(stats.rows_written, 3);
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.days_processed, 1);
}
