//! Execution engine module
//!
//! Drives one connector run: validates the configuration, walks the nodes
//! selected in `Fields` and writes what the source returns into sinks.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Orchestrator` - Runs catalog and time-series nodes against a `Source`
//! - `RunConfig` - Incremental or backfill mode with an optional date range
//! - `RunReport` - Per-node outcome and run statistics
//!
//! Catalog nodes are processed one at a time in selection order. Time-series
//! nodes share a single date window and are fetched day by day, every node
//! writing a day before the next one starts. After each completed day of an
//! incremental run the watermark moves forward, so an interrupted run
//! resumes where it stopped.

mod prepare;
mod types;
mod window;

pub use prepare::{add_missing_fields_to_data, destination_name, sink_description};
pub use types::{DateWindow, NodeOutcome, NodeReport, RunConfig, RunReport, RunStats};
pub use window::compute_window;

use crate::config::{Configuration, MemoryStatus, RunStatus, StatusReporter, StatusUpdate};
use crate::error::{Error, Result};
use crate::runtime::RuntimeContext;
use crate::schema::{FieldSelection, NodeSchema};
use crate::sink::{Sink, SinkFactory, SinkSpec};
use crate::source::{BatchReady, FetchContext, Source, CREATE_EMPTY_TABLES, FIELDS, LAST_REQUESTED_DATE};
use crate::types::Row;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs a source against a sink factory
pub struct Orchestrator {
    /// Host runtime used for every fetch
    context: RuntimeContext,
    source: Arc<dyn Source>,
    sink_factory: Arc<dyn SinkFactory>,
    config: Configuration,
    run_config: RunConfig,
    status: Arc<dyn StatusReporter>,
    /// Sinks created during this run, by node name
    sinks: HashMap<String, Box<dyn Sink>>,
    stats: RunStats,
}

impl Orchestrator {
    /// Create an orchestrator reporting to an in-memory status
    pub fn new(
        context: RuntimeContext,
        source: Arc<dyn Source>,
        sink_factory: Arc<dyn SinkFactory>,
        config: Configuration,
        run_config: RunConfig,
    ) -> Self {
        Self {
            context,
            source,
            sink_factory,
            config,
            run_config,
            status: Arc::new(MemoryStatus::new()),
            sinks: HashMap::new(),
            stats: RunStats::default(),
        }
    }

    /// Report progress and watermarks to `status`
    #[must_use]
    pub fn with_status(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    /// The configuration, including any watermark advanced by a run
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run_config
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Import every selected node.
    ///
    /// Any failure is logged, recorded as an `ERROR` status and returned.
    /// Cancellation is honoured between nodes and between days.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunReport> {
        if self.status.is_in_progress().await {
            let message = "Import is already in progress";
            self.status.log_message(message).await;
            self.status.add_warning_to_current_status(message).await;
            return Err(Error::state(message));
        }

        self.sinks.clear();
        self.stats = RunStats::new();
        self.status
            .handle_status_update(StatusUpdate::new(RunStatus::InProgress))
            .await?;

        let start = Instant::now();
        match self.import(cancel).await {
            Ok(nodes) => {
                self.stats.set_duration(start.elapsed().as_millis() as u64);
                self.status
                    .handle_status_update(StatusUpdate::new(RunStatus::Done))
                    .await?;
                self.status.update_last_import_date().await?;
                info!(
                    "Import finished: {} rows in {} writes",
                    self.stats.rows_written, self.stats.writes
                );
                Ok(RunReport {
                    nodes,
                    stats: self.stats.clone(),
                })
            }
            Err(e) => {
                self.status.log_message(&format!("Error: {e}")).await;
                if let Err(status_error) = self
                    .status
                    .handle_status_update(StatusUpdate::error(e.to_string()))
                    .await
                {
                    warn!("Failed to record error status: {status_error}");
                }
                Err(e)
            }
        }
    }

    async fn import(&mut self, cancel: &CancellationToken) -> Result<Vec<NodeReport>> {
        self.config.validate()?;

        let source = Arc::clone(&self.source);
        source
            .authenticate(self.context.runtime(), &mut self.config)
            .await?;

        let selection = FieldSelection::parse(self.config.string(FIELDS).unwrap_or_default())?;
        if selection.is_empty() {
            return Err(Error::configuration(FIELDS, "No nodes were selected"));
        }

        let mut schemas = Vec::with_capacity(selection.len());
        for node in selection.nodes() {
            let schema = source.node_schema(node).ok_or_else(|| {
                Error::schema(node, format!("Source '{}' has no such node", source.name()))
            })?;
            schema.validate_unique_keys()?;
            for field in selection.fields(node) {
                if !schema.has_field(field) {
                    warn!("Field '{field}' is not declared for node '{node}'");
                }
            }
            schemas.push(schema);
        }

        // Catalog nodes run in selection order; time-series nodes share one
        // window and are filled in at their selection index afterwards.
        let mut reports = Vec::with_capacity(schemas.len());
        let mut series = Vec::new();
        for (index, schema) in schemas.iter().copied().enumerate() {
            if schema.is_time_series {
                series.push(index);
                reports.push(NodeReport::skipped(&schema.name));
                continue;
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            debug!("Processing node '{}'", schema.name);
            let fields = selection.fields(&schema.name);
            reports.push(self.process_catalog(source.as_ref(), schema, fields).await?);
        }

        if !series.is_empty() {
            let nodes: Vec<&NodeSchema> = series.iter().map(|&index| schemas[index]).collect();
            let series_reports = self
                .process_time_series(source.as_ref(), &nodes, &selection, cancel)
                .await?;
            for (index, report) in series.into_iter().zip(series_reports) {
                reports[index] = report;
            }
        }

        Ok(reports)
    }

    async fn process_catalog(
        &mut self,
        source: &dyn Source,
        schema: &NodeSchema,
        fields: &[String],
    ) -> Result<NodeReport> {
        let partitions = source.partitions(&self.config)?;
        let create_empty = self.create_empty_tables();

        let sink = storage(
            &mut self.sinks,
            self.sink_factory.as_ref(),
            &self.config,
            schema,
        )
        .await?;
        let mut writer = NodeWriter::new(sink, schema, &mut self.stats);

        for partition in &partitions {
            let ctx = FetchContext {
                runtime: self.context.runtime(),
                config: &self.config,
                node: &schema.name,
                fields,
                partition: partition.as_deref(),
            };
            writer.stats.add_fetch();
            let rows = source.fetch_catalog(&ctx, &mut writer).await?;
            if !rows.is_empty() {
                writer.write(rows).await?;
            }
        }

        if writer.rows == 0 && create_empty {
            writer.write(Vec::new()).await?;
        }

        let report = writer.report();
        self.status
            .log_message(&format!("{} rows of {} were fetched", report.rows, schema.name))
            .await;
        Ok(report)
    }

    /// Fetch every time-series node day by day over one shared window.
    ///
    /// All nodes write a day before the watermark moves to it, so a failure
    /// in any node leaves the watermark on the last day every node completed.
    async fn process_time_series(
        &mut self,
        source: &dyn Source,
        nodes: &[&NodeSchema],
        selection: &FieldSelection,
        cancel: &CancellationToken,
    ) -> Result<Vec<NodeReport>> {
        let today = self.context.runtime().today();
        let window = compute_window(&self.run_config, &self.config, today)?;
        if window.is_empty() {
            for schema in nodes {
                self.status
                    .log_message(&format!("No days to fetch for {}", schema.name))
                    .await;
            }
            return Ok(nodes
                .iter()
                .map(|schema| NodeReport::skipped(&schema.name))
                .collect());
        }
        debug!(
            "Fetching {} days from {} for {} nodes",
            window.days,
            window.start,
            nodes.len()
        );

        let partitions = source.partitions(&self.config)?;
        let create_empty = self.create_empty_tables();
        let mut reports: Vec<NodeReport> = nodes
            .iter()
            .map(|schema| NodeReport::done(&schema.name))
            .collect();

        for day in window.dates() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            for (schema, report) in nodes.iter().copied().zip(reports.iter_mut()) {
                let fields = selection.fields(&schema.name);
                let (day_rows, day_writes) = self
                    .write_day(source, schema, fields, &partitions, create_empty, day)
                    .await?;
                report.rows += day_rows;
                report.writes += day_writes;

                let message = if day_rows > 0 {
                    format!("{day_rows} rows of {} were fetched for {day}", schema.name)
                } else {
                    format!("No records have been fetched for {} on {day}", schema.name)
                };
                self.status.log_message(&message).await;
            }
            self.stats.add_day();

            if self.run_config.is_incremental() {
                self.advance_watermark(day).await?;
            }
        }

        Ok(reports)
    }

    /// Fetch and write one node's partitions for `day`, returning rows and writes
    async fn write_day(
        &mut self,
        source: &dyn Source,
        schema: &NodeSchema,
        fields: &[String],
        partitions: &[Option<String>],
        create_empty: bool,
        day: NaiveDate,
    ) -> Result<(usize, usize)> {
        let sink = storage(
            &mut self.sinks,
            self.sink_factory.as_ref(),
            &self.config,
            schema,
        )
        .await?;
        let mut writer = NodeWriter::new(sink, schema, &mut self.stats);

        for partition in partitions {
            let ctx = FetchContext {
                runtime: self.context.runtime(),
                config: &self.config,
                node: &schema.name,
                fields,
                partition: partition.as_deref(),
            };
            writer.stats.add_fetch();
            let rows = source.fetch_time_series_day(&ctx, day).await?;
            if !rows.is_empty() {
                writer.write(rows).await?;
            }
        }

        if writer.rows == 0 && create_empty {
            writer.write(Vec::new()).await?;
        }

        Ok((writer.rows, writer.writes))
    }

    /// Move the watermark to `day` when it is later than the current one
    async fn advance_watermark(&mut self, day: NaiveDate) -> Result<()> {
        if self
            .config
            .date(LAST_REQUESTED_DATE)
            .is_some_and(|current| current >= day)
        {
            return Ok(());
        }
        self.status.update_last_requested_date(day).await?;
        self.config.set_value(LAST_REQUESTED_DATE, day);
        debug!("Watermark advanced to {day}");
        Ok(())
    }

    fn create_empty_tables(&self) -> bool {
        self.config.boolean(CREATE_EMPTY_TABLES).unwrap_or(false)
    }
}

/// Get the cached sink for `schema`, creating and initialising it first
async fn storage<'a>(
    sinks: &'a mut HashMap<String, Box<dyn Sink>>,
    factory: &dyn SinkFactory,
    config: &Configuration,
    schema: &NodeSchema,
) -> Result<&'a mut Box<dyn Sink>> {
    if !sinks.contains_key(&schema.name) {
        schema.validate_unique_keys()?;
        let spec = SinkSpec::new(&schema.name, destination_name(config, schema))
            .unique_keys(schema.unique_keys.iter().cloned())
            .fields(schema.field_names())
            .description(sink_description(schema));
        debug!(
            "Creating sink '{}' for node '{}'",
            spec.destination_name, schema.name
        );
        let mut sink = factory.create(config, spec)?;
        sink.init().await?;
        sinks.insert(schema.name.clone(), sink);
    }

    sinks
        .get_mut(&schema.name)
        .ok_or_else(|| Error::sink(format!("No sink for node '{}'", schema.name)))
}

/// Completes rows and writes them to one node's sink
struct NodeWriter<'a> {
    sink: &'a mut Box<dyn Sink>,
    schema: &'a NodeSchema,
    stats: &'a mut RunStats,
    rows: usize,
    writes: usize,
}

impl<'a> NodeWriter<'a> {
    fn new(sink: &'a mut Box<dyn Sink>, schema: &'a NodeSchema, stats: &'a mut RunStats) -> Self {
        Self {
            sink,
            schema,
            stats,
            rows: 0,
            writes: 0,
        }
    }

    async fn write(&mut self, mut rows: Vec<Row>) -> Result<()> {
        add_missing_fields_to_data(&mut rows, self.schema);
        let count = rows.len();
        self.sink.save_data(rows).await?;
        self.rows += count;
        self.writes += 1;
        self.stats.add_write(count);
        Ok(())
    }

    fn report(&self) -> NodeReport {
        NodeReport {
            node: self.schema.name.clone(),
            outcome: NodeOutcome::Done,
            rows: self.rows,
            writes: self.writes,
        }
    }
}

#[async_trait]
impl BatchReady for NodeWriter<'_> {
    async fn on_batch_ready(&mut self, rows: Vec<Row>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.write(rows).await
    }
}

#[cfg(test)]
mod tests;
