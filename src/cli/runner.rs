//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, ModeArg, OutputFormat};
use crate::config::{load_parameters_from_path, Configuration, ParameterValue};
use crate::engine::{Orchestrator, RunConfig, RunReport};
use crate::error::{Error, Result};
use crate::runtime::{HostKind, ReplayRuntime, RuntimeContext};
use crate::schema::FieldSelection;
use crate::sink::JsonlSinkFactory;
use crate::source::{build_configuration, Source, FIELDS, LAST_REQUESTED_DATE};
use crate::sources::{get_builtin, list_builtin_info};
use crate::state::StateManager;
use crate::types::JsonValue;
use chrono::NaiveDate;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                mode,
                start_date,
                end_date,
                run_config,
                output,
            } => {
                let run_config = match run_config {
                    Some(path) => load_run_config(path)?,
                    None => build_run_config(*mode, *start_date, *end_date),
                };
                let report = self.import(run_config, output).await?;
                self.output_message(&json!({
                    "type": "REPORT",
                    "report": report
                }));
                Ok(())
            }
            Commands::Validate => self.validate().await,
            Commands::Spec => self.spec(),
            Commands::List => {
                self.list_sources();
                Ok(())
            }
        }
    }

    /// Import every selected node into `<output>/<destination>.jsonl`.
    ///
    /// Ctrl-C cancels the run at the next node or day boundary.
    pub async fn import(&self, run_config: RunConfig, output: &Path) -> Result<RunReport> {
        let source = self.load_source()?;
        let context = self.runtime_context()?;
        let state = self.load_state()?;
        let mut config = self.load_config(context.kind(), source.as_ref())?;

        if let Some(date) = state.last_requested_date().await {
            if config.date(LAST_REQUESTED_DATE).map_or(true, |current| current < date) {
                debug!("Resuming from stored watermark {date}");
                config.set_value(LAST_REQUESTED_DATE, date);
            }
        }

        let mut orchestrator = Orchestrator::new(
            context,
            source,
            Arc::new(JsonlSinkFactory::new(output)),
            config,
            run_config,
        )
        .with_status(Arc::new(state));

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current day");
                on_signal.cancel();
            }
        });

        let result = orchestrator.run(&cancel).await;
        signal_task.abort();
        result
    }

    /// Validate parameters and the node selection
    async fn validate(&self) -> Result<()> {
        let source = self.load_source()?;
        let mut config = self.load_config(HostKind::Native, source.as_ref())?;
        config.validate()?;

        let selection = FieldSelection::parse(config.string(FIELDS).unwrap_or_default())?;
        if selection.is_empty() {
            return Err(Error::configuration(FIELDS, "No nodes were selected"));
        }
        for node in selection.nodes() {
            let schema = source.node_schema(node).ok_or_else(|| {
                Error::schema(node, format!("Source '{}' has no such node", source.name()))
            })?;
            schema.validate_unique_keys()?;
        }

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Configuration for '{}' is valid with {} nodes selected",
                    source.name(),
                    selection.len()
                )
            }
        }));

        Ok(())
    }

    /// Show parameters and node schemas
    fn spec(&self) -> Result<()> {
        let source = self.load_source()?;
        let config = build_configuration(HostKind::Native, source.as_ref());

        self.output_message(&json!({
            "type": "SPEC",
            "spec": {
                "source": source.name(),
                "parameters": config.describe(),
                "nodes": source.schemas()
            }
        }));

        Ok(())
    }

    /// List built-in sources
    fn list_sources(&self) {
        let sources: Vec<JsonValue> = list_builtin_info()
            .into_iter()
            .map(|info| {
                let nodes = get_builtin(info.name)
                    .map(|source| source.node_names().iter().map(ToString::to_string).collect())
                    .unwrap_or_else(Vec::<String>::new);
                json!({
                    "name": info.name,
                    "description": info.description,
                    "aliases": info.aliases,
                    "nodes": nodes
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "SOURCES",
            "sources": sources
        }));
    }

    /// Resolve `--source` against the built-in registry
    fn load_source(&self) -> Result<Arc<dyn Source>> {
        let name = self
            .cli
            .source
            .as_deref()
            .ok_or_else(|| Error::configuration("source", "Source not specified (use -S flag)"))?;
        get_builtin(name).ok_or_else(|| {
            Error::configuration(
                "source",
                format!("Unknown source '{name}'; run `list` to see the built-in sources"),
            )
        })
    }

    /// Replay runtime when `--replay` is given, the network otherwise
    fn runtime_context(&self) -> Result<RuntimeContext> {
        match &self.cli.replay {
            Some(dir) => Ok(RuntimeContext::from_runtime(Arc::new(
                ReplayRuntime::from_dir(dir)?,
            ))),
            None => RuntimeContext::new(HostKind::Native),
        }
    }

    /// Base and source parameters, then the parameter file, then `--set`
    fn load_config(&self, host: HostKind, source: &dyn Source) -> Result<Configuration> {
        let mut config = build_configuration(host, source);
        if let Some(path) = &self.cli.params {
            config.merge_parameters(load_parameters_from_path(path)?);
        }
        for entry in &self.cli.set {
            let (name, value) = parse_override(entry)?;
            config.set_value(&name, value);
        }
        Ok(config)
    }

    fn load_state(&self) -> Result<StateManager> {
        match &self.cli.state {
            Some(path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }

    /// Output a message
    fn output_message(&self, msg: &JsonValue) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Split a `KEY=VALUE` override.
///
/// Values that parse as JSON keep their type (`true`, `30`); anything
/// else is taken as a string.
pub fn parse_override(entry: &str) -> Result<(String, ParameterValue)> {
    let (name, raw) = entry
        .split_once('=')
        .ok_or_else(|| Error::configuration(entry, "Expected KEY=VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::configuration(entry, "Parameter name is empty"));
    }
    let value = serde_json::from_str::<JsonValue>(raw)
        .map_or_else(|_| ParameterValue::from(raw), ParameterValue::from);
    Ok((name.to_string(), value))
}

fn build_run_config(
    mode: ModeArg,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> RunConfig {
    let mut run_config = match mode {
        ModeArg::Incremental => RunConfig::incremental(),
        ModeArg::Backfill => RunConfig::backfill(),
    };
    run_config.start_date = start_date;
    run_config.end_date = end_date;
    run_config
}

fn load_run_config(path: &Path) -> Result<RunConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
