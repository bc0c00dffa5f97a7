//! Source strategy interface
//!
//! A [`Source`] knows one provider: which parameters it needs, which nodes
//! it exposes and how to fetch a node's rows. Control flow (windows,
//! watermarks, storage) belongs to the orchestrator in [`crate::engine`].

use crate::config::{Attribute, Configuration, Parameter};
use crate::error::Result;
use crate::runtime::{HostKind, HostRuntime};
use crate::schema::NodeSchema;
use crate::types::Row;
use async_trait::async_trait;
use chrono::NaiveDate;

// ============================================================================
// Well-known parameter names
// ============================================================================

pub const FIELDS: &str = "Fields";
pub const START_DATE: &str = "StartDate";
pub const END_DATE: &str = "EndDate";
pub const LAST_REQUESTED_DATE: &str = "LastRequestedDate";
pub const REIMPORT_LOOKBACK_WINDOW: &str = "ReimportLookbackWindow";
pub const MAX_FETCHING_DAYS: &str = "MaxFetchingDays";
pub const CREATE_EMPTY_TABLES: &str = "CreateEmptyTables";
pub const DESTINATION_TABLE_NAME_PREFIX: &str = "DestinationTableNamePrefix";

/// Parameters every source shares; provider overrides are merged on top
pub fn base_parameters() -> Vec<(String, Parameter)> {
    vec![
        (
            format!("{FIELDS}*"),
            Parameter::new()
                .required_type("string")
                .label("Fields")
                .description("Comma-separated list of 'node field' pairs to import"),
        ),
        (
            START_DATE.to_string(),
            Parameter::new()
                .required_type("date")
                .label("Start Date")
                .description("First day to import when no watermark exists")
                .attribute(Attribute::ManualBackfill),
        ),
        (
            END_DATE.to_string(),
            Parameter::new()
                .required_type("date")
                .label("End Date")
                .description("Last day of a backfill; defaults to yesterday")
                .attribute(Attribute::ManualBackfill)
                .attribute(Attribute::HideInConfigForm),
        ),
        (
            LAST_REQUESTED_DATE.to_string(),
            Parameter::new()
                .required_type("date")
                .label("Last Requested Date")
                .description("Last time-series day that was written")
                .attribute(Attribute::HideInConfigForm),
        ),
        (
            format!("{REIMPORT_LOOKBACK_WINDOW}*"),
            Parameter::new()
                .required_type("number")
                .default_value(2)
                .label("Reimport Lookback Window")
                .description("Days before the watermark to fetch again"),
        ),
        (
            MAX_FETCHING_DAYS.to_string(),
            Parameter::new()
                .required_type("number")
                .label("Max Fetching Days")
                .description("Upper bound on the number of days fetched in one run"),
        ),
        (
            CREATE_EMPTY_TABLES.to_string(),
            Parameter::new()
                .required_type("boolean")
                .default_value(true)
                .label("Create Empty Tables")
                .description("Create destinations even when no rows were fetched"),
        ),
        (
            DESTINATION_TABLE_NAME_PREFIX.to_string(),
            Parameter::new()
                .required_type("string")
                .label("Destination Table Name Prefix")
                .description("Prefix for destination names; replaces the node's default name"),
        ),
    ]
}

/// Build the configuration for `source`: `Environment`, the shared base set,
/// then the provider's overrides
pub fn build_configuration(host: HostKind, source: &dyn Source) -> Configuration {
    let mut config = Configuration::new(host);
    config
        .merge_parameters(base_parameters())
        .merge_parameters(source.parameters());
    config
}

// ============================================================================
// Fetch context
// ============================================================================

/// Everything a fetch call may read
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub runtime: &'a dyn HostRuntime,
    pub config: &'a Configuration,
    pub node: &'a str,
    /// Fields selected for `node`
    pub fields: &'a [String],
    /// Partition being fetched; `None` for the single unnamed partition
    pub partition: Option<&'a str>,
}

/// Receives pages flushed by a catalog fetch before it returns
#[async_trait]
pub trait BatchReady: Send {
    async fn on_batch_ready(&mut self, rows: Vec<Row>) -> Result<()>;
}

// ============================================================================
// Source trait
// ============================================================================

/// A data provider plugged into the orchestrator
#[async_trait]
pub trait Source: Send + Sync {
    /// Short identifier, e.g. `github`
    fn name(&self) -> &str;

    /// Provider-specific parameters merged over [`base_parameters`]
    fn parameters(&self) -> Vec<(String, Parameter)>;

    /// Every node this source can fetch
    fn schemas(&self) -> &[NodeSchema];

    fn node_schema(&self, node: &str) -> Option<&NodeSchema> {
        self.schemas().iter().find(|schema| schema.name == node)
    }

    fn node_names(&self) -> Vec<&str> {
        self.schemas().iter().map(|schema| schema.name.as_str()).collect()
    }

    /// Partitions each node is fetched for (account ids and the like)
    fn partitions(&self, _config: &Configuration) -> Result<Vec<Option<String>>> {
        Ok(vec![None])
    }

    /// Resolve credentials into the configuration before any fetch
    async fn authenticate(
        &self,
        _runtime: &dyn HostRuntime,
        _config: &mut Configuration,
    ) -> Result<()> {
        Ok(())
    }

    /// Fetch a catalog node.
    ///
    /// Pages may be flushed early through `on_batch_ready`; rows returned
    /// here are written after the call completes.
    async fn fetch_catalog(
        &self,
        ctx: &FetchContext<'_>,
        on_batch_ready: &mut dyn BatchReady,
    ) -> Result<Vec<Row>>;

    /// Fetch one day of a time-series node
    async fn fetch_time_series_day(&self, ctx: &FetchContext<'_>, day: NaiveDate)
        -> Result<Vec<Row>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    struct Dummy {
        schemas: Vec<NodeSchema>,
    }

    #[async_trait]
    impl Source for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }

        fn parameters(&self) -> Vec<(String, Parameter)> {
            vec![
                ("ApiKey*".to_string(), Parameter::new().attribute(Attribute::Secret)),
                (REIMPORT_LOOKBACK_WINDOW.to_string(), Parameter::new().default_value(5)),
            ]
        }

        fn schemas(&self) -> &[NodeSchema] {
            &self.schemas
        }

        async fn fetch_catalog(
            &self,
            _ctx: &FetchContext<'_>,
            _on_batch_ready: &mut dyn BatchReady,
        ) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn fetch_time_series_day(
            &self,
            _ctx: &FetchContext<'_>,
            _day: NaiveDate,
        ) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }
    }

    fn dummy() -> Dummy {
        Dummy {
            schemas: vec![
                NodeSchema::new("items").field("id", FieldType::Integer),
                NodeSchema::new("daily").field("date", FieldType::Date).time_series(),
            ],
        }
    }

    #[test]
    fn test_node_lookup() {
        let source = dummy();
        assert_eq!(source.node_names(), vec!["items", "daily"]);
        assert!(source.node_schema("daily").unwrap().is_time_series);
        assert!(source.node_schema("missing").is_none());
        assert_eq!(source.partitions(&Configuration::new(HostKind::Replay)).unwrap(), vec![None]);
    }

    #[test]
    fn test_build_configuration_merges_overrides() {
        let config = build_configuration(HostKind::Native, &dummy());
        let names: Vec<&str> = config.names().collect();

        assert_eq!(names[0], "Environment");
        assert_eq!(names[1], "Fields");
        assert_eq!(names.last(), Some(&"ApiKey"));
        assert!(config.get("ApiKey").unwrap().is_required());
        assert!(config.get("Fields").unwrap().is_required());

        let lookback = config.get(REIMPORT_LOOKBACK_WINDOW).unwrap();
        assert_eq!(lookback.default, Some(5.into()));
        assert_eq!(lookback.required_type.as_deref(), Some("number"));
    }
}
