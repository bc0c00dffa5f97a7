//! Sink contract
//!
//! A sink receives field-completed rows for one node and stores them,
//! replacing any stored row that has the same unique key.

use crate::config::Configuration;
use crate::error::Result;
use crate::types::{JsonValue, Row};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a sink needs to know about the node it stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkSpec {
    /// Node name as declared by the source
    pub node: String,
    /// Fields that identify a row; never empty
    pub unique_keys: Vec<String>,
    /// Declared field names, in schema order
    pub fields: Vec<String>,
    /// Node description followed by its documentation link
    pub description: String,
    /// Table, sheet or file name the rows land in
    pub destination_name: String,
}

impl SinkSpec {
    pub fn new(node: impl Into<String>, destination_name: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            destination_name: destination_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unique_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Dedup key of a row: its unique-key values in declaration order.
    ///
    /// Missing keys count as null, so two rows both lacking a key collide.
    pub fn row_key(&self, row: &Row) -> String {
        let values: Vec<&JsonValue> = self
            .unique_keys
            .iter()
            .map(|key| row.get(key).unwrap_or(&JsonValue::Null))
            .collect();
        serde_json::to_string(&values).unwrap_or_default()
    }
}

/// Storage for one node
#[async_trait]
pub trait Sink: Send + Sync {
    /// Prepare the destination (create tables, load existing keys)
    async fn init(&mut self) -> Result<()>;

    /// Upsert rows by unique key. An empty batch still creates the destination.
    async fn save_data(&mut self, rows: Vec<Row>) -> Result<()>;

    /// Settings this sink was built with
    fn spec(&self) -> &SinkSpec;
}

/// Builds a sink per node
pub trait SinkFactory: Send + Sync {
    fn create(&self, config: &Configuration, spec: SinkSpec) -> Result<Box<dyn Sink>>;
}

/// Upsert `rows` into `table`, keeping first-insert order for replaced rows
pub(crate) fn upsert(
    spec: &SinkSpec,
    table: &mut Vec<Row>,
    index: &mut std::collections::HashMap<String, usize>,
    rows: Vec<Row>,
) {
    for row in rows {
        let key = spec.row_key(&row);
        match index.get(&key) {
            Some(&position) => table[position] = row,
            None => {
                index.insert(key, table.len());
                table.push(row);
            }
        }
    }
}
