//! In-memory sink
//!
//! Tables live behind a shared handle so callers can inspect what a run
//! wrote after the orchestrator has dropped its sinks.

use super::types::{upsert, Sink, SinkFactory, SinkSpec};
use crate::config::Configuration;
use crate::error::Result;
use crate::types::Row;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Contents of one destination
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub spec: SinkSpec,
    pub rows: Vec<Row>,
    /// Number of `save_data` calls, including empty ones
    pub writes: usize,
    index: HashMap<String, usize>,
}

type Tables = Arc<Mutex<BTreeMap<String, MemoryTable>>>;

/// Creates [`MemorySink`]s sharing one table map keyed by destination name
#[derive(Debug, Clone, Default)]
pub struct MemorySinkFactory {
    tables: Tables,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a destination, if it was ever initialised
    pub async fn table(&self, destination: &str) -> Option<MemoryTable> {
        self.tables.lock().await.get(destination).cloned()
    }

    pub async fn rows(&self, destination: &str) -> Vec<Row> {
        self.table(destination)
            .await
            .map(|table| table.rows)
            .unwrap_or_default()
    }

    pub async fn writes(&self, destination: &str) -> usize {
        self.table(destination).await.map_or(0, |table| table.writes)
    }

    /// Destination names in sorted order
    pub async fn destinations(&self) -> Vec<String> {
        self.tables.lock().await.keys().cloned().collect()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn create(&self, _config: &Configuration, spec: SinkSpec) -> Result<Box<dyn Sink>> {
        Ok(Box::new(MemorySink {
            spec,
            tables: Arc::clone(&self.tables),
        }))
    }
}

/// Upserting sink backed by a [`MemorySinkFactory`] table
#[derive(Debug)]
pub struct MemorySink {
    spec: SinkSpec,
    tables: Tables,
}

#[async_trait]
impl Sink for MemorySink {
    async fn init(&mut self) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .entry(self.spec.destination_name.clone())
            .or_insert_with(|| MemoryTable {
                spec: self.spec.clone(),
                ..MemoryTable::default()
            });
        Ok(())
    }

    async fn save_data(&mut self, rows: Vec<Row>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let table = tables
            .entry(self.spec.destination_name.clone())
            .or_insert_with(|| MemoryTable {
                spec: self.spec.clone(),
                ..MemoryTable::default()
            });
        upsert(&self.spec, &mut table.rows, &mut table.index, rows);
        table.writes += 1;
        Ok(())
    }

    fn spec(&self) -> &SinkSpec {
        &self.spec
    }
}
