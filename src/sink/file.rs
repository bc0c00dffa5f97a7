//! JSON-lines file sink
//!
//! Each destination is `<dir>/<destination_name>.jsonl`, one row per line.
//! The whole file is rewritten on every save through a temp file and rename.

use super::types::{upsert, Sink, SinkFactory, SinkSpec};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::types::Row;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Creates [`JsonlFileSink`]s under one directory
#[derive(Debug, Clone)]
pub struct JsonlSinkFactory {
    dir: PathBuf,
}

impl JsonlSinkFactory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SinkFactory for JsonlSinkFactory {
    fn create(&self, _config: &Configuration, spec: SinkSpec) -> Result<Box<dyn Sink>> {
        if spec.destination_name.is_empty() {
            return Err(Error::sink(format!(
                "Destination name for '{}' is empty",
                spec.node
            )));
        }
        Ok(Box::new(JsonlFileSink::new(&self.dir, spec)))
    }
}

/// Upserting sink that keeps a destination in a `.jsonl` file
#[derive(Debug)]
pub struct JsonlFileSink {
    spec: SinkSpec,
    path: PathBuf,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl JsonlFileSink {
    pub fn new(dir: &Path, spec: SinkSpec) -> Self {
        let path = dir.join(format!("{}.jsonl", spec.destination_name));
        Self {
            spec,
            path,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows currently held, in file order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    async fn load(&mut self) -> Result<()> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::sink(format!("Failed to read {}: {e}", self.path.display())))?;

        let mut rows = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(line).map_err(|e| {
                Error::sink(format!(
                    "Invalid row at {}:{}: {e}",
                    self.path.display(),
                    number + 1
                ))
            })?;
            rows.push(row);
        }

        self.rows.clear();
        self.index.clear();
        upsert(&self.spec, &mut self.rows, &mut self.index, rows);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut contents = String::new();
        for row in &self.rows {
            contents.push_str(&serde_json::to_string(row)?);
            contents.push('\n');
        }

        let temp_path = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&temp_path, contents)
            .await
            .map_err(|e| Error::sink(format!("Failed to write {}: {e}", temp_path.display())))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::sink(format!("Failed to replace {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl Sink for JsonlFileSink {
    async fn init(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::sink(format!("Failed to create {}: {e}", parent.display())))?;
        }
        if self.path.exists() {
            self.load().await?;
            debug!(
                "Loaded {} existing rows from {}",
                self.rows.len(),
                self.path.display()
            );
        }
        Ok(())
    }

    async fn save_data(&mut self, rows: Vec<Row>) -> Result<()> {
        let count = rows.len();
        upsert(&self.spec, &mut self.rows, &mut self.index, rows);
        self.flush().await?;
        debug!(
            "Saved {count} rows to {} ({} total)",
            self.path.display(),
            self.rows.len()
        );
        Ok(())
    }

    fn spec(&self) -> &SinkSpec {
        &self.spec
    }
}
