//! Sink module
//!
//! Destinations for fetched rows. Every sink upserts by the node's unique
//! keys, so re-fetching a day never duplicates rows.
//!
//! # Overview
//!
//! - `Sink` / `SinkFactory` - the storage contract the orchestrator writes to
//! - `MemorySinkFactory` - tables held in memory, inspectable after a run
//! - `JsonlSinkFactory` - one `.jsonl` file per destination

mod file;
mod memory;
mod types;

pub use file::{JsonlFileSink, JsonlSinkFactory};
pub use memory::{MemorySink, MemorySinkFactory, MemoryTable};
pub use types::{Sink, SinkFactory, SinkSpec};
