//! Node schemas
//!
//! Static metadata a provider declares for each node it exposes, and the
//! parser for the `Fields` parameter selecting nodes and fields for a run.

mod fields;
mod types;

pub use fields::FieldSelection;
pub use types::{FieldSchema, FieldType, NodeSchema};
