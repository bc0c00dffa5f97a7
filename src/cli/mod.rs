//! CLI module
//!
//! Command-line interface for running built-in sources.
//!
//! # Commands
//!
//! - `run` - Import the selected nodes into JSON-lines files
//! - `validate` - Check parameters and the node selection
//! - `spec` - Show a source's parameters and node schemas
//! - `list` - List built-in sources

mod commands;
mod runner;

pub use commands::{Cli, Commands, ModeArg, OutputFormat};
pub use runner::{parse_override, Runner};
