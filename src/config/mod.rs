//! Configuration model
//!
//! A self-describing parameter registry used by every connector run to
//! hold credentials, date ranges and feature flags.
//!
//! # Overview
//!
//! - `Parameter` / `ParameterValue` - a single entry and its wire shape
//! - `Configuration` - ordered registry with merge, validation and accessors
//! - `StatusReporter` - progress notifications a run emits

mod configuration;
mod parameter;
mod status;

pub use configuration::{
    load_parameters_from_path, load_parameters_from_str, sanitize_name, Configuration,
    ParameterDescription, ENVIRONMENT,
};
pub use parameter::{Attribute, OneOfOption, Parameter, ParameterValue};
pub use status::{MemoryStatus, RunStatus, StatusReporter, StatusUpdate};
