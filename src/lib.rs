// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Conduit Connector Development Kit (CDK)
//!
//! A framework for incremental extraction from marketing and analytics
//! APIs into upsert-by-key sinks.
//!
//! ## Features
//!
//! - **Typed configuration**: Parameters with defaults, required markers and
//!   date coercion, merged from a base set and provider overrides
//! - **Auth strategies**: Static token, refresh token, client credentials and
//!   service-account JWT exchange
//! - **Incremental time series**: Day-by-day fetching with a persisted
//!   watermark and a re-import lookback window
//! - **Host runtimes**: Native (tokio + reqwest) or replay from recorded fixtures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conduit_cdk::engine::{Orchestrator, RunConfig};
//! use conduit_cdk::runtime::{HostKind, RuntimeContext};
//! use conduit_cdk::sink::MemorySinkFactory;
//! use conduit_cdk::source::build_configuration;
//! use conduit_cdk::sources::get_builtin;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> conduit_cdk::Result<()> {
//!     let source = get_builtin("github").unwrap();
//!     let mut config = build_configuration(HostKind::Native, source.as_ref());
//!     config.set_values([
//!         ("AccessToken", "ghp_..."),
//!         ("RepositoryName", "owner/repo"),
//!         ("Fields", "repository name, repositoryStats stars"),
//!     ]);
//!
//!     let sinks = MemorySinkFactory::new();
//!     let mut orchestrator = Orchestrator::new(
//!         RuntimeContext::new(HostKind::Native)?,
//!         source,
//!         Arc::new(sinks.clone()),
//!         config,
//!         RunConfig::incremental(),
//!     );
//!     let report = orchestrator.run(&CancellationToken::new()).await?;
//!     println!("{} rows written", report.stats.rows_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Orchestrator                            │
//! │  validate → authenticate → catalog nodes / time-series days     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Config  │   Auth    │    Source     │   Sink    │   Runtime   │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Params   │ Static    │ Schemas       │ Memory    │ Native      │
//! │ Validate │ Refresh   │ Catalog       │ JSONL     │ Replay      │
//! │ Status   │ Client cr.│ Time series   │           │ Codecs      │
//! │          │ JWT       │               │           │             │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the CDK
pub mod error;

/// Common types and type aliases
pub mod types;

/// Host runtime adapters (network, clock, codecs)
pub mod runtime;

/// Authentication strategies
pub mod auth;

/// Parameters, configuration and the status contract
pub mod config;

/// Node schemas and field selection
pub mod schema;

/// File-backed run state
pub mod state;

/// Storage sinks
pub mod sink;

/// The source contract and base parameter set
pub mod source;

/// Built-in sources
pub mod sources;

/// Run orchestration
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{Configuration, Parameter, ParameterValue};
pub use engine::{Orchestrator, RunConfig, RunReport};
pub use source::Source;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
