//! Host runtime adapter
//!
//! Isolates everything that differs between execution environments behind
//! the [`HostRuntime`] trait: HTTP fetch, delays, date formatting, UUIDs,
//! base64, HMAC signing, CSV parsing and archive extraction.
//!
//! # Overview
//!
//! - `NativeRuntime` - reqwest-backed; owns timeouts, retries and rate limiting
//! - `ReplayRuntime` - answers from recorded fixtures, pins the current date
//! - `RuntimeContext` - the runtime chosen once at start-up and passed to
//!   every component that needs it

mod codec;
mod native;
mod rate_limit;
mod replay;
mod types;

pub use codec::{base64_encode, compute_hmac, parse_csv, unzip};
pub use native::{NativeRuntime, NativeRuntimeConfig, NativeRuntimeConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use replay::{Fixture, ReplayRuntime};
pub use types::{
    ArchiveEntry, FetchRequest, FetchResponse, HostKind, MacAlgorithm, RequestBody,
};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Platform primitives every connector component depends on
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Which environment this runtime implements
    fn kind(&self) -> HostKind;

    /// Execute an HTTP request and buffer the full response
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;

    /// Sleep without blocking the executor
    async fn delay(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// The current UTC calendar date
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Format a date as `YYYY-MM-DD`
    fn format_date(&self, date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// A random v4 UUID
    fn uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Standard base64 encoding
    fn base64_encode(&self, data: &[u8]) -> String {
        base64_encode(data)
    }

    /// Compute an HMAC signature
    fn hmac(&self, algorithm: MacAlgorithm, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        compute_hmac(algorithm, data, key)
    }

    /// Parse delimited text into rows of cells
    fn parse_csv(&self, text: &str, delimiter: char) -> Vec<Vec<String>> {
        parse_csv(text, delimiter)
    }

    /// Extract every file from a zip archive
    fn unzip(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>> {
        unzip(data)
    }
}

/// The host runtime selected for this process.
///
/// Built once at start-up and handed to every component explicitly;
/// cloning shares the same runtime.
#[derive(Clone)]
pub struct RuntimeContext {
    runtime: Arc<dyn HostRuntime>,
}

impl RuntimeContext {
    /// Build the default runtime for `kind`
    pub fn new(kind: HostKind) -> Result<Self> {
        let runtime: Arc<dyn HostRuntime> = match kind {
            HostKind::Native => Arc::new(NativeRuntime::new()?),
            HostKind::Replay => Arc::new(ReplayRuntime::new()),
        };
        Ok(Self { runtime })
    }

    /// Wrap an already constructed runtime
    pub fn from_runtime(runtime: Arc<dyn HostRuntime>) -> Self {
        Self { runtime }
    }

    /// The selected environment
    pub fn kind(&self) -> HostKind {
        self.runtime.kind()
    }

    /// The runtime itself
    pub fn runtime(&self) -> &dyn HostRuntime {
        self.runtime.as_ref()
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("kind", &self.kind())
            .finish()
    }
}
