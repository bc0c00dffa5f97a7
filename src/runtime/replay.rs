//! Replay host runtime
//!
//! Serves previously recorded responses keyed by method and URL, records
//! every request it receives, and pins "today" so date windows are
//! reproducible. Used for offline dry runs and tests.

use super::types::{FetchRequest, FetchResponse, HostKind};
use super::HostRuntime;
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// A recorded exchange as stored in fixture files
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    /// HTTP method (defaults to GET)
    #[serde(default)]
    pub method: Method,
    /// Full URL including query string
    pub url: String,
    /// Status code to answer with
    #[serde(default = "default_status")]
    pub status: u16,
    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body; strings are sent verbatim, anything else as JSON
    #[serde(default)]
    pub body: JsonValue,
}

fn default_status() -> u16 {
    200
}

/// Host runtime that answers from recorded fixtures
#[derive(Debug, Default)]
pub struct ReplayRuntime {
    responses: Mutex<HashMap<String, VecDeque<FetchResponse>>>,
    requests: Mutex<Vec<FetchRequest>>,
    today: Option<NaiveDate>,
}

impl ReplayRuntime {
    /// Create an empty replay runtime
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the date returned by [`HostRuntime::today`]
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Queue a response for `method url`.
    ///
    /// Responses for the same key are served in order; the last one is
    /// repeated once the queue would otherwise run dry.
    #[must_use]
    pub fn with_response(self, method: Method, url: &str, response: FetchResponse) -> Self {
        self.push_response(method, url, response);
        self
    }

    /// Queue a `200` JSON response for a GET
    #[must_use]
    pub fn with_json(self, url: &str, body: JsonValue) -> Self {
        self.with_response(Method::GET, url, FetchResponse::json_ok(&body))
    }

    /// Queue a response without consuming the runtime
    pub fn push_response(&self, method: Method, url: &str, response: FetchResponse) {
        let key = replay_key(method, url);
        if let Ok(mut responses) = self.responses.lock() {
            responses.entry(key).or_default().push_back(response);
        }
    }

    /// Load every `*.json` fixture file in a directory.
    ///
    /// Each file holds one [`Fixture`] object or an array of them.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let runtime = Self::new();
        let mut paths: Vec<_> = std::fs::read_dir(dir.as_ref())?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let contents = std::fs::read_to_string(&path)?;
            let value: JsonValue = serde_json::from_str(&contents)?;
            let fixtures: Vec<Fixture> = if value.is_array() {
                serde_json::from_value(value)?
            } else {
                vec![serde_json::from_value(value)?]
            };
            for fixture in fixtures {
                runtime.add_fixture(fixture)?;
            }
        }

        Ok(runtime)
    }

    /// Register a single fixture
    pub fn add_fixture(&self, fixture: Fixture) -> Result<()> {
        url::Url::parse(&fixture.url)?;
        let body = match fixture.body {
            JsonValue::String(text) => text,
            JsonValue::Null => String::new(),
            other => other.to_string(),
        };
        let mut response = FetchResponse::new(fixture.status, body);
        for (key, value) in fixture.headers {
            response = response.with_header(&key, value);
        }
        self.push_response(fixture.method, &fixture.url, response);
        Ok(())
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, key: &str) -> Option<FetchResponse> {
        let mut responses = self.responses.lock().ok()?;
        let queue = responses.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn replay_key(method: Method, url: &str) -> String {
    let normalized = url::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string());
    format!("{method} {normalized}")
}

#[async_trait]
impl HostRuntime for ReplayRuntime {
    fn kind(&self) -> HostKind {
        HostKind::Replay
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let url = request.full_url()?;
        let key = replay_key(request.method, url.as_str());

        self.requests
            .lock()
            .map_err(|_| Error::fetch("replay request log poisoned"))?
            .push(request);

        match self.next_response(&key) {
            Some(response) => {
                debug!("replay hit: {key} -> {}", response.status);
                Ok(response)
            }
            None => {
                debug!("replay miss: {key}");
                Ok(FetchResponse::new(
                    404,
                    format!("no recorded response for {key}"),
                ))
            }
        }
    }

    async fn delay(&self, _ms: u64) {}

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}
