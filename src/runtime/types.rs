//! Request/response and primitive types shared by every host runtime

use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Host Kind
// ============================================================================

/// The execution environment a connector run is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    /// Tokio + reqwest, talks to the real network
    #[default]
    Native,
    /// Serves recorded responses; never touches the network
    Replay,
}

impl HostKind {
    /// Stable name used in configuration and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            HostKind::Native => "native",
            HostKind::Replay => "replay",
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "node" => Ok(HostKind::Native),
            "replay" => Ok(HostKind::Replay),
            other => Err(Error::UnsupportedRuntime {
                name: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// MAC Algorithms
// ============================================================================

/// HMAC algorithms understood by [`HostRuntime::hmac`](super::HostRuntime::hmac)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacAlgorithm {
    HmacSha256,
    HmacSha384,
    HmacSha512,
    HmacSha1,
    HmacMd5,
}

impl FromStr for MacAlgorithm {
    type Err = Error;

    /// Accepts both `HMAC_SHA_256` and short digest names such as `sha256`
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace("hmac", "")
            .replace(['_', '-'], "");
        match normalized.as_str() {
            "sha256" => Ok(MacAlgorithm::HmacSha256),
            "sha384" => Ok(MacAlgorithm::HmacSha384),
            "sha512" => Ok(MacAlgorithm::HmacSha512),
            "sha1" => Ok(MacAlgorithm::HmacSha1),
            "md5" => Ok(MacAlgorithm::HmacMd5),
            _ => Err(Error::Other(format!("Unsupported MAC algorithm: {s}"))),
        }
    }
}

// ============================================================================
// Fetch Request
// ============================================================================

/// Body of an outgoing request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `application/json`
    Json(JsonValue),
    /// Raw text with whatever content type the caller set
    Text(String),
}

/// A host-independent HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL (query parameters may already be present)
    pub url: String,
    /// Extra query parameters appended to the URL
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Optional body
    pub body: Option<RequestBody>,
}

impl FetchRequest {
    /// Create a request with the given method
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a bearer token authorization header
    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a URL-encoded form body
    #[must_use]
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Set a raw text body
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// The URL with `query` appended
    pub fn full_url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.url)?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

// ============================================================================
// Fetch Response
// ============================================================================

/// A fully buffered HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers with lowercase names
    pub headers: BTreeMap<String, String>,
    /// Raw body bytes
    pub body: Bytes,
}

impl FetchResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Create a `200 OK` JSON response
    pub fn json_ok(value: &JsonValue) -> Self {
        Self::new(200, value.to_string())
            .with_header("content-type", "application/json")
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| Error::fetch(format!("Response body is not valid UTF-8: {e}")))
    }

    /// Body parsed as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::fetch(format!("Invalid JSON response: {e}")))
    }

    /// Body bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Turn a non-2xx response into [`Error::HttpStatus`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            let body = String::from_utf8_lossy(&self.body).into_owned();
            Err(Error::http_status(self.status, body))
        }
    }
}

// ============================================================================
// Archive Entry
// ============================================================================

/// A single file extracted from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the entry inside the archive
    pub name: String,
    /// Contents decoded as UTF-8 (lossy)
    pub text: String,
}
