//! Native host runtime
//!
//! Executes requests with reqwest and owns the concerns the core leaves to
//! the host:
//! - Request timeouts
//! - Automatic retries with configurable backoff
//! - Rate limiting to prevent API throttling

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::types::{FetchRequest, FetchResponse, HostKind, RequestBody};
use super::HostRuntime;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the native runtime
#[derive(Debug, Clone)]
pub struct NativeRuntimeConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for NativeRuntimeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("conduit-cdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NativeRuntimeConfig {
    /// Create a new config builder
    pub fn builder() -> NativeRuntimeConfigBuilder {
        NativeRuntimeConfigBuilder::default()
    }
}

/// Builder for native runtime config
#[derive(Default)]
pub struct NativeRuntimeConfigBuilder {
    config: NativeRuntimeConfig,
}

impl NativeRuntimeConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> NativeRuntimeConfig {
        self.config
    }
}

/// Host runtime backed by reqwest and tokio
pub struct NativeRuntime {
    client: Client,
    config: NativeRuntimeConfig,
    rate_limiter: Option<RateLimiter>,
}

impl NativeRuntime {
    /// Create a runtime with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(NativeRuntimeConfig::default())
    }

    /// Create a runtime with custom configuration
    pub fn with_config(config: NativeRuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the runtime configuration
    pub fn config(&self) -> &NativeRuntimeConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Requests that waited for the request budget so far
    pub fn throttled_requests(&self) -> u64 {
        self.rate_limiter.as_ref().map_or(0, RateLimiter::throttled)
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff * factor
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<reqwest::RequestBuilder> {
        let url = request.full_url()?;
        let mut req = self.client.request(request.method.into(), url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        req = match &request.body {
            Some(RequestBody::Form(pairs)) => req.form(pairs),
            Some(RequestBody::Json(body)) => req.json(body),
            Some(RequestBody::Text(body)) => req.body(body.clone()),
            None => req,
        };

        Ok(req)
    }

    async fn into_fetch_response(response: reqwest::Response) -> Result<FetchResponse> {
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for NativeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRuntime")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostRuntime for NativeRuntime {
    fn kind(&self) -> HostKind {
        HostKind::Native
    }

    /// Non-2xx responses are returned, not raised; callers decide via
    /// [`FetchResponse::error_for_status`]. Retryable statuses are retried
    /// first and the last response is returned once retries run out.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.acquire().await;
            }

            let req = self.build_request(&request)?;

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if attempt < max_retries && is_retryable_status(status) {
                        let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                            extract_retry_after(&response)
                                .map_or_else(|| self.calculate_backoff(attempt), |d| {
                                    std::cmp::min(d, self.config.max_backoff)
                                })
                        } else {
                            self.calculate_backoff(attempt)
                        };
                        warn!(
                            "Request failed with {}, attempt {}/{}, retrying in {:?}",
                            status.as_u16(),
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    debug!(
                        "{} {} -> {}",
                        request.method,
                        request.url,
                        status.as_u16()
                    );
                    return Self::into_fetch_response(response).await;
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "Request error ({e}), attempt {}/{}, retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    if e.is_timeout() {
                        return Err(Error::Timeout {
                            timeout_ms: self.config.timeout.as_millis() as u64,
                        });
                    }
                    return Err(Error::Http(e));
                }
            }
        }
    }
}

/// Check if an HTTP status is retryable
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
    )
}

/// Extract retry-after header value
fn extract_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
