//! Auth types
//!
//! Token requests and responses, service-account key documents, JWT
//! claims and the cached token used by [`TokenProvider`](super::TokenProvider).

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifetime of a service-account assertion in seconds
pub const JWT_LIFETIME_SECONDS: i64 = 3600;

/// Grant type for exchanging a signed assertion
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// A form POST to an OAuth2 token endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenRequest {
    pub token_url: String,
    /// Form fields sent URL-encoded, in order
    pub form: Vec<(String, String)>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

impl TokenRequest {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// JSON body returned by a token endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Convert to a cached token, honouring `expires_in` when present
    pub fn into_cached_token(self) -> Result<CachedToken> {
        let token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::auth("Token response did not contain an access_token"))?;
        Ok(match self.expires_in {
            Some(seconds) => CachedToken::expires_in(token, seconds),
            None => CachedToken::new(token, None),
        })
    }
}

/// The parts of a service-account key document the bearer flow needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a key document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::auth(format!("Invalid service account key: {e}")))
    }
}

/// Claims of a service-account assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl JwtClaims {
    /// Claims issued at `now` and valid for one hour
    pub fn new(
        issuer: impl Into<String>,
        scope: impl Into<String>,
        audience: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            iss: issuer.into(),
            scope: scope.into(),
            aud: audience.into(),
            iat: now,
            exp: now + JWT_LIFETIME_SECONDS,
        }
    }
}

/// How a connector obtains its bearer token.
///
/// Credentials are read from configuration parameters at resolve time:
/// `AccessToken`, `ClientId`, `ClientSecret`, `RefreshToken` and
/// `ServiceAccountKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Use `AccessToken` as provided
    Static,
    /// Exchange `RefreshToken` for a fresh access token
    RefreshToken { token_url: String },
    /// Client credentials grant
    ClientCredentials {
        token_url: String,
        scope: Option<String>,
    },
    /// Signed JWT assertion from a service-account key
    ServiceAccount { token_url: String, scope: String },
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// A token that expires `seconds` from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Expired, or expiring within 30 seconds
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(30) >= expires_at,
            None => false,
        }
    }
}
