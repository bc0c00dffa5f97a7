//! Token caching on top of the stateless flows

use super::oauth::{exchange_token, service_account_token};
use super::types::{AuthMethod, CachedToken, TokenRequest};
use crate::config::{Attribute, Configuration, Parameter};
use crate::error::{Error, Result};
use crate::runtime::HostRuntime;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Parameter the resolved token is stored in
pub const ACCESS_TOKEN: &str = "AccessToken";

/// Resolves and caches a bearer token for one connector run
#[derive(Debug, Clone)]
pub struct TokenProvider {
    method: AuthMethod,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(method: AuthMethod) -> Self {
        Self {
            method,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn method(&self) -> &AuthMethod {
        &self.method
    }

    /// Get a valid token, fetching a new one when the cache is empty or expired
    pub async fn access_token(
        &self,
        runtime: &dyn HostRuntime,
        config: &Configuration,
    ) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.token.clone());
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let token = self.fetch_new_token(runtime, config).await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Resolve a token and store it in the `AccessToken` parameter
    pub async fn authorize(
        &self,
        runtime: &dyn HostRuntime,
        config: &mut Configuration,
    ) -> Result<String> {
        let token = self.access_token(runtime, config).await?;
        config.add_parameter(
            ACCESS_TOKEN,
            Parameter::with_value(token.as_str()).attribute(Attribute::Secret),
        );
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub async fn clear_cache(&self) {
        *self.cached_token.write().await = None;
    }

    async fn fetch_new_token(
        &self,
        runtime: &dyn HostRuntime,
        config: &Configuration,
    ) -> Result<CachedToken> {
        match &self.method {
            AuthMethod::Static => {
                let token = required(config, ACCESS_TOKEN)?;
                Ok(CachedToken::new(token.to_string(), None))
            }

            AuthMethod::RefreshToken { token_url } => {
                let request = TokenRequest::new(token_url)
                    .field("grant_type", "refresh_token")
                    .field("client_id", required(config, "ClientId")?)
                    .field("client_secret", required(config, "ClientSecret")?)
                    .field("refresh_token", required(config, "RefreshToken")?);
                debug!("refreshing access token");
                exchange_token(runtime, &request).await?.into_cached_token()
            }

            AuthMethod::ClientCredentials { token_url, scope } => {
                let mut request = TokenRequest::new(token_url)
                    .field("grant_type", "client_credentials")
                    .field("client_id", required(config, "ClientId")?)
                    .field("client_secret", required(config, "ClientSecret")?);
                if let Some(scope) = scope {
                    request = request.field("scope", scope);
                }
                exchange_token(runtime, &request).await?.into_cached_token()
            }

            AuthMethod::ServiceAccount { token_url, scope } => {
                let key_json = required(config, "ServiceAccountKey")?;
                service_account_token(runtime, token_url, key_json, scope).await
            }
        }
    }
}

fn required<'a>(config: &'a Configuration, name: &str) -> Result<&'a str> {
    config
        .string(name)
        .ok_or_else(|| Error::auth(format!("Parameter '{name}' is required for authentication")))
}
