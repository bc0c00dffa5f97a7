//! OAuth2 token acquisition
//!
//! Both flows run on top of [`HostRuntime::fetch`]. Neither retries nor
//! caches; see [`TokenProvider`](super::TokenProvider) for caching.

use super::jwt::create_jwt;
use super::types::{
    CachedToken, JwtClaims, ServiceAccountKey, TokenRequest, TokenResponse, JWT_BEARER_GRANT,
};
use crate::error::{Error, Result};
use crate::runtime::{FetchRequest, HostRuntime};
use crate::types::JsonValue;
use chrono::Utc;
use tracing::debug;

/// POST a token request and return the parsed response.
///
/// Fails with [`Error::Auth`] when the request cannot be sent, the body is
/// not JSON, the body carries an `error` field, or the status is not 2xx.
pub async fn exchange_token(
    runtime: &dyn HostRuntime,
    request: &TokenRequest,
) -> Result<TokenResponse> {
    let mut fetch = FetchRequest::post(&request.token_url).form(request.form.clone());
    for (key, value) in &request.headers {
        fetch = fetch.header(key, value);
    }

    let response = runtime
        .fetch(fetch)
        .await
        .map_err(|e| Error::auth(format!("Token request to {} failed: {e}", request.token_url)))?;

    let status = response.status;
    let body = String::from_utf8_lossy(response.bytes()).into_owned();

    let json: JsonValue = match serde_json::from_str(&body) {
        Ok(json) => json,
        Err(_) if !response.is_success() => {
            return Err(Error::auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }
        Err(e) => {
            return Err(Error::auth(format!(
                "Token endpoint returned invalid JSON: {e}"
            )));
        }
    };

    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let description = json
            .get("error_description")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| match error {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            });
        return Err(Error::auth(format!("Token error: {description}")));
    }

    if !response.is_success() {
        return Err(Error::auth(format!(
            "Token request failed with status {status}: {body}"
        )));
    }

    let token: TokenResponse = serde_json::from_value(json)
        .map_err(|e| Error::auth(format!("Unexpected token response: {e}")))?;
    debug!("obtained access token from {}", request.token_url);
    Ok(token)
}

/// Generic token exchange returning only the bearer token
pub async fn get_access_token(runtime: &dyn HostRuntime, request: &TokenRequest) -> Result<String> {
    let token = exchange_token(runtime, request).await?.into_cached_token()?;
    Ok(token.token)
}

/// Service-account JWT bearer flow returning only the bearer token
pub async fn get_service_account_token(
    runtime: &dyn HostRuntime,
    token_url: &str,
    key_json: &str,
    scope: &str,
) -> Result<String> {
    let token = service_account_token(runtime, token_url, key_json, scope).await?;
    Ok(token.token)
}

pub(super) async fn service_account_token(
    runtime: &dyn HostRuntime,
    token_url: &str,
    key_json: &str,
    scope: &str,
) -> Result<CachedToken> {
    let key = ServiceAccountKey::from_json(key_json)?;
    let claims = JwtClaims::new(&key.client_email, scope, token_url, Utc::now().timestamp());
    let assertion = create_jwt(&claims, &key.private_key)?;

    let request = TokenRequest::new(token_url)
        .field("grant_type", JWT_BEARER_GRANT)
        .field("assertion", assertion);

    let token = exchange_token(runtime, &request)
        .await?
        .into_cached_token()?;
    debug!("authenticated as service account {}", key.client_email);
    Ok(token)
}
