//! Authentication module
//!
//! Supports: generic OAuth2 token exchange (refresh token, client
//! credentials or any caller-supplied grant) and the service-account JWT
//! bearer flow.
//!
//! The flows themselves are stateless; `TokenProvider` caches the resolved
//! token for the rest of a run.

mod jwt;
mod oauth;
mod provider;
mod types;

pub use jwt::{base64url_encode, create_jwt};
pub use oauth::{exchange_token, get_access_token, get_service_account_token};
pub use provider::{TokenProvider, ACCESS_TOKEN};
pub use types::{
    AuthMethod, CachedToken, JwtClaims, ServiceAccountKey, TokenRequest, TokenResponse,
    JWT_BEARER_GRANT, JWT_LIFETIME_SECONDS,
};
