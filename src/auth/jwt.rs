//! RS256 assertion signing

use super::types::JwtClaims;
use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};

const JWT_HEADER: &str = r#"{"alg":"RS256","typ":"JWT"}"#;

/// RFC 4648 §5 base64url without padding
pub fn base64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Build and sign a compact JWT with an RSA private key in PEM form.
///
/// Returns `header.payload.signature`, each segment base64url encoded.
pub fn create_jwt(claims: &JwtClaims, private_key_pem: &str) -> Result<String> {
    let payload = serde_json::to_vec(claims)?;
    let signing_input = format!(
        "{}.{}",
        base64url_encode(JWT_HEADER),
        base64url_encode(payload)
    );

    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
        .map_err(|e| Error::auth(format!("Invalid private key: {e}")))?;
    let signature = jsonwebtoken::crypto::sign(signing_input.as_bytes(), &key, Algorithm::RS256)
        .map_err(|e| Error::auth(format!("Failed to sign JWT: {e}")))?;

    Ok(format!("{signing_input}.{signature}"))
}
