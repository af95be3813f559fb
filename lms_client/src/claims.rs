//! Credential pair and decoded access-token claims.
//!
//! Claims are read straight out of the token payload without checking the
//! signature. The client only needs them to learn the expiry instant and who
//! is logged in; the backend remains the authority on whether a token is
//! acceptable.

use crate::errors::DecodeError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// User ID type
pub type UserId = i64;

/// Access/refresh token pair as issued by the token endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "access")]
    pub access_token: String,
    #[serde(rename = "refresh")]
    pub refresh_token: String,
}

/// JWT claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub exp: i64, // Expiration timestamp
    #[serde(default)]
    pub iat: i64, // Issued at timestamp
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl Claims {
    /// Whether the token is no longer usable at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Decode the claims of a JWT without verifying its signature or expiry.
///
/// This is a pure function of the token string: decoding the same token
/// twice yields the same claims.
///
/// # Errors
///
/// * `DecodeError::Malformed` - Token is not three dot-separated segments
/// * `DecodeError::InvalidPayload` - Header or payload is not valid base64url JSON
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    if token.split('.').count() != 3 {
        return Err(DecodeError::Malformed);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// Whether `token` must be renewed before use at `now`.
///
/// An undecodable token is treated exactly like an expired one.
pub fn is_access_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    match decode(token) {
        Ok(claims) => claims.is_expired_at(now),
        Err(_) => true,
    }
}

/// Signed HS256 token carrying `claims`, shaped like the backend's
#[cfg(test)]
pub(crate) fn encode_for_test(claims: &Claims) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(b"test_secret_key_for_testing_only"),
    )
    .unwrap()
}
