//! JWT verification for connection owners
//!
//! The upgrade route trusts the `id` claim of an HMAC-signed token as the owner id.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Owner id the connection will be registered under
    pub id: String,
    /// Expiration time (Unix timestamp), checked when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    /// Claims that expire `ttl_secs` from now
    #[must_use]
    pub fn expiring(id: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            id: id.into(),
            exp: Some((Utc::now() + Duration::seconds(ttl_secs)).timestamp()),
        }
    }
}

/// Verifies (and, for tooling and tests, signs) owner tokens with a shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for the given HMAC secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Only HMAC signatures are accepted.
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and validate a token
    ///
    /// # Errors
    /// Returns an error if the signature, algorithm, or expiry is invalid, or the
    /// `id` claim is missing or empty
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                    _ => AppError::InvalidToken,
                }
            })?;

        if token_data.claims.id.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        Ok(token_data.claims)
    }

    /// Resolve the owner id carried by a token
    pub fn owner_id(&self, token: &str) -> Result<String, AppError> {
        self.verify(token).map(|claims| claims.id)
    }

    /// Sign claims with the shared secret (HS256)
    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(anyhow::anyhow!("Failed to encode JWT: {e}")))
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}
