//! Signed session credentials.
//!
//! A credential is an HS256 JWT carrying `email`, `iat` and `exp`. Nothing
//! is stored server side; a token is valid exactly when its signature
//! verifies under the configured secret and `exp` has not passed.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::debug;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Verified email of the session subject.
    pub email: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Builds and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct SessionCredentials {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: std::time::Duration,
}

impl SessionCredentials {
    /// Create a credential factory for `secret` issuing tokens valid for `ttl`.
    pub fn new(secret: &[u8], ttl: std::time::Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Session lifetime.
    pub fn ttl(&self) -> std::time::Duration {
        self.ttl
    }

    /// Issue a token for `subject`, returning it with its expiry.
    pub fn build(&self, subject: &str) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Credential(format!("session lifetime {:?} out of range", self.ttl))
            })?;
        let claims = SessionClaims {
            email: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Credential(e.to_string()))?;

        // Round down to whole seconds so the cookie expiry matches `exp`.
        let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at);
        Ok((token, expires_at))
    }

    /// Return the token's subject if the token is authentic and unexpired.
    ///
    /// The reason for a rejection is deliberately not returned.
    pub fn verify(&self, token: &str) -> Option<String> {
        match decode::<SessionClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) if !data.claims.email.is_empty() => Some(data.claims.email),
            Ok(_) => {
                debug!("session token without subject");
                None
            }
            Err(e) => {
                debug!("session token rejected: {:?}", e.kind());
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
