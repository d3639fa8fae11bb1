//! Bearer-token verification.
//!
//! Tokens are minted by an external identity provider and verified here
//! with a shared HS256 secret. This layer only answers "who is the
//! caller"; whether that caller may perform an intent is the room state
//! machine's job.

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::UserId;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_string(self.sub.clone())
    }
}

/// Verifies bearer tokens against the shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Arc<DecodingKey>,
    algorithm: Algorithm,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            algorithm: Algorithm::HS256,
        }
    }

    /// Verify a token and extract its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 60; // clock skew

        let token_data: TokenData<Claims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Authentication("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    Error::Authentication("Invalid token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    Error::Authentication("Invalid token signature".to_string())
                }
                _ => Error::Authentication(format!("Token verification failed: {e}")),
            })?;

        if token_data.claims.sub.is_empty() {
            return Err(Error::Authentication("Token missing subject".to_string()));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn mint(sub: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .expect("encode")
    }

    #[test]
    fn verify_valid_token() {
        let verifier = TokenVerifier::new(SECRET);
        let token = mint("user_1", Duration::hours(1));
        let claims = verifier.verify_token(&token).expect("verify");
        assert_eq!(claims.user_id(), UserId::from("user_1"));
    }

    #[test]
    fn reject_expired_token() {
        let verifier = TokenVerifier::new(SECRET);
        // Past the 60s leeway.
        let token = mint("user_1", Duration::minutes(-5));
        let err = verifier.verify_token(&token).expect_err("expired");
        assert!(matches!(err, Error::Authentication(msg) if msg.contains("expired")));
    }

    #[test]
    fn reject_wrong_secret() {
        let verifier = TokenVerifier::new(b"other-secret");
        let token = mint("user_1", Duration::hours(1));
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn reject_garbage() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(verifier.verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn reject_empty_subject() {
        let verifier = TokenVerifier::new(SECRET);
        let token = mint("", Duration::hours(1));
        assert!(verifier.verify_token(&token).is_err());
    }
}
