//! HS256 bearer tokens.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use bazaar_core::{UserId, UserRole};

use super::AuthError;
use crate::models::CurrentUser;

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, as a string per RFC 7519.
    pub sub: String,
    pub role: UserRole,
    pub email: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

impl TryFrom<Claims> for CurrentUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            id,
            role: claims.role,
            email: claims.email,
        })
    }
}

/// Signing and verification keys derived from `JWT_SECRET`.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Build keys from the shared secret.
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Sign a token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenCreation` if signing fails.
    pub fn issue(&self, id: UserId, role: UserRole, email: &str) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).map_err(|_| AuthError::TokenCreation)?;
        let claims = Claims {
            sub: id.to_string(),
            role,
            email: email.to_string(),
            iat,
            exp: iat + ttl,
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenCreation` if signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|_| AuthError::TokenCreation)
    }

    /// Check signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for anything but a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"k2P9xQ7mZr4Tw8Lb1Nc6Vd3Hf5Jg0Sa!";

    fn keys() -> TokenKeys {
        TokenKeys::new(SECRET, Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = keys();
        let token = keys
            .issue(UserId::new(42), UserRole::Merchant, "shop@example.com")
            .unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, UserRole::Merchant);
        assert_eq!(claims.exp - claims.iat, 3600);

        let user = CurrentUser::try_from(claims).unwrap();
        assert_eq!(user.id, UserId::new(42));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let token = keys
            .sign(&Claims {
                sub: "1".into(),
                role: UserRole::Customer,
                email: "a@example.com".into(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let token = TokenKeys::new(b"another-secret-entirely-0123456789", Duration::from_secs(60))
            .issue(UserId::new(1), UserRole::Customer, "a@example.com")
            .unwrap();
        assert!(matches!(keys().verify(&token), Err(AuthError::InvalidToken)));
        assert!(matches!(keys().verify("not.a.jwt"), Err(AuthError::InvalidToken)));
    }
}
