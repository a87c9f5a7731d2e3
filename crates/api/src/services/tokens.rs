//! Bearer token issue and verification.
//!
//! Tokens are 16 random bytes rendered as unpadded base32 (26 characters).
//! The store only ever sees the SHA-256 of the plain text.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha256};
use tracing::{error, instrument};

use widget_store_core::TokenScope;

use super::auth::AuthError;
use crate::db::TokenStore;
use crate::models::{AuthToken, User};

/// Length of an issued token's plain text.
pub const TOKEN_LENGTH: usize = 26;

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    ttl: TimeDelta,
}

impl TokenService {
    /// `ttl` is the lifetime of tokens issued by [`Self::issue`].
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, ttl: TimeDelta) -> Self {
        Self { store, ttl }
    }

    /// Issue a token for `user` with the default lifetime, replacing any
    /// token they already hold.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn issue(&self, user: &User) -> Result<AuthToken, AuthError> {
        self.issue_with_ttl(user, self.ttl).await
    }

    /// Issue a token with an explicit lifetime.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue_with_ttl(
        &self,
        user: &User,
        ttl: TimeDelta,
    ) -> Result<AuthToken, AuthError> {
        let token = generate_token(user, ttl, TokenScope::Authentication);
        self.store.replace_for_user(&token, user).await?;
        Ok(token)
    }

    /// Resolve an `Authorization` header value to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for a missing or malformed header, an
    /// unknown or expired token, and a failed lookup alike.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<User, AuthError> {
        let plain_text = header
            .and_then(parse_bearer)
            .filter(|t| t.len() == TOKEN_LENGTH)
            .ok_or(AuthError::InvalidToken)?;
        let hash = hash_token(plain_text);

        match self.store.user_for_token(&hash, Utc::now()).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AuthError::InvalidToken),
            Err(e) => {
                error!(error = %e, "Token lookup failed");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

/// Create a fresh token for `user`. Nothing is stored.
#[must_use]
pub fn generate_token(user: &User, ttl: TimeDelta, scope: TokenScope) -> AuthToken {
    let bytes: [u8; 16] = rand::random();
    let plain_text = BASE32_NOPAD.encode(&bytes);
    let hash = hash_token(&plain_text);

    AuthToken {
        plain_text,
        hash,
        user_id: user.id,
        expiry: Utc::now() + ttl,
        scope,
    }
}

/// Extract the token from `Bearer <token>`.
///
/// The header must be exactly two space-separated parts and the first must
/// be `Bearer`.
#[must_use]
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    let (Some("Bearer"), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    (!token.is_empty()).then_some(token)
}

/// SHA-256 of the token's plain text.
#[must_use]
pub fn hash_token(plain_text: &str) -> [u8; 32] {
    Sha256::digest(plain_text.as_bytes()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use widget_store_core::{Email, UserId};

    fn user() -> User {
        User {
            id: UserId::new(7),
            first_name: "Ada".into(),
            last_name: "Admin".into(),
            email: Email::parse("admin@example.com").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token(&user(), TimeDelta::hours(24), TokenScope::Authentication);

        assert_eq!(token.plain_text.len(), TOKEN_LENGTH);
        assert!(
            token
                .plain_text
                .chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
        );
        assert_eq!(token.hash, hash_token(&token.plain_text));
        assert_eq!(token.user_id, UserId::new(7));
        assert!(token.expiry > Utc::now() + TimeDelta::hours(23));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = generate_token(&user(), TimeDelta::hours(1), TokenScope::Authentication);
        let b = generate_token(&user(), TimeDelta::hours(1), TokenScope::Authentication);
        assert_ne!(a.plain_text, b.plain_text);
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer ABCDEF"), Some("ABCDEF"));
        assert_eq!(parse_bearer("bearer ABCDEF"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer A B"), None);
        assert_eq!(parse_bearer("Token ABCDEF"), None);
    }

    #[test]
    fn test_serialized_token_hides_hash() {
        let token = generate_token(&user(), TimeDelta::hours(1), TokenScope::Authentication);
        let json = serde_json::to_value(&token).unwrap();

        assert_eq!(json["token"], token.plain_text.as_str());
        assert!(json.get("hash").is_none());
        assert!(json.get("expiry").is_some());
    }
}
