//! Bearer token storage.
//!
//! Only the SHA-256 hash of a token is stored. A user holds at most one
//! token: issuing a new one deletes the rest in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;
use super::users::UserRow;
use crate::models::{AuthToken, User};

/// Persistence operations the token service depends on.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store `token` as the only token for `user`.
    async fn replace_for_user(
        &self,
        token: &AuthToken,
        user: &User,
    ) -> Result<(), RepositoryError>;

    /// Find the user owning an unexpired token with this hash.
    async fn user_for_token(
        &self,
        hash: &[u8; 32],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;
}

/// Repository for the `tokens` table.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Delete every token for the user, then insert `token`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails; nothing
    /// is committed in that case.
    pub async fn replace_for_user(
        &self,
        token: &AuthToken,
        user: &User,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user.id.as_i32())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO tokens (user_id, name, email, token_hash, scope, expiry)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(user.id.as_i32())
        .bind(&user.last_name)
        .bind(user.email.as_str())
        .bind(&token.hash[..])
        .bind(token.scope.as_str())
        .bind(token.expiry)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Find the user owning an unexpired token with this hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_for_token(
        &self,
        hash: &[u8; 32],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT u.id, u.first_name, u.last_name, u.email, u.created_at, u.updated_at
            FROM users u
            JOIN tokens t ON t.user_id = u.id
            WHERE t.token_hash = $1
              AND t.expiry > $2
            ",
        )
        .bind(&hash[..])
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}

/// [`TokenStore`] backed by the shared pool.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn replace_for_user(
        &self,
        token: &AuthToken,
        user: &User,
    ) -> Result<(), RepositoryError> {
        TokenRepository::new(&self.pool)
            .replace_for_user(token, user)
            .await
    }

    async fn user_for_token(
        &self,
        hash: &[u8; 32],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        TokenRepository::new(&self.pool)
            .user_for_token(hash, now)
            .await
    }
}
