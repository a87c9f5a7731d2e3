//! Database operations for the widget store `PostgreSQL`.
//!
//! ## Tables
//!
//! - `widgets` - Catalog, including subscription plans (`is_recurring`)
//! - `customers`, `transactions`, `orders` - One row each per checkout
//! - `transaction_statuses`, `statuses` - Lookup tables for the status ids
//! - `users` - Staff who log into the admin dashboard
//! - `tokens` - SHA-256 hashes of bearer tokens (cascade on user delete)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p widget-store-cli -- migrate
//! ```
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the workspace builds
//! without a live database.

pub mod orders;
pub mod tokens;
pub mod users;
pub mod widgets;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::{OrderRepository, OrderStore, PgOrderStore};
pub use tokens::{PgTokenStore, TokenRepository, TokenStore};
pub use users::UserRepository;
pub use widgets::WidgetRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url.expose_secret())
        .await
}
