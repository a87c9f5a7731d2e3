//! Database migration command.
//!
//! Applies everything under `crates/api/migrations/` that has not run yet.
//! The API server never migrates on startup.

use super::{CommandError, connect};

pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
