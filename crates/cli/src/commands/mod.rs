pub mod migrate;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;

use widget_store_api::db;

/// Errors shared by the CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Auth(#[from] widget_store_api::services::AuthError),
}

/// Connect using `API_DATABASE_URL`, falling back to `DATABASE_URL`.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("API_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&SecretString::from(database_url)).await?)
}
