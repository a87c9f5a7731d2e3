//! Staff user commands.
//!
//! Bootstraps the first dashboard login; later users can be managed from
//! the dashboard itself.

use widget_store_api::models::UserInput;
use widget_store_api::services::AuthService;

use super::{CommandError, connect};

/// Create a staff user with an argon2-hashed password.
pub async fn create(
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<(), CommandError> {
    let pool = connect().await?;

    let input = UserInput {
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        email: email.to_owned(),
        password: password.to_owned(),
    };
    let user = AuthService::new(&pool).create_user(&input).await?;

    tracing::info!("Staff user created! ID: {}, Email: {}", user.id, user.email);
    Ok(())
}
