//! Bearer authentication for the admin API.
//!
//! Every failure produces the same 401 so callers cannot tell a missing
//! header from an expired token.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// Also used as a route layer for the whole admin router via
/// `axum::middleware::from_extractor_with_state`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireBearer(user): RequireBearer) -> String {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireBearer(pub User);

impl FromRequestParts<AppState> for RequireBearer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let user = state.tokens().authenticate(header).await?;
        set_sentry_user(&user.id, Some(user.email.as_str()));
        tracing::Span::current().record("user_id", user.id.as_i32());

        Ok(Self(user))
    }
}
