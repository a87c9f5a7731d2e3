//! Storefront-facing endpoints: catalog, checkout, login and password reset.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument};
use url::Url;

use widget_store_core::{Email, WidgetId};

use super::MessageResponse;
use crate::db::{UserRepository, WidgetRepository};
use crate::error::{AppError, Result};
use crate::extract::JsonBody;
use crate::middleware::RequireBearer;
use crate::models::{AuthToken, Widget};
use crate::services::{
    AuthError, AuthService, ChargeOutcome, CheckoutResponse, SubscriptionSignup,
};
use crate::signer::{self, SignerError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    pub currency: String,
    #[serde(deserialize_with = "amount_text")]
    pub amount: String,
}

/// Accept the amount as `"2000"` or `2000`.
fn amount_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub error: bool,
    pub message: String,
    pub authentication_token: AuthToken,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPassword {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPassword {
    /// The signed link from the reset email.
    pub link: String,
    pub password: String,
}

/// `GET /api/widget/{id}`
pub async fn get_widget(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Widget>> {
    let widget = WidgetRepository::new(state.pool())
        .get_by_id(WidgetId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("widget".to_string()))?;

    Ok(Json(widget))
}

/// `POST /api/payment-intent`
#[instrument(skip(state))]
pub async fn payment_intent(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ChargeRequest>,
) -> Result<Json<ChargeOutcome>> {
    let outcome = state.checkout().charge(&req.currency, &req.amount).await?;
    Ok(Json(outcome))
}

/// `POST /api/customer-subscription-plan`
#[instrument(skip_all)]
pub async fn subscription_plan(
    State(state): State<AppState>,
    JsonBody(signup): JsonBody<SubscriptionSignup>,
) -> Result<Json<CheckoutResponse>> {
    let response = state.checkout().subscribe_and_book(signup).await?;
    Ok(Json(response))
}

/// `POST /api/authenticate`
#[instrument(skip_all, fields(email = %credentials.email))]
pub async fn authenticate(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<Json<TokenResponse>> {
    let user = AuthService::new(state.pool())
        .login(&credentials.email, &credentials.password)
        .await?;
    let token = state.tokens().issue(&user).await?;

    info!(user_id = %user.id, "Token issued");
    Ok(Json(TokenResponse {
        error: false,
        message: format!("token for {} created", user.email),
        authentication_token: token,
    }))
}

/// `POST /api/is-authenticated`
pub async fn is_authenticated(RequireBearer(user): RequireBearer) -> Json<MessageResponse> {
    Json(MessageResponse::ok(format!("authenticated user {}", user.email)))
}

/// `POST /api/forgot-password`
///
/// An unknown email is reported with 202 and `error: true` rather than a
/// 4xx, which is what the storefront form expects.
#[instrument(skip_all, fields(email = %req.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ForgotPassword>,
) -> Result<Response> {
    let email = Email::parse(&req.email).map_err(AuthError::from)?;

    let Some(user) = UserRepository::new(state.pool()).get_by_email(&email).await? else {
        return Ok((
            StatusCode::ACCEPTED,
            Json(MessageResponse::error(
                "No matching email found in the database",
            )),
        )
            .into_response());
    };

    let config = state.config();
    let reset_url = Url::parse_with_params(
        &format!("{}/reset-password", config.frontend_url),
        &[("email", user.email.as_str())],
    )
    .map_err(|e| AppError::Internal(format!("invalid frontend url: {e}")))?;

    let ttl = config.reset_link_ttl();
    let link = state.signer().sign(reset_url.as_str(), Utc::now() + ttl)?;

    state
        .mailer()
        .send_password_reset(user.email.as_str(), &link, ttl.num_minutes())
        .await?;

    info!(user_id = %user.id, "Password reset link sent");
    Ok((StatusCode::CREATED, Json(MessageResponse::ok(""))).into_response())
}

/// `POST /api/reset-password`
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResetPassword>,
) -> Result<impl IntoResponse> {
    let url = state.signer().verify(&req.link, Utc::now())?;
    let email = signer::query_param(&url, "email")
        .ok_or_else(|| SignerError::Malformed("missing email parameter".to_string()))?;

    let user = AuthService::new(state.pool())
        .reset_password(&email, &req.password)
        .await?;

    info!(user_id = %user.id, "Password changed");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("password changed")),
    ))
}
