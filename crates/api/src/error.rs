//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Error responses share one
//! JSON shape, `{"error": true, "message": ...}`, plus an `errors` map for
//! field validation failures. Server errors are captured to Sentry before
//! responding and their details never reach the client.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::gateway::GatewayError;
use crate::hub::HubClosed;
use crate::services::auth::AuthError;
use crate::services::checkout::{CheckoutError, PAYMENT_ERROR_MESSAGE};
use crate::services::email::EmailError;
use crate::signer::SignerError;
use crate::validation::FieldErrors;

/// Shown for every bearer or login failure.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid Auth Credentials";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Signed link rejected.
    #[error("Link error: {0}")]
    Link(#[from] SignerError),

    #[error("Hub error: {0}")]
    Hub(#[from] HubClosed),

    /// Request body could not be read as the expected JSON.
    #[error("Invalid body: {0}")]
    Body(#[from] JsonRejection),

    /// One or more fields failed validation.
    #[error("failed validation")]
    Validation(FieldErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Email(_) | Self::Hub(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::InvalidAmount(_)
                | CheckoutError::Gateway(_)
                | CheckoutError::MissingCard => StatusCode::BAD_REQUEST,
                CheckoutError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::Persistence(_)
                | CheckoutError::RefundNotRecorded(_)
                | CheckoutError::CancellationNotRecorded(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Link(SignerError::InvalidKey) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Link(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Body(rejection) => rejection.status(),
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// The message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Record not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Hub(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Email(_) => "Could not send email".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => {
                    INVALID_CREDENTIALS_MESSAGE.to_string()
                }
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::Gateway(GatewayError::Declined(reason)) => reason.clone(),
                CheckoutError::Gateway(_) => PAYMENT_ERROR_MESSAGE.to_string(),
                CheckoutError::Persistence(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Self::Link(SignerError::Expired) => "Link expired".to_string(),
            Self::Link(SignerError::InvalidKey) => "Internal server error".to_string(),
            Self::Link(_) => "Invalid link".to_string(),
            Self::Body(rejection) => rejection.body_text(),
            Self::Validation(_) => "failed validation".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) => msg.clone(),
        }
    }

    fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) | Self::Checkout(CheckoutError::Validation(errors)) => {
                Some(errors)
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: true,
            message: self.public_message(),
            errors: self.field_errors(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated staff user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("widget".to_string());
        assert_eq!(err.to_string(), "Not found: widget");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::InvalidToken)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Validation(FieldErrors::new())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Link(SignerError::Expired)),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_invalid_token_body() {
        let json = body_json(AppError::Auth(AuthError::InvalidToken).into_response()).await;
        assert_eq!(
            json,
            serde_json::json!({"error": true, "message": "Invalid Auth Credentials"})
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut errors = FieldErrors::new();
        errors.insert("first_name".into(), "must be at least 2 characters".into());

        let response = AppError::Checkout(CheckoutError::Validation(errors)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await;
        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "failed validation");
        assert_eq!(
            json["errors"]["first_name"],
            "must be at least 2 characters"
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = AppError::Checkout(CheckoutError::Persistence(RepositoryError::DataCorruption(
            "bad row 17".into(),
        )));
        let json = body_json(err.into_response()).await;
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_partial_refund_message_is_shown() {
        let err = AppError::Checkout(CheckoutError::RefundNotRecorded(RepositoryError::NotFound));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(
            json["message"],
            "the charge was refunded but the database could not be updated"
        );
    }
}
