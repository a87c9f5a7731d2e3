//! HTTP route handlers for the widget store API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database ping)
//!
//! # Storefront
//! GET  /api/widget/{id}                     - Widget lookup
//! POST /api/payment-intent                  - One-off card charge
//! POST /api/customer-subscription-plan      - Subscribe and book
//! POST /api/authenticate                    - Issue a bearer token
//! POST /api/is-authenticated                - Check a bearer token
//! POST /api/forgot-password                 - Mail a signed reset link
//! POST /api/reset-password                  - Redeem a reset link
//!
//! # Admin (requires bearer)
//! POST /api/admin/virtual-terminal-succeeded
//! POST /api/admin/all-sales
//! POST /api/admin/all-subscriptions
//! POST /api/admin/sale/{id}
//! POST /api/admin/refund
//! POST /api/admin/cancel-subscription
//! POST /api/admin/all-users
//! POST /api/admin/all-users/{id}
//! POST /api/admin/all-users/edit/{id}
//! POST /api/admin/all-users/delete/{id}
//!
//! # Notifications
//! GET  /ws                                  - Websocket upgrade to the hub
//! ```

pub mod admin;
pub mod public;
pub mod ws;

use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{from_extractor_with_state, from_fn},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::extract::MAX_BODY_BYTES;
use crate::middleware::{RequireBearer, request_id_middleware};
use crate::state::AppState;

/// How long browsers may cache a preflight response.
const CORS_MAX_AGE: Duration = Duration::from_secs(300);

/// `{error, message}` envelope shared by the simple endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub error: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
        }
    }
}

/// Storefront routes, mounted under `/api`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/widget/{id}", get(public::get_widget))
        .route("/payment-intent", post(public::payment_intent))
        .route(
            "/customer-subscription-plan",
            post(public::subscription_plan),
        )
        .route("/authenticate", post(public::authenticate))
        .route("/is-authenticated", post(public::is_authenticated))
        .route("/forgot-password", post(public::forgot_password))
        .route("/reset-password", post(public::reset_password))
}

/// Dashboard routes, mounted under `/api/admin` behind bearer auth.
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/virtual-terminal-succeeded",
            post(admin::virtual_terminal_succeeded),
        )
        .route("/all-sales", post(admin::all_sales))
        .route("/all-subscriptions", post(admin::all_subscriptions))
        .route("/sale/{id}", post(admin::get_sale))
        .route("/refund", post(admin::refund))
        .route("/cancel-subscription", post(admin::cancel_subscription))
        .route("/all-users", post(admin::all_users))
        .route("/all-users/{id}", post(admin::one_user))
        .route("/all-users/edit/{id}", post(admin::edit_user))
        .route("/all-users/delete/{id}", post(admin::delete_user))
        .route_layer(from_extractor_with_state::<RequireBearer, AppState>(
            state.clone(),
        ))
}

/// Any http or https origin may call the API.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|o| o.starts_with("http://") || o.starts_with("https://"))
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_credentials(true)
        .max_age(CORS_MAX_AGE)
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", public_routes())
        .nest("/api/admin", admin_routes(&state))
        .route("/ws", get(ws::upgrade))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer())
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
