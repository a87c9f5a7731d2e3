//! Admin dashboard endpoints. Every route here sits behind bearer auth.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use widget_store_core::{OrderId, UserId};

use super::MessageResponse;
use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::extract::JsonBody;
use crate::hub::HubEvent;
use crate::middleware::RequireBearer;
use crate::models::{OrderDetail, Page, Pagination, Transaction, User, UserInput};
use crate::services::{AuthService, TerminalPayment};
use crate::state::AppState;
use crate::validation::Validator;

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "first_page", alias = "page")]
    pub current_page: i64,
}

const fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

const fn first_page() -> i64 {
    1
}

impl From<PageRequest> for Pagination {
    fn from(req: PageRequest) -> Self {
        Self::new(req.page_size, req.current_page)
    }
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub id: i32,
    /// Payment intent to refund.
    pub pi: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub id: i32,
    /// Subscription id.
    pub pi: String,
    #[serde(default)]
    pub currency: String,
}

/// `POST /api/admin/virtual-terminal-succeeded`
#[instrument(skip(state))]
pub async fn virtual_terminal_succeeded(
    State(state): State<AppState>,
    JsonBody(payment): JsonBody<TerminalPayment>,
) -> Result<Json<Transaction>> {
    let transaction = state.checkout().confirm_virtual_terminal(payment).await?;
    Ok(Json(transaction))
}

/// `POST /api/admin/all-sales`
pub async fn all_sales(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PageRequest>,
) -> Result<Json<Page<OrderDetail>>> {
    let page = OrderRepository::new(state.pool())
        .sales_page(req.into())
        .await?;
    Ok(Json(page))
}

/// `POST /api/admin/all-subscriptions`
pub async fn all_subscriptions(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PageRequest>,
) -> Result<Json<Page<OrderDetail>>> {
    let page = OrderRepository::new(state.pool())
        .subscriptions_page(req.into())
        .await?;
    Ok(Json(page))
}

/// `POST /api/admin/sale/{id}`
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get_detail(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("order".to_string()))?;
    Ok(Json(order))
}

/// `POST /api/admin/refund`
#[instrument(skip(state), fields(staff = %staff.id))]
pub async fn refund(
    State(state): State<AppState>,
    RequireBearer(staff): RequireBearer,
    JsonBody(req): JsonBody<RefundRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .checkout()
        .refund(OrderId::new(req.id), &req.pi, req.amount)
        .await?;
    Ok(Json(MessageResponse::ok("Charge refunded")))
}

/// `POST /api/admin/cancel-subscription`
#[instrument(skip(state), fields(staff = %staff.id))]
pub async fn cancel_subscription(
    State(state): State<AppState>,
    RequireBearer(staff): RequireBearer,
    JsonBody(req): JsonBody<CancelRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .checkout()
        .cancel_subscription(OrderId::new(req.id), &req.pi)
        .await?;
    Ok(Json(MessageResponse::ok("Subscription cancelled")))
}

/// `POST /api/admin/all-users`
pub async fn all_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let users = UserRepository::new(state.pool()).list().await?;
    Ok(Json(users))
}

/// `POST /api/admin/all-users/{id}`
pub async fn one_user(State(state): State<AppState>, Path(id): Path<i32>) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(UserId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;
    Ok(Json(user))
}

/// `POST /api/admin/all-users/edit/{id}`
///
/// An id of 0 creates the user; anything else updates it. On update an
/// empty password leaves the current one in place.
#[instrument(skip(state, input))]
pub async fn edit_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    JsonBody(input): JsonBody<UserInput>,
) -> Result<Json<MessageResponse>> {
    let mut v = Validator::new();
    v.check(!input.first_name.trim().is_empty(), "first_name", "is required");
    v.check(!input.last_name.trim().is_empty(), "last_name", "is required");
    v.check(!input.email.trim().is_empty(), "email", "is required");
    if id <= 0 {
        v.check(!input.password.is_empty(), "password", "is required");
    }
    v.finish().map_err(AppError::Validation)?;

    let auth = AuthService::new(state.pool());
    if id > 0 {
        auth.update_user(UserId::new(id), &input).await?;
        info!(user_id = id, "User updated");
    } else {
        let user = auth.create_user(&input).await?;
        info!(user_id = %user.id, "User created");
    }

    Ok(Json(MessageResponse::ok("")))
}

/// `POST /api/admin/all-users/delete/{id}`
///
/// Deleting a user also logs out their open dashboard sessions through
/// the notification hub.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>> {
    let user_id = UserId::new(id);
    UserRepository::new(state.pool()).delete(user_id).await?;
    info!(%user_id, "User deleted");

    if let Err(e) = state.hub().publish(HubEvent::UserDeleted { user_id }) {
        warn!(error = %e, %user_id, "Could not broadcast user deletion");
    }

    Ok(Json(MessageResponse::ok("")))
}
