//! Request extractors.

use axum::extract::FromRequest;

use crate::error::AppError;

/// Size limit for JSON request bodies (1 MiB).
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// `axum::Json` with rejections rendered as [`AppError`].
///
/// The body must hold exactly one JSON value; trailing data is rejected.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);
