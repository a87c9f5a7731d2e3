//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, one transaction per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Body size limit
//! 6. Bearer auth (admin routes only)

pub mod auth;
pub mod request_id;

pub use auth::RequireBearer;
pub use request_id::request_id_middleware;
