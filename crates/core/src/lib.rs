//! Widget Store Core - Shared domain types.
//!
//! This crate provides the types shared by the workspace:
//! - `api` - HTTP backend (checkout, subscriptions, auth, admin, realtime hub)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. The optional `postgres` feature adds `sqlx` encodings
//! so the same types can be bound directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Entity IDs, emails, amounts, statuses and token scopes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
