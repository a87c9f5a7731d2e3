//! Widget store API library.
//!
//! Checkout and subscription orchestration against the payment gateway,
//! staff authentication, and the websocket notification hub. The binary in
//! `main.rs` wires these behind an axum router; tests drive the same
//! pieces with fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod hub;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod signer;
pub mod state;
pub mod validation;
