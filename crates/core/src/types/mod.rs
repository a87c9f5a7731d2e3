//! Core domain types for the widget store.

pub mod amount;
pub mod email;
pub mod id;
pub mod status;
pub mod token;

pub use amount::{Amount, AmountError};
pub use email::{Email, EmailError};
pub use id::*;
pub use status::*;
pub use token::TokenScope;
