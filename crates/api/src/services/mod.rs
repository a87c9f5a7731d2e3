//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Staff login, password reset and account management (argon2)
//! - `checkout` - Charges, subscription signups, refunds and cancellations
//! - `email` - Password reset email over SMTP
//! - `invoicing` - Hand-off to the invoice microservice
//! - `tokens` - Bearer token issue and verification

pub mod auth;
pub mod checkout;
pub mod email;
pub mod invoicing;
pub mod tokens;

pub use auth::{AuthError, AuthService};
pub use checkout::{
    ChargeOutcome, CheckoutError, CheckoutResponse, CheckoutService, SubscriptionSignup,
    TerminalPayment,
};
pub use email::{EmailError, EmailService, Mailer};
pub use invoicing::{HttpInvoiceNotifier, Invoice, InvoiceError, InvoiceNotifier};
pub use tokens::TokenService;
