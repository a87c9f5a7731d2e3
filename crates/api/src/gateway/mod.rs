//! Payment gateway client.
//!
//! [`PaymentGateway`] is the seam between checkout and the remote card
//! processor. [`StripeGateway`] talks to a Stripe-compatible HTTP API; tests
//! plug in a stub.
//!
//! Every method is exactly one remote call. Nothing here retries.

mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use widget_store_core::Amount;

pub use stripe::{StripeGateway, card_error_message};

/// Errors from the payment gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The card processor refused the request; the message is safe to show
    /// to the buyer.
    #[error("{0}")]
    Declined(String),

    /// The request never got a response.
    #[error("gateway request failed: {0}")]
    Transport(String),

    /// The gateway answered with a non-card error.
    #[error("gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The gateway answered with something we could not parse.
    #[error("invalid gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Buyer-facing decline reason, if this is a decline.
    #[must_use]
    pub fn decline_reason(&self) -> Option<&str> {
        match self {
            Self::Declined(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A payment intent as returned by the gateway.
///
/// Unknown fields are kept so the storefront receives the intent verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Charge id of the most recent charge attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_charge: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

/// Card metadata attached to a subscription for later reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionMetadata {
    pub last_four: String,
    pub card_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub card: Option<CardDetails>,
}

/// Authoritative card metadata from the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardDetails {
    #[serde(default)]
    pub brand: String,
    pub last4: String,
    pub exp_month: i32,
    pub exp_year: i32,
}

/// Operations checkout needs from the card processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount` in `currency`.
    async fn charge(&self, currency: &str, amount: Amount) -> Result<PaymentIntent, GatewayError>;

    /// Create a remote customer with `payment_method` as its default.
    async fn create_customer(
        &self,
        payment_method: &str,
        email: &str,
    ) -> Result<GatewayCustomer, GatewayError>;

    /// Subscribe a customer to a plan.
    async fn subscribe(
        &self,
        customer: &GatewayCustomer,
        plan: &str,
        metadata: &SubscriptionMetadata,
    ) -> Result<Subscription, GatewayError>;

    /// Refund `amount` of a payment intent.
    async fn refund(&self, payment_intent: &str, amount: Amount) -> Result<(), GatewayError>;

    /// Cancel a subscription at the end of the current period.
    async fn cancel_subscription(&self, subscription: &str) -> Result<(), GatewayError>;

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, GatewayError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_intent_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 500,
            "currency": "usd",
            "status": "requires_payment_method",
            "client_secret": "pi_123_secret_abc",
            "livemode": false
        });

        let intent: PaymentIntent = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(intent.amount, 500);
        assert_eq!(intent.latest_charge, None);

        let back = serde_json::to_value(&intent).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_decline_reason() {
        assert_eq!(
            GatewayError::Declined("Incorrect CVC code".into()).decline_reason(),
            Some("Incorrect CVC code")
        );
        assert_eq!(GatewayError::Transport("timeout".into()).decline_reason(), None);
    }
}
