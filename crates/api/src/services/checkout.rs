//! Checkout orchestration.
//!
//! A subscription signup is a linear sequence of remote calls and inserts
//! with no compensation: once the gateway has created a customer or a
//! subscription, a later failure leaves those behind and only logs them.
//! The three inserts commit independently.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use widget_store_core::{Amount, AmountError, OrderId, OrderStatus, TransactionStatus, WidgetId};

use super::invoicing::{Invoice, InvoiceNotifier};
use crate::db::{OrderStore, RepositoryError};
use crate::gateway::{GatewayError, PaymentGateway, PaymentIntent, SubscriptionMetadata};
use crate::models::{NewCustomer, NewOrder, NewTransaction, Transaction};
use crate::validation::{FieldErrors, Validator, min_chars};

/// Shown when the gateway failed for a reason other than a card decline.
pub const PAYMENT_ERROR_MESSAGE: &str = "Error processing payment";

/// Errors that abort a checkout operation.
///
/// Declines during signup are not errors: they come back as a
/// [`CheckoutResponse`] with `ok: false`.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("failed validation")]
    Validation(FieldErrors),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("payment method has no card details")]
    MissingCard,

    #[error("checkout persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("the charge was refunded but the database could not be updated")]
    RefundNotRecorded(#[source] RepositoryError),

    #[error("the subscription was cancelled but the database could not be updated")]
    CancellationNotRecorded(#[source] RepositoryError),
}

/// Buyer-facing outcome of a checkout step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub ok: bool,
    pub message: String,
}

impl CheckoutResponse {
    #[must_use]
    pub fn success(message: &str) -> Self {
        Self {
            ok: true,
            message: message.to_owned(),
        }
    }

    #[must_use]
    pub fn failure(message: &str) -> Self {
        Self {
            ok: false,
            message: message.to_owned(),
        }
    }
}

/// Result of a one-time charge: the gateway's intent verbatim, or a
/// buyer-facing failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChargeOutcome {
    Intent(PaymentIntent),
    Failed(CheckoutResponse),
}

/// Storefront subscription signup form.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSignup {
    pub currency: String,
    pub amount: String,
    pub payment_method: String,
    pub email: String,
    pub plan: String,
    pub product_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub last_four: String,
    #[serde(default)]
    pub card_brand: String,
    #[serde(default)]
    pub exp_month: i32,
    #[serde(default)]
    pub exp_year: i32,
}

/// A card payment taken through the admin virtual terminal.
///
/// Card details and the bank return code come from the gateway; `amount`
/// and `currency` are taken as declared. Other fields the dashboard posts
/// are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalPayment {
    pub amount: i64,
    pub currency: String,
    pub payment_intent: String,
    pub payment_method: String,
}

/// Runs charges, signups, refunds and cancellations against the gateway and
/// records them in the store.
#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn OrderStore>,
    invoices: Arc<dyn InvoiceNotifier>,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn OrderStore>,
        invoices: Arc<dyn InvoiceNotifier>,
    ) -> Self {
        Self {
            gateway,
            store,
            invoices,
        }
    }

    /// Create a payment intent for a one-time purchase. Nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidAmount` if `amount` is not a positive
    /// integer; the gateway is not called in that case.
    #[instrument(skip(self))]
    pub async fn charge(
        &self,
        currency: &str,
        amount: &str,
    ) -> Result<ChargeOutcome, CheckoutError> {
        let amount = Amount::parse_positive(amount)?;

        match self.gateway.charge(currency, amount).await {
            Ok(intent) => Ok(ChargeOutcome::Intent(intent)),
            Err(GatewayError::Declined(reason)) => {
                info!(%reason, "Card declined");
                Ok(ChargeOutcome::Failed(CheckoutResponse::failure(&reason)))
            }
            Err(e) => {
                error!(error = %e, "Payment intent creation failed");
                Ok(ChargeOutcome::Failed(CheckoutResponse::failure(
                    PAYMENT_ERROR_MESSAGE,
                )))
            }
        }
    }

    /// Sign a buyer up for a recurring plan and book the order.
    ///
    /// Gateway failures come back as `ok: false`. Once the subscription
    /// exists, any insert failure aborts with `CheckoutError::Persistence`
    /// and the gateway references are logged as orphaned.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` for a bad form (before any remote
    /// call) and `CheckoutError::Persistence` if a store call fails.
    #[instrument(skip(self, signup), fields(email = %signup.email, plan = %signup.plan))]
    pub async fn subscribe_and_book(
        &self,
        signup: SubscriptionSignup,
    ) -> Result<CheckoutResponse, CheckoutError> {
        let (amount, widget_id) = validate_signup(&signup)?;

        let widget = self.store.widget(widget_id).await?.ok_or_else(|| {
            let mut errors = FieldErrors::new();
            errors.insert("product_id".to_owned(), "unknown product".to_owned());
            CheckoutError::Validation(errors)
        })?;

        let customer = match self
            .gateway
            .create_customer(&signup.payment_method, &signup.email)
            .await
        {
            Ok(customer) => customer,
            Err(e) => {
                warn!(error = %e, "Gateway customer creation failed");
                let message = e.decline_reason().unwrap_or(PAYMENT_ERROR_MESSAGE);
                return Ok(CheckoutResponse::failure(message));
            }
        };

        let metadata = SubscriptionMetadata {
            last_four: signup.last_four.clone(),
            card_type: signup.card_brand.clone(),
        };
        let subscription = match self
            .gateway
            .subscribe(&customer, &signup.plan, &metadata)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(
                    error = %e,
                    orphaned_customer = %customer.id,
                    "Subscription failed after gateway customer was created"
                );
                return Ok(CheckoutResponse::failure("Error subscribing customer"));
            }
        };

        let orphaned = |step: &str, e: &RepositoryError| {
            error!(
                error = %e,
                step,
                orphaned_customer = %customer.id,
                orphaned_subscription = %subscription.id,
                "Checkout aborted after the gateway subscription was created"
            );
        };

        let new_customer = NewCustomer {
            first_name: signup.first_name.clone(),
            last_name: signup.last_name.clone(),
            email: signup.email.clone(),
        };
        let customer_id = self
            .store
            .insert_customer(&new_customer)
            .await
            .inspect_err(|e| orphaned("customer", e))?;

        let new_transaction = NewTransaction {
            amount: amount.minor_units(),
            currency: signup.currency.clone(),
            last_four: signup.last_four.clone(),
            bank_return_code: String::new(),
            expiry_month: signup.exp_month,
            expiry_year: signup.exp_year,
            payment_intent: subscription.id.clone(),
            payment_method: signup.payment_method.clone(),
            status: TransactionStatus::Succeeded,
        };
        let transaction = self
            .store
            .insert_transaction(&new_transaction)
            .await
            .inspect_err(|e| orphaned("transaction", e))?;

        let new_order = NewOrder {
            widget_id,
            transaction_id: transaction.id,
            customer_id,
            status: OrderStatus::Pending,
            quantity: 1,
            amount: amount.minor_units(),
        };
        let order_id = self
            .store
            .insert_order(&new_order)
            .await
            .inspect_err(|e| orphaned("order", e))?;

        info!(%order_id, subscription = %subscription.id, "Subscription booked");

        let invoice = Invoice {
            id: order_id,
            widget_id,
            amount: amount.minor_units(),
            product: format!("{} monthly subscription", widget.name),
            quantity: new_order.quantity,
            first_name: signup.first_name,
            last_name: signup.last_name,
            email: signup.email,
            created_at: Utc::now(),
        };
        if let Err(e) = self.invoices.notify(&invoice).await {
            error!(error = %e, %order_id, "Invoice could not be sent");
        }

        Ok(CheckoutResponse::success("Transaction successful"))
    }

    /// Record a payment the admin took through the virtual terminal.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Gateway` if the intent or payment method
    /// cannot be retrieved, `CheckoutError::MissingCard` if the payment
    /// method is not a card, and `CheckoutError::Persistence` if the insert
    /// fails.
    #[instrument(skip(self, payment), fields(payment_intent = %payment.payment_intent))]
    pub async fn confirm_virtual_terminal(
        &self,
        payment: TerminalPayment,
    ) -> Result<Transaction, CheckoutError> {
        let intent = self.gateway.retrieve_intent(&payment.payment_intent).await?;
        let method = self
            .gateway
            .retrieve_payment_method(&payment.payment_method)
            .await?;
        let card = method.card.ok_or(CheckoutError::MissingCard)?;

        let new_transaction = NewTransaction {
            amount: payment.amount,
            currency: payment.currency,
            last_four: card.last4,
            bank_return_code: intent.latest_charge.unwrap_or_default(),
            expiry_month: card.exp_month,
            expiry_year: card.exp_year,
            payment_intent: payment.payment_intent,
            payment_method: payment.payment_method,
            status: TransactionStatus::Succeeded,
        };

        let transaction = self.store.insert_transaction(&new_transaction).await?;
        info!(transaction_id = %transaction.id, "Virtual terminal payment recorded");

        Ok(transaction)
    }

    /// Refund an order's payment and mark it refunded.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Gateway` if the refund is refused, and
    /// `CheckoutError::RefundNotRecorded` if the money moved but the order
    /// status could not be updated.
    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        order_id: OrderId,
        payment_intent: &str,
        amount: i64,
    ) -> Result<(), CheckoutError> {
        if amount <= 0 {
            return Err(AmountError::NotPositive.into());
        }

        self.gateway
            .refund(payment_intent, Amount::from_minor_units(amount))
            .await?;

        self.store
            .update_order_status(order_id, OrderStatus::Refunded)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Refund succeeded but order status was not updated");
                CheckoutError::RefundNotRecorded(e)
            })?;

        info!(%order_id, "Order refunded");
        Ok(())
    }

    /// Cancel a subscription at period end and mark the order cancelled.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Gateway` if the cancellation is refused, and
    /// `CheckoutError::CancellationNotRecorded` if the subscription was
    /// cancelled but the order status could not be updated.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        order_id: OrderId,
        subscription: &str,
    ) -> Result<(), CheckoutError> {
        self.gateway.cancel_subscription(subscription).await?;

        self.store
            .update_order_status(order_id, OrderStatus::SubscriptionCancelled)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    %order_id,
                    "Cancellation succeeded but order status was not updated"
                );
                CheckoutError::CancellationNotRecorded(e)
            })?;

        info!(%order_id, "Subscription cancelled");
        Ok(())
    }
}

fn validate_signup(signup: &SubscriptionSignup) -> Result<(Amount, WidgetId), CheckoutError> {
    let mut v = Validator::new();
    v.check(
        min_chars(&signup.first_name, 2),
        "first_name",
        "must be at least 2 characters",
    );

    let amount = match Amount::parse_positive(&signup.amount) {
        Ok(amount) => Some(amount),
        Err(e) => {
            v.add("amount", &e.to_string());
            None
        }
    };

    let product_id = signup
        .product_id
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0);
    v.check(product_id.is_some(), "product_id", "must be a positive integer");

    v.finish().map_err(CheckoutError::Validation)?;

    amount
        .zip(product_id.map(WidgetId::new))
        .ok_or_else(|| CheckoutError::Validation(FieldErrors::new()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signup() -> SubscriptionSignup {
        SubscriptionSignup {
            currency: "cad".into(),
            amount: "2000".into(),
            payment_method: "pm_card_visa".into(),
            email: "jo@example.com".into(),
            plan: "price_bronze_monthly".into(),
            product_id: "2".into(),
            first_name: "Jo".into(),
            last_name: "Buyer".into(),
            last_four: "4242".into(),
            card_brand: "visa".into(),
            exp_month: 12,
            exp_year: 2030,
        }
    }

    #[test]
    fn test_valid_signup() {
        let (amount, widget_id) = validate_signup(&signup()).unwrap();
        assert_eq!(amount.minor_units(), 2000);
        assert_eq!(widget_id, WidgetId::new(2));
    }

    #[test]
    fn test_short_first_name_is_rejected() {
        let mut s = signup();
        s.first_name = "J".into();

        let Err(CheckoutError::Validation(errors)) = validate_signup(&s) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("first_name"));
    }

    #[test]
    fn test_every_bad_field_is_reported() {
        let mut s = signup();
        s.first_name = String::new();
        s.amount = "-5".into();
        s.product_id = "abc".into();

        let Err(CheckoutError::Validation(errors)) = validate_signup(&s) else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.keys().map(String::as_str).collect::<Vec<_>>(),
            ["amount", "first_name", "product_id"]
        );
    }

    #[test]
    fn test_charge_outcome_serializes_untagged() {
        let failed = ChargeOutcome::Failed(CheckoutResponse::failure("Your card was declined"));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"ok": false, "message": "Your card was declined"})
        );
    }

    #[test]
    fn test_partial_failure_messages() {
        let e = CheckoutError::RefundNotRecorded(RepositoryError::NotFound);
        assert_eq!(
            e.to_string(),
            "the charge was refunded but the database could not be updated"
        );
        let e = CheckoutError::CancellationNotRecorded(RepositoryError::NotFound);
        assert_eq!(
            e.to_string(),
            "the subscription was cancelled but the database could not be updated"
        );
    }
}
