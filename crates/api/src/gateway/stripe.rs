//! Stripe-compatible HTTP implementation of [`PaymentGateway`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use widget_store_core::Amount;

use super::{
    GatewayCustomer, GatewayError, PaymentGateway, PaymentIntent, PaymentMethod, Subscription,
    SubscriptionMetadata,
};
use crate::config::StripeConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: SecretString,
    api_base: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
    code: Option<String>,
}

impl StripeErrorDetail {
    fn into_gateway_error(self, status: u16) -> GatewayError {
        if self.error_type == "card_error" {
            return GatewayError::Declined(card_error_message(self.code.as_deref()).to_string());
        }
        GatewayError::Api {
            status,
            message: self.message,
        }
    }
}

/// Buyer-facing text for a card error code.
#[must_use]
pub fn card_error_message(code: Option<&str>) -> &'static str {
    match code {
        Some("card_declined") => "Your card was declined",
        Some("expired_card") => "Your card is expired",
        Some("incorrect_cvc") => "Incorrect CVC code",
        Some("incorrect_zip") => "Incorrect zip/postal code",
        Some("amount_too_large") => "The amount is too large to charge to your card",
        Some("amount_too_small") => "The amount is too small to charge to your card",
        Some("balance_insufficient") => "Insufficient balance",
        Some("postal_code_invalid") => "Your postal code is invalid",
        _ => "error in card",
    }
}

impl StripeGateway {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.clone(),
        })
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(params)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()));
        }

        let body: StripeErrorBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("status {status}: {e}")))?;
        let err = body.error.into_gateway_error(status.as_u16());
        warn!(status = %status, error = %err, "Gateway rejected request");
        Err(err)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, amount), fields(amount = amount.minor_units()))]
    async fn charge(&self, currency: &str, amount: Amount) -> Result<PaymentIntent, GatewayError> {
        let intent: PaymentIntent = self
            .post_form(
                "/payment_intents",
                &[
                    ("amount", amount.minor_units().to_string()),
                    ("currency", currency.to_string()),
                ],
            )
            .await?;

        debug!(payment_intent = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self, email))]
    async fn create_customer(
        &self,
        payment_method: &str,
        email: &str,
    ) -> Result<GatewayCustomer, GatewayError> {
        self.post_form(
            "/customers",
            &[
                ("payment_method", payment_method.to_string()),
                ("email", email.to_string()),
                (
                    "invoice_settings[default_payment_method]",
                    payment_method.to_string(),
                ),
            ],
        )
        .await
    }

    #[instrument(skip(self, customer, metadata), fields(customer = %customer.id))]
    async fn subscribe(
        &self,
        customer: &GatewayCustomer,
        plan: &str,
        metadata: &SubscriptionMetadata,
    ) -> Result<Subscription, GatewayError> {
        self.post_form(
            "/subscriptions",
            &[
                ("customer", customer.id.clone()),
                ("items[0][plan]", plan.to_string()),
                ("metadata[last_four]", metadata.last_four.clone()),
                ("metadata[card_type]", metadata.card_type.clone()),
                ("expand[]", "latest_invoice.payment_intent".to_string()),
            ],
        )
        .await
    }

    #[instrument(skip(self, amount), fields(amount = amount.minor_units()))]
    async fn refund(&self, payment_intent: &str, amount: Amount) -> Result<(), GatewayError> {
        let _: serde_json::Value = self
            .post_form(
                "/refunds",
                &[
                    ("payment_intent", payment_intent.to_string()),
                    ("amount", amount.minor_units().to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel_subscription(&self, subscription: &str) -> Result<(), GatewayError> {
        let _: Subscription = self
            .post_form(
                &format!("/subscriptions/{subscription}"),
                &[("cancel_at_period_end", "true".to_string())],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        self.get(&format!("/payment_intents/{id}")).await
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, GatewayError> {
        self.get(&format!("/payment_methods/{id}")).await
    }
}
