//! Invoice hand-off to the external invoice microservice.
//!
//! The microservice renders and emails the invoice; this side only posts
//! the order summary and checks the status code.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use widget_store_core::{OrderId, WidgetId};

/// Errors from the invoice service.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice request failed: {0}")]
    Request(String),

    #[error("invoice service returned HTTP {0}")]
    Status(u16),
}

/// Order summary sent to the invoice service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    /// The order id.
    pub id: OrderId,
    pub widget_id: WidgetId,
    /// Minor units.
    pub amount: i64,
    pub product: String,
    pub quantity: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Something that can deliver an invoice.
#[async_trait]
pub trait InvoiceNotifier: Send + Sync {
    async fn notify(&self, invoice: &Invoice) -> Result<(), InvoiceError>;
}

/// Posts invoices as JSON to `{base}/invoice/create-and-send`.
#[derive(Debug, Clone)]
pub struct HttpInvoiceNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpInvoiceNotifier {
    /// Create a notifier for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::Request` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, InvoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| InvoiceError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/invoice/create-and-send", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl InvoiceNotifier for HttpInvoiceNotifier {
    #[instrument(skip(self, invoice), fields(order_id = %invoice.id))]
    async fn notify(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(invoice)
            .send()
            .await
            .map_err(|e| InvoiceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceError::Status(status.as_u16()));
        }

        Ok(())
    }
}
