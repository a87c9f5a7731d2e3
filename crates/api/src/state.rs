//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::{OrderStore, PgOrderStore, PgTokenStore, TokenStore};
use crate::gateway::{GatewayError, PaymentGateway, StripeGateway};
use crate::hub::HubHandle;
use crate::services::{
    CheckoutService, EmailService, HttpInvoiceNotifier, InvoiceError, InvoiceNotifier, Mailer,
    TokenService,
};
use crate::signer::UrlSigner;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("invoice service: {0}")]
    Invoice(#[from] InvoiceError),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// The collaborators behind the services. Production wires the real
/// clients; tests swap in fakes.
pub struct Collaborators {
    pub gateway: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub invoices: Arc<dyn InvoiceNotifier>,
    pub tokens: Arc<dyn TokenStore>,
    pub mailer: Arc<dyn Mailer>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    checkout: CheckoutService,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    signer: UrlSigner,
    hub: HubHandle,
}

impl AppState {
    /// Create the application state with the production clients.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP or SMTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool, hub: HubHandle) -> Result<Self, StateError> {
        let collaborators = Collaborators {
            gateway: Arc::new(StripeGateway::new(&config.stripe)?),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            invoices: Arc::new(HttpInvoiceNotifier::new(&config.invoice_service_url)?),
            tokens: Arc::new(PgTokenStore::new(pool.clone())),
            mailer: Arc::new(EmailService::new(&config.email)?),
        };

        Ok(Self::with_collaborators(config, pool, hub, collaborators))
    }

    /// Create the application state around explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: ApiConfig,
        pool: PgPool,
        hub: HubHandle,
        collaborators: Collaborators,
    ) -> Self {
        let checkout = CheckoutService::new(
            collaborators.gateway,
            collaborators.orders,
            collaborators.invoices,
        );
        let tokens = TokenService::new(collaborators.tokens, config.auth_token_ttl());
        let signer = UrlSigner::new(config.signing_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                checkout,
                tokens,
                mailer: collaborators.mailer,
                signer,
                hub,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn signer(&self) -> &UrlSigner {
        &self.inner.signer
    }

    /// Handle to the notification hub dispatcher.
    #[must_use]
    pub fn hub(&self) -> &HubHandle {
        &self.inner.hub
    }
}
