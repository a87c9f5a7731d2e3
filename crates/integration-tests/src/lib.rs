//! Integration tests for the widget store backend.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p widget-store-integration-tests
//! ```
//!
//! No database or network is needed: the fakes here stand in for the
//! payment gateway, the order and token stores, the invoice service, the
//! mailer and websocket clients. Router tests use a lazily-connected pool
//! that is never touched.
//!
//! # Test Categories
//!
//! - `checkout` - Charge, subscribe-and-book, refund and cancel flows
//! - `tokens` - Bearer token issue and verification
//! - `hub` - Notification hub registration, broadcast and eviction
//! - `router` - HTTP surface: auth guard, envelopes, body limits, headers

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;

use widget_store_api::config::{ApiConfig, EmailConfig, StripeConfig};
use widget_store_api::db::{OrderStore, RepositoryError, TokenStore};
use widget_store_api::gateway::{
    CardDetails, GatewayCustomer, GatewayError, PaymentGateway, PaymentIntent, PaymentMethod,
    Subscription, SubscriptionMetadata,
};
use widget_store_api::hub::{ClientSink, HubHandle, ServerMessage, SinkError};
use widget_store_api::models::{
    AuthToken, NewCustomer, NewOrder, NewTransaction, Transaction, User, Widget,
};
use widget_store_api::services::{EmailError, Invoice, InvoiceError, InvoiceNotifier, Mailer};
use widget_store_api::state::{AppState, Collaborators};
use widget_store_core::{
    Amount, CustomerId, Email, OrderId, OrderStatus, TransactionId, UserId, WidgetId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected() -> RepositoryError {
    RepositoryError::DataCorruption("injected failure".to_owned())
}

// ============================================================================
// Fixtures
// ============================================================================

/// A staff user.
#[must_use]
pub fn staff_user(id: i32, email: &str) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(id),
        first_name: "Ada".to_owned(),
        last_name: "Admin".to_owned(),
        email: Email::parse(email).unwrap_or_else(|_| panic!("bad fixture email {email}")),
        created_at: now,
        updated_at: now,
    }
}

/// A recurring widget with a gateway plan.
#[must_use]
pub fn plan_widget(id: i32) -> Widget {
    Widget {
        id: WidgetId::new(id),
        name: "Bronze Plan".to_owned(),
        description: "Monthly widget delivery".to_owned(),
        inventory_level: 100,
        price: 2000,
        is_recurring: true,
        plan_id: "price_bronze".to_owned(),
        image: String::new(),
    }
}

/// Configuration that never reaches a real service.
#[must_use]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://localhost/widgets_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 4001,
        frontend_url: "http://localhost:4000".to_owned(),
        signing_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_unused"),
            publishable_key: "pk_test_unused".to_owned(),
            api_base: "http://127.0.0.1:9".to_owned(),
        },
        invoice_service_url: "http://127.0.0.1:9".to_owned(),
        auth_token_ttl_hours: 24,
        reset_link_ttl_minutes: 60,
        email: EmailConfig {
            smtp_host: "localhost".to_owned(),
            smtp_port: 2525,
            smtp_username: "mailer".to_owned(),
            smtp_password: SecretString::from("unused"),
            from_address: "info@widget.com".to_owned(),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Fakes behind an [`AppState`], kept so tests can inspect them.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
    pub store: Arc<InMemoryStore>,
    pub invoices: Arc<RecordingNotifier>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    /// Build state around default fakes. Must be called inside a runtime.
    ///
    /// # Panics
    ///
    /// Panics if the lazy pool URL does not parse.
    #[must_use]
    pub fn new(hub: HubHandle) -> Self {
        Self::with_gateway(hub, StubGateway::new())
    }

    /// # Panics
    ///
    /// Panics if the lazy pool URL does not parse.
    #[must_use]
    pub fn with_gateway(hub: HubHandle, gateway: StubGateway) -> Self {
        let gateway = Arc::new(gateway);
        let store = Arc::new(InMemoryStore::new().with_widget(plan_widget(1)));
        let invoices = Arc::new(RecordingNotifier::default());
        let tokens = Arc::new(InMemoryTokenStore::default());
        let mailer = Arc::new(RecordingMailer::default());

        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/widgets_test")
            .unwrap_or_else(|e| panic!("lazy pool: {e}"));

        let state = AppState::with_collaborators(
            config,
            pool,
            hub,
            Collaborators {
                gateway: gateway.clone(),
                orders: store.clone(),
                invoices: invoices.clone(),
                tokens: tokens.clone(),
                mailer: mailer.clone(),
            },
        );

        Self {
            state,
            gateway,
            store,
            invoices,
            tokens,
            mailer,
        }
    }
}

// ============================================================================
// Payment gateway
// ============================================================================

/// One remote call on the stub gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    Charge,
    CreateCustomer,
    Subscribe,
    Refund,
    CancelSubscription,
    RetrieveIntent,
    RetrievePaymentMethod,
}

/// Answers every call with canned objects unless told to fail it.
pub struct StubGateway {
    failures: HashMap<GatewayCall, GatewayError>,
    card: Option<CardDetails>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl StubGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            card: Some(CardDetails {
                brand: "visa".to_owned(),
                last4: "4242".to_owned(),
                exp_month: 12,
                exp_year: 2030,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make `call` fail with `error`.
    #[must_use]
    pub fn failing(mut self, call: GatewayCall, error: GatewayError) -> Self {
        self.failures.insert(call, error);
        self
    }

    /// Return payment methods without card details.
    #[must_use]
    pub fn without_card(mut self) -> Self {
        self.card = None;
        self
    }

    /// Calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: GatewayCall) -> Result<(), GatewayError> {
        lock(&self.calls).push(call);
        self.failures.get(&call).map_or(Ok(()), |e| Err(e.clone()))
    }

    fn intent(id: &str, amount: i64, currency: &str) -> PaymentIntent {
        PaymentIntent {
            id: id.to_owned(),
            amount,
            currency: currency.to_owned(),
            status: "requires_payment_method".to_owned(),
            client_secret: Some(format!("{id}_secret")),
            latest_charge: None,
            rest: serde_json::Map::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn charge(&self, currency: &str, amount: Amount) -> Result<PaymentIntent, GatewayError> {
        self.record(GatewayCall::Charge)?;
        Ok(Self::intent("pi_test", amount.minor_units(), currency))
    }

    async fn create_customer(
        &self,
        _payment_method: &str,
        _email: &str,
    ) -> Result<GatewayCustomer, GatewayError> {
        self.record(GatewayCall::CreateCustomer)?;
        Ok(GatewayCustomer {
            id: "cus_test".to_owned(),
        })
    }

    async fn subscribe(
        &self,
        _customer: &GatewayCustomer,
        _plan: &str,
        _metadata: &SubscriptionMetadata,
    ) -> Result<Subscription, GatewayError> {
        self.record(GatewayCall::Subscribe)?;
        Ok(Subscription {
            id: "sub_test".to_owned(),
            status: "active".to_owned(),
        })
    }

    async fn refund(&self, _payment_intent: &str, _amount: Amount) -> Result<(), GatewayError> {
        self.record(GatewayCall::Refund)
    }

    async fn cancel_subscription(&self, _subscription: &str) -> Result<(), GatewayError> {
        self.record(GatewayCall::CancelSubscription)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, GatewayError> {
        self.record(GatewayCall::RetrieveIntent)?;
        let mut intent = Self::intent(id, 0, "cad");
        intent.status = "succeeded".to_owned();
        intent.latest_charge = Some("ch_test".to_owned());
        Ok(intent)
    }

    async fn retrieve_payment_method(&self, id: &str) -> Result<PaymentMethod, GatewayError> {
        self.record(GatewayCall::RetrievePaymentMethod)?;
        Ok(PaymentMethod {
            id: id.to_owned(),
            card: self.card.clone(),
        })
    }
}

// ============================================================================
// Order store
// ============================================================================

/// One [`OrderStore`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreStep {
    Customer,
    Transaction,
    Order,
    Status,
}

/// What the in-memory store has recorded.
#[derive(Debug, Default, Clone)]
pub struct StoreContents {
    pub customers: Vec<NewCustomer>,
    pub transactions: Vec<Transaction>,
    pub orders: Vec<(OrderId, NewOrder)>,
    pub statuses: HashMap<OrderId, OrderStatus>,
}

pub struct InMemoryStore {
    widgets: Vec<Widget>,
    failing: HashSet<StoreStep>,
    contents: Mutex<StoreContents>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            widgets: Vec::new(),
            failing: HashSet::new(),
            contents: Mutex::new(StoreContents::default()),
        }
    }

    #[must_use]
    pub fn with_widget(mut self, widget: Widget) -> Self {
        self.widgets.push(widget);
        self
    }

    /// Make `step` fail with a repository error.
    #[must_use]
    pub fn failing_on(mut self, step: StoreStep) -> Self {
        self.failing.insert(step);
        self
    }

    #[must_use]
    pub fn contents(&self) -> StoreContents {
        lock(&self.contents).clone()
    }

    fn check(&self, step: StoreStep) -> Result<(), RepositoryError> {
        if self.failing.contains(&step) {
            Err(injected())
        } else {
            Ok(())
        }
    }
}

fn next_id(len: usize) -> i32 {
    i32::try_from(len).map_or(i32::MAX, |n| n + 1)
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn widget(&self, id: WidgetId) -> Result<Option<Widget>, RepositoryError> {
        Ok(self.widgets.iter().find(|w| w.id == id).cloned())
    }

    async fn insert_customer(&self, customer: &NewCustomer) -> Result<CustomerId, RepositoryError> {
        self.check(StoreStep::Customer)?;
        let mut contents = lock(&self.contents);
        let id = CustomerId::new(next_id(contents.customers.len()));
        contents.customers.push(customer.clone());
        Ok(id)
    }

    async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        self.check(StoreStep::Transaction)?;
        let mut contents = lock(&self.contents);
        let now = Utc::now();
        let stored = Transaction {
            id: TransactionId::new(next_id(contents.transactions.len())),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            last_four: transaction.last_four.clone(),
            bank_return_code: transaction.bank_return_code.clone(),
            expiry_month: transaction.expiry_month,
            expiry_year: transaction.expiry_year,
            payment_intent: transaction.payment_intent.clone(),
            payment_method: transaction.payment_method.clone(),
            status: transaction.status,
            created_at: now,
            updated_at: now,
        };
        contents.transactions.push(stored.clone());
        Ok(stored)
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        self.check(StoreStep::Order)?;
        let mut contents = lock(&self.contents);
        let id = OrderId::new(next_id(contents.orders.len()));
        contents.orders.push((id, order.clone()));
        contents.statuses.insert(id, order.status);
        Ok(id)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        self.check(StoreStep::Status)?;
        let mut contents = lock(&self.contents);
        let slot = contents
            .statuses
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = status;
        Ok(())
    }
}

// ============================================================================
// Invoices and mail
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    fail: AtomicBool,
    sent: Mutex<Vec<Invoice>>,
}

impl RecordingNotifier {
    /// Make every later notification fail with a 500.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Invoice> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl InvoiceNotifier for RecordingNotifier {
    async fn notify(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InvoiceError::Status(500));
        }
        lock(&self.sent).push(invoice.clone());
        Ok(())
    }
}

/// A password reset mail that would have gone out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReset {
    pub to: String,
    pub link: String,
    pub expires_minutes: i64,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentReset>>,
}

impl RecordingMailer {
    #[must_use]
    pub fn sent(&self) -> Vec<SentReset> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset(
        &self,
        to: &str,
        link: &str,
        expires_minutes: i64,
    ) -> Result<(), EmailError> {
        lock(&self.sent).push(SentReset {
            to: to.to_owned(),
            link: link.to_owned(),
            expires_minutes,
        });
        Ok(())
    }
}

// ============================================================================
// Token store
// ============================================================================

struct StoredToken {
    hash: [u8; 32],
    expiry: DateTime<Utc>,
    user: User,
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    fail: AtomicBool,
    tokens: Mutex<Vec<StoredToken>>,
}

impl InMemoryTokenStore {
    /// Make every later lookup fail with a repository error.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Tokens currently held for `user`.
    #[must_use]
    pub fn count_for(&self, user: UserId) -> usize {
        lock(&self.tokens)
            .iter()
            .filter(|t| t.user.id == user)
            .count()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn replace_for_user(&self, token: &AuthToken, user: &User) -> Result<(), RepositoryError> {
        let mut tokens = lock(&self.tokens);
        tokens.retain(|t| t.user.id != user.id);
        tokens.push(StoredToken {
            hash: token.hash,
            expiry: token.expiry,
            user: user.clone(),
        });
        Ok(())
    }

    async fn user_for_token(
        &self,
        hash: &[u8; 32],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(lock(&self.tokens)
            .iter()
            .find(|t| &t.hash == hash && t.expiry > now)
            .map(|t| t.user.clone()))
    }
}

// ============================================================================
// Websocket clients
// ============================================================================

/// What a [`RecordingSink`] saw, readable after the sink moved into the hub.
#[derive(Clone, Default)]
pub struct SinkProbe {
    messages: Arc<Mutex<Vec<ServerMessage>>>,
    closed: Arc<AtomicBool>,
}

impl SinkProbe {
    #[must_use]
    pub fn messages(&self) -> Vec<ServerMessage> {
        lock(&self.messages).clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Client write half that records messages, optionally failing after a
/// number of successful sends.
pub struct RecordingSink {
    probe: SinkProbe,
    remaining: Option<usize>,
}

impl RecordingSink {
    #[must_use]
    pub fn pair() -> (Self, SinkProbe) {
        let probe = SinkProbe::default();
        (
            Self {
                probe: probe.clone(),
                remaining: None,
            },
            probe,
        )
    }

    /// Accept `sends` messages, then fail every write.
    #[must_use]
    pub fn failing_after(sends: usize) -> (Self, SinkProbe) {
        let (mut sink, probe) = Self::pair();
        sink.remaining = Some(sends);
        (sink, probe)
    }
}

#[async_trait]
impl ClientSink for RecordingSink {
    async fn send(&mut self, message: &ServerMessage) -> Result<(), SinkError> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(SinkError("peer went away".to_owned()));
            }
            *remaining -= 1;
        }
        lock(&self.probe.messages).push(message.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}
