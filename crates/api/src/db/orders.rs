//! Checkout persistence: customers, transactions, orders and the admin
//! dashboard readers.
//!
//! Every write here is its own statement. A checkout that fails between
//! inserts leaves the earlier rows behind; callers log what was orphaned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use widget_store_core::{
    CustomerId, OrderId, OrderStatus, TransactionId, TransactionStatus, WidgetId,
};

use super::RepositoryError;
use crate::models::{
    Customer, NewCustomer, NewOrder, NewTransaction, Order, OrderDetail, Page, Pagination,
    Transaction, Widget,
};

/// Persistence operations the checkout flow depends on.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up the widget being bought.
    async fn widget(&self, id: WidgetId) -> Result<Option<Widget>, RepositoryError>;

    async fn insert_customer(&self, customer: &NewCustomer) -> Result<CustomerId, RepositoryError>;

    /// Insert a transaction and return the stored row.
    async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, RepositoryError>;

    async fn insert_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError>;

    /// Set an order's status.
    ///
    /// Returns `RepositoryError::NotFound` if no order has this id.
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError>;
}

/// Flat row for the order/widget/transaction/customer join.
#[derive(FromRow)]
struct OrderDetailRow {
    id: OrderId,
    widget_id: WidgetId,
    transaction_id: TransactionId,
    customer_id: CustomerId,
    status_id: OrderStatus,
    quantity: i32,
    amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    widget_name: String,
    widget_description: String,
    widget_inventory_level: i32,
    widget_price: i64,
    widget_is_recurring: bool,
    widget_plan_id: String,
    widget_image: String,

    txn_amount: i64,
    txn_currency: String,
    txn_last_four: String,
    txn_bank_return_code: String,
    txn_expiry_month: i32,
    txn_expiry_year: i32,
    txn_payment_intent: String,
    txn_payment_method: String,
    txn_status_id: TransactionStatus,
    txn_created_at: DateTime<Utc>,
    txn_updated_at: DateTime<Utc>,

    customer_first_name: String,
    customer_last_name: String,
    customer_email: String,
}

impl From<OrderDetailRow> for OrderDetail {
    fn from(r: OrderDetailRow) -> Self {
        Self {
            order: Order {
                id: r.id,
                widget_id: r.widget_id,
                transaction_id: r.transaction_id,
                customer_id: r.customer_id,
                status: r.status_id,
                quantity: r.quantity,
                amount: r.amount,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
            widget: Widget {
                id: r.widget_id,
                name: r.widget_name,
                description: r.widget_description,
                inventory_level: r.widget_inventory_level,
                price: r.widget_price,
                is_recurring: r.widget_is_recurring,
                plan_id: r.widget_plan_id,
                image: r.widget_image,
            },
            transaction: Transaction {
                id: r.transaction_id,
                amount: r.txn_amount,
                currency: r.txn_currency,
                last_four: r.txn_last_four,
                bank_return_code: r.txn_bank_return_code,
                expiry_month: r.txn_expiry_month,
                expiry_year: r.txn_expiry_year,
                payment_intent: r.txn_payment_intent,
                payment_method: r.txn_payment_method,
                status: r.txn_status_id,
                created_at: r.txn_created_at,
                updated_at: r.txn_updated_at,
            },
            customer: Customer {
                id: r.customer_id,
                first_name: r.customer_first_name,
                last_name: r.customer_last_name,
                email: r.customer_email,
            },
        }
    }
}

const ORDER_DETAIL_SELECT: &str = r"
    SELECT o.id, o.widget_id, o.transaction_id, o.customer_id, o.status_id,
           o.quantity, o.amount, o.created_at, o.updated_at,
           w.name AS widget_name, w.description AS widget_description,
           w.inventory_level AS widget_inventory_level, w.price AS widget_price,
           w.is_recurring AS widget_is_recurring, w.plan_id AS widget_plan_id,
           w.image AS widget_image,
           t.amount AS txn_amount, t.currency AS txn_currency,
           t.last_four AS txn_last_four, t.bank_return_code AS txn_bank_return_code,
           t.expiry_month AS txn_expiry_month, t.expiry_year AS txn_expiry_year,
           t.payment_intent AS txn_payment_intent, t.payment_method AS txn_payment_method,
           t.transaction_status_id AS txn_status_id,
           t.created_at AS txn_created_at, t.updated_at AS txn_updated_at,
           c.first_name AS customer_first_name, c.last_name AS customer_last_name,
           c.email AS customer_email
    FROM orders o
    JOIN widgets w ON w.id = o.widget_id
    JOIN transactions t ON t.id = o.transaction_id
    JOIN customers c ON c.id = o.customer_id
";

/// Repository for checkout records.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a customer and return its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_customer(
        &self,
        customer: &NewCustomer,
    ) -> Result<CustomerId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO customers (first_name, last_name, email)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .fetch_one(self.pool)
        .await?;

        Ok(CustomerId::new(id))
    }

    /// Insert a transaction and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_transaction(
        &self,
        txn: &NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let row = sqlx::query_as::<_, Transaction>(
            r"
            INSERT INTO transactions
                (amount, currency, last_four, bank_return_code, expiry_month,
                 expiry_year, payment_intent, payment_method, transaction_status_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, amount, currency, last_four, bank_return_code,
                      expiry_month, expiry_year, payment_intent, payment_method,
                      transaction_status_id, created_at, updated_at
            ",
        )
        .bind(txn.amount)
        .bind(&txn.currency)
        .bind(&txn.last_four)
        .bind(&txn.bank_return_code)
        .bind(txn.expiry_month)
        .bind(txn.expiry_year)
        .bind(&txn.payment_intent)
        .bind(&txn.payment_method)
        .bind(txn.status)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Insert an order and return its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails, including
    /// foreign key violations for an unknown widget.
    pub async fn insert_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO orders
                (widget_id, transaction_id, customer_id, status_id, quantity, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(order.widget_id.as_i32())
        .bind(order.transaction_id.as_i32())
        .bind(order.customer_id.as_i32())
        .bind(order.status)
        .bind(order.quantity)
        .bind(order.amount)
        .fetch_one(self.pool)
        .await?;

        Ok(OrderId::new(id))
    }

    /// Update an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status_id = $1, updated_at = NOW()
            WHERE id = $2
            ",
        )
        .bind(status)
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Get a single order with its widget, transaction and customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let sql = format!("{ORDER_DETAIL_SELECT} WHERE o.id = $1");
        let row = sqlx::query_as::<_, OrderDetailRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(OrderDetail::from))
    }

    /// One-time sales (orders for non-recurring widgets), newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn sales_page(
        &self,
        pagination: Pagination,
    ) -> Result<Page<OrderDetail>, RepositoryError> {
        self.page_by_recurring(false, pagination).await
    }

    /// Subscriptions (orders for recurring widgets), newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn subscriptions_page(
        &self,
        pagination: Pagination,
    ) -> Result<Page<OrderDetail>, RepositoryError> {
        self.page_by_recurring(true, pagination).await
    }

    async fn page_by_recurring(
        &self,
        recurring: bool,
        pagination: Pagination,
    ) -> Result<Page<OrderDetail>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(o.id)
            FROM orders o
            JOIN widgets w ON w.id = o.widget_id
            WHERE w.is_recurring = $1
            ",
        )
        .bind(recurring)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            "{ORDER_DETAIL_SELECT} WHERE w.is_recurring = $1 \
             ORDER BY o.created_at DESC, o.id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, OrderDetailRow>(&sql)
            .bind(recurring)
            .bind(pagination.page_size())
            .bind(pagination.offset())
            .fetch_all(self.pool)
            .await?;

        let orders = rows.into_iter().map(OrderDetail::from).collect();
        Ok(Page::new(pagination, total, orders))
    }
}

/// [`OrderStore`] backed by the shared pool.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn widget(&self, id: WidgetId) -> Result<Option<Widget>, RepositoryError> {
        super::WidgetRepository::new(&self.pool).get_by_id(id).await
    }

    async fn insert_customer(&self, customer: &NewCustomer) -> Result<CustomerId, RepositoryError> {
        OrderRepository::new(&self.pool)
            .insert_customer(customer)
            .await
    }

    async fn insert_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        OrderRepository::new(&self.pool)
            .insert_transaction(transaction)
            .await
    }

    async fn insert_order(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        OrderRepository::new(&self.pool).insert_order(order).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(&self.pool)
            .update_status(id, status)
            .await
    }
}
