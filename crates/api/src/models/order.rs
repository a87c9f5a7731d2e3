//! Checkout records: customers, transactions and orders.
//!
//! Each checkout writes one row of each, in that order, as three
//! independent inserts. `New*` types are the insert payloads; the others
//! are rows read back with their ids and timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use widget_store_core::{
    CustomerId, OrderId, OrderStatus, TransactionId, TransactionStatus, WidgetId,
};

use super::Widget;

/// The buyer recorded for a checkout. Not de-duplicated by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Insert payload for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTransaction {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub last_four: String,
    pub bank_return_code: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    /// Payment intent id, or the subscription id for subscription signups.
    pub payment_intent: String,
    pub payment_method: String,
    pub status: TransactionStatus,
}

/// A stored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: i64,
    pub currency: String,
    pub last_four: String,
    pub bank_return_code: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub payment_intent: String,
    pub payment_method: String,
    #[serde(rename = "transaction_status_id")]
    #[sqlx(rename = "transaction_status_id")]
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub widget_id: WidgetId,
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub quantity: i32,
    pub amount: i64,
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub widget_id: WidgetId,
    pub transaction_id: TransactionId,
    pub customer_id: CustomerId,
    #[serde(rename = "status_id")]
    pub status: OrderStatus,
    pub quantity: i32,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin read model: an order with everything it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub widget: Widget,
    pub transaction: Transaction,
    pub customer: Customer,
}

/// Page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_size: i64,
    current_page: i64,
}

impl Pagination {
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Pages are 1-based; a zero or negative size becomes 1.
    #[must_use]
    pub fn new(page_size: i64, current_page: i64) -> Self {
        Self {
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
            current_page: current_page.max(1),
        }
    }

    #[must_use]
    pub const fn page_size(self) -> i64 {
        self.page_size
    }

    #[must_use]
    pub const fn current_page(self) -> i64 {
        self.current_page
    }

    /// Rows to skip for this page.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.current_page - 1) * self.page_size
    }

    /// `ceil(total_records / page_size)`.
    #[must_use]
    pub const fn last_page(self, total_records: i64) -> i64 {
        (total_records + self.page_size - 1) / self.page_size
    }
}

/// One page of orders as returned to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub current_page: i64,
    pub page_size: i64,
    pub last_page: i64,
    pub total_records: i64,
    pub orders: Vec<T>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(pagination: Pagination, total_records: i64, orders: Vec<T>) -> Self {
        Self {
            current_page: pagination.current_page(),
            page_size: pagination.page_size(),
            last_page: pagination.last_page(total_records),
            total_records,
            orders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_page_rounds_up() {
        let page = Pagination::new(10, 1);
        assert_eq!(page.last_page(0), 0);
        assert_eq!(page.last_page(10), 1);
        assert_eq!(page.last_page(11), 2);
    }

    #[test]
    fn test_offset_is_one_based() {
        assert_eq!(Pagination::new(5, 1).offset(), 0);
        assert_eq!(Pagination::new(5, 3).offset(), 10);
    }

    #[test]
    fn test_pagination_clamps_inputs() {
        let page = Pagination::new(0, -4);
        assert_eq!(page.page_size(), 1);
        assert_eq!(page.current_page(), 1);
        assert_eq!(Pagination::new(10_000, 2).page_size(), Pagination::MAX_PAGE_SIZE);
    }
}
