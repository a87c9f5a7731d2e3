//! Status enums for transactions and orders.
//!
//! Both are stored as `integer` columns that reference lookup tables
//! (`transaction_statuses`, `statuses`), and both travel over JSON as the
//! bare integer id, so the admin dashboard can keep using the numeric codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status id that has no matching variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind} status id: {id}")]
pub struct UnknownStatus {
    /// Which status family was being decoded.
    pub kind: &'static str,
    /// The offending id.
    pub id: i32,
}

/// Lifecycle of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "i32", try_from = "i32")]
pub enum TransactionStatus {
    #[default]
    Pending,
    /// Money was captured (one-time charge or subscription start).
    Succeeded,
    Declined,
    Refunded,
    PartiallyRefunded,
}

impl TransactionStatus {
    /// The lookup-table id stored in `transactions.transaction_status_id`.
    #[must_use]
    pub const fn id(self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::Succeeded => 2,
            Self::Declined => 3,
            Self::Refunded => 4,
            Self::PartiallyRefunded => 5,
        }
    }
}

impl TryFrom<i32> for TransactionStatus {
    type Error = UnknownStatus;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Succeeded),
            3 => Ok(Self::Declined),
            4 => Ok(Self::Refunded),
            5 => Ok(Self::PartiallyRefunded),
            _ => Err(UnknownStatus {
                kind: "transaction",
                id,
            }),
        }
    }
}

/// Lifecycle of an order.
///
/// Orders start as `Pending` and only move through explicit admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "i32", try_from = "i32")]
pub enum OrderStatus {
    #[default]
    Pending,
    Refunded,
    SubscriptionCancelled,
}

impl OrderStatus {
    /// The lookup-table id stored in `orders.status_id`.
    #[must_use]
    pub const fn id(self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::Refunded => 2,
            Self::SubscriptionCancelled => 3,
        }
    }
}

impl TryFrom<i32> for OrderStatus {
    type Error = UnknownStatus;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Refunded),
            3 => Ok(Self::SubscriptionCancelled),
            _ => Err(UnknownStatus { kind: "order", id }),
        }
    }
}

/// Conversions and `sqlx` bindings shared by the integer-backed statuses.
macro_rules! integer_status {
    ($name:ident) => {
        impl From<$name> for i32 {
            fn from(status: $name) -> Self {
                status.id()
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self::try_from(id)?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.id(), buf)
            }
        }
    };
}

integer_status!(TransactionStatus);
integer_status!(OrderStatus);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_ids_match_lookup_table() {
        assert_eq!(OrderStatus::Pending.id(), 1);
        assert_eq!(OrderStatus::Refunded.id(), 2);
        assert_eq!(OrderStatus::SubscriptionCancelled.id(), 3);
    }

    #[test]
    fn test_transaction_status_serializes_as_integer() {
        let json = serde_json::to_string(&TransactionStatus::Succeeded).unwrap();
        assert_eq!(json, "2");
        let parsed: TransactionStatus = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, TransactionStatus::Refunded);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = OrderStatus::try_from(9).unwrap_err();
        assert_eq!(err.to_string(), "unknown order status id: 9");
        assert!(serde_json::from_str::<TransactionStatus>("0").is_err());
    }
}
