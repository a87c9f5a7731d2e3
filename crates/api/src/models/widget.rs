//! Catalog widgets.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use widget_store_core::WidgetId;

/// A purchasable item.
///
/// Recurring widgets are subscription plans billed through `plan_id`;
/// the others are one-time sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Widget {
    pub id: WidgetId,
    pub name: String,
    pub description: String,
    pub inventory_level: i32,
    /// Price in minor units.
    pub price: i64,
    pub is_recurring: bool,
    /// Gateway plan (price) identifier, empty for one-time widgets.
    pub plan_id: String,
    pub image: String,
}
