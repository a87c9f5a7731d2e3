//! Widget catalog queries.

use sqlx::PgPool;

use widget_store_core::WidgetId;

use super::RepositoryError;
use crate::models::Widget;

/// Read-only access to the catalog.
pub struct WidgetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WidgetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a widget by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: WidgetId) -> Result<Option<Widget>, RepositoryError> {
        let widget = sqlx::query_as::<_, Widget>(
            r"
            SELECT id, name, description, inventory_level, price,
                   is_recurring, plan_id, image
            FROM widgets
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(widget)
    }
}
