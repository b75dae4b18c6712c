//! Repository for order items.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::models::orders::{OrderItem, OrderItemCreateDBRequest};
use crate::types::{OrderId, OrderItemId, abbrev_uuid};

const ITEM_COLUMNS: &str = r#"
    id, order_id, created_at, updated_at, sku, currency,
    quantity, price, (quantity * price) AS subtotal,
    location, description, credential_type, metadata, valid_for_iso, issuance_interval
"#;

/// Repository for the `order_items` table.
pub struct OrderItems<'c> {
    db: &'c mut PgConnection,
}

impl<'c> OrderItems<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Get an order item by ID.
    #[instrument(skip(self), fields(item_id = %abbrev_uuid(&id)), err)]
    pub async fn get(&mut self, id: OrderItemId) -> Result<OrderItem> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = $1");

        sqlx::query_as::<_, OrderItem>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::OrderItemNotFound)
    }

    /// List the items belonging to an order.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&order_id)), err)]
    pub async fn find_by_order_id(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1");

        let items = sqlx::query_as::<_, OrderItem>(&query)
            .bind(order_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(items)
    }

    /// Insert items, returning them as persisted with the server-computed
    /// subtotal. An empty input returns an empty result without touching
    /// the database.
    #[instrument(skip(self, items), fields(num_items = items.len()), err)]
    pub async fn insert_many(&mut self, items: Vec<OrderItemCreateDBRequest>) -> Result<Vec<OrderItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            INSERT INTO order_items (
                order_id, sku, currency, quantity, price, subtotal,
                location, description, credential_type, metadata, valid_for, valid_for_iso, issuance_interval
            ) VALUES ($1, $2, $3, $4, $5, $4 * $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let mut result = Vec::with_capacity(items.len());

        for item in &items {
            let row = sqlx::query_as::<_, OrderItem>(&query)
                .bind(item.order_id)
                .bind(&item.sku)
                .bind(&item.currency)
                .bind(item.quantity)
                .bind(item.price)
                .bind(&item.location)
                .bind(&item.description)
                .bind(&item.credential_type)
                .bind(&item.metadata)
                .bind(item.valid_for.clone())
                .bind(&item.valid_for_iso)
                .bind(&item.issuance_interval)
                .fetch_one(&mut *self.db)
                .await?;

            result.push(row);
        }

        Ok(result)
    }
}
