//! Repository for order payment history.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::types::{OrderId, abbrev_uuid};

/// Repository for the `order_payment_history` table.
///
/// Rows are append-only: one per payment event, on initial payment and on
/// every renewal.
pub struct OrderPayHistory<'c> {
    db: &'c mut PgConnection,
}

impl<'c> OrderPayHistory<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record that the order was paid at `when`.
    ///
    /// Re-recording the same payment event is an idempotent no-op, so a
    /// redelivered webhook cannot fail on history it already wrote. A
    /// nonexistent order still fails the foreign key.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn insert(&mut self, id: OrderId, when: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO order_payment_history (order_id, last_paid)
            VALUES ($1, $2)
            ON CONFLICT (order_id, last_paid) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(when)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(order_id = %abbrev_uuid(&id), "payment already recorded");
        }

        Ok(())
    }
}
