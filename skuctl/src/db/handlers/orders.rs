//! Repository for order rows.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::models::orders::{Order, OrderCreateDBRequest, OrderStatus};
use crate::types::{OrderId, abbrev_uuid};

/// Repository for the `orders` table.
pub struct Orders<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Orders<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new order.
    #[instrument(skip(self, request), fields(merchant_id = %request.merchant_id), err)]
    pub async fn create(&mut self, request: &OrderCreateDBRequest) -> Result<Order> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (merchant_id, status, currency, location, total_price, allowed_payment_methods, valid_for)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.merchant_id)
        .bind(request.status.as_str())
        .bind(&request.currency)
        .bind(&request.location)
        .bind(request.total_price)
        .bind(&request.allowed_payment_methods)
        .bind(request.valid_for.clone())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(order)
    }

    /// Get an order by ID.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn get(&mut self, id: OrderId) -> Result<Order> {
        sqlx::query_as::<_, Order>(r#"SELECT * FROM orders WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::OrderNotFound)
    }

    /// Get the order carrying `ext_id` as its `externalID` metadata entry.
    ///
    /// Vendor flows key orders by purchase token rather than order id.
    #[instrument(skip(self, ext_id), err)]
    pub async fn get_by_external_id(&mut self, ext_id: &str) -> Result<Order> {
        sqlx::query_as::<_, Order>(r#"SELECT * FROM orders WHERE metadata->>'externalID' = $1"#)
            .bind(ext_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::OrderNotFound)
    }

    /// Get the metadata bag of an order.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn get_metadata(&mut self, id: OrderId) -> Result<serde_json::Value> {
        sqlx::query_scalar::<_, serde_json::Value>(r#"SELECT metadata FROM orders WHERE id = $1 AND metadata IS NOT NULL"#)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::OrderNotFound)
    }

    /// Set trial_days, returning the updated order.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn set_trial_days(&mut self, id: OrderId, ndays: i64) -> Result<Order> {
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET trial_days = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ndays)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::OrderNotFound)
    }

    /// Set the lifecycle status.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id), status = status.as_str()), err)]
    pub async fn set_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let query = sqlx::query(r#"UPDATE orders SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1"#)
            .bind(id)
            .bind(status.as_str());

        self.exec_update(query).await
    }

    /// Set last_paid_at to `when`.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn set_last_paid_at(&mut self, id: OrderId, when: DateTime<Utc>) -> Result<()> {
        let query = sqlx::query(r#"UPDATE orders SET last_paid_at = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1"#)
            .bind(id)
            .bind(when);

        self.exec_update(query).await
    }

    /// Set expires_at to `when`.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn set_expires_at(&mut self, id: OrderId, when: DateTime<Utc>) -> Result<()> {
        let query = sqlx::query(r#"UPDATE orders SET expires_at = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1"#)
            .bind(id)
            .bind(when);

        self.exec_update(query).await
    }

    /// Replace the metadata bag wholesale. Prefer [`Orders::append_metadata`]
    /// for incremental updates.
    #[instrument(skip(self, data), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn update_metadata(&mut self, id: OrderId, data: &serde_json::Value) -> Result<()> {
        let query = sqlx::query(r#"UPDATE orders SET metadata = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1"#)
            .bind(id)
            .bind(data);

        self.exec_update(query).await
    }

    /// Merge a single string entry into the metadata bag, creating the bag
    /// if it was missing.
    ///
    /// The merge happens in SQL, so concurrent appends to different keys do
    /// not clobber each other; appends to the same key are last-write-wins.
    #[instrument(skip(self, val), fields(order_id = %abbrev_uuid(&id), key), err)]
    pub async fn append_metadata(&mut self, id: OrderId, key: &str, val: &str) -> Result<()> {
        let query = sqlx::query(
            r#"
            UPDATE orders
            SET metadata = COALESCE(metadata || jsonb_build_object($2::text, $3::text), metadata, jsonb_build_object($2::text, $3::text)),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(val);

        self.exec_update(query).await
    }

    /// Merge a single integer entry into the metadata bag, creating the bag
    /// if it was missing.
    #[instrument(skip(self, val), fields(order_id = %abbrev_uuid(&id), key), err)]
    pub async fn append_metadata_int(&mut self, id: OrderId, key: &str, val: i32) -> Result<()> {
        let query = sqlx::query(
            r#"
            UPDATE orders
            SET metadata = COALESCE(metadata || jsonb_build_object($2::text, $3::integer), metadata, jsonb_build_object($2::text, $3::integer)),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(val);

        self.exec_update(query).await
    }

    /// Compute a candidate new expiry: last_paid_at (or now, when never
    /// paid) plus the maximum `valid_for_iso` across the order's items,
    /// falling back to one month when no item specifies an interval.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&id)), err)]
    pub async fn get_expires_at_after_iso_period(&mut self, id: OrderId) -> Result<DateTime<Utc>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT COALESCE(last_paid_at, now()) +
                (SELECT COALESCE(MAX(valid_for_iso::interval), interval '1 month') FROM order_items WHERE order_id = $1)
            AS expires_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::OrderNotFound)
    }

    /// Run an update that must affect at least one row; zero affected rows
    /// means the order does not exist and is surfaced, not swallowed.
    async fn exec_update(&mut self, query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>) -> Result<()> {
        let result = query.execute(&mut *self.db).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NoRowsChangedOrder);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Months;
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::*;
    use crate::db::handlers::test_support::{create_order, create_order_item};

    #[sqlx::test]
    async fn create_returns_persisted_row(pool: PgPool) {
        let order = create_order(&pool).await;

        assert_eq!(order.merchant_id, "brave.com");
        assert_eq!(order.status, "pending");
        assert_eq!(order.order_status(), OrderStatus::Pending);
        assert_eq!(order.allowed_payment_methods, vec!["radom".to_string()]);
        assert!(order.last_paid_at.is_none());
    }

    #[sqlx::test]
    async fn set_trial_days_missing_order(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let result = Orders::new(&mut conn).set_trial_days(Uuid::new_v4(), 7).await;

        assert!(matches!(result, Err(DbError::OrderNotFound)));
    }

    #[sqlx::test]
    async fn set_trial_days_is_idempotent(pool: PgPool) {
        let order = create_order(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let first = Orders::new(&mut conn).set_trial_days(order.id, 7).await.unwrap();
        let second = Orders::new(&mut conn).set_trial_days(order.id, 7).await.unwrap();

        assert_eq!(first.trial_days, Some(7));
        assert_eq!(second.trial_days, Some(7));
    }

    #[sqlx::test]
    async fn set_status_missing_order(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let result = Orders::new(&mut conn).set_status(Uuid::new_v4(), OrderStatus::Paid).await;

        assert!(matches!(result, Err(DbError::NoRowsChangedOrder)));
    }

    #[sqlx::test]
    async fn set_status_updates_row(pool: PgPool) {
        let order = create_order(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        Orders::new(&mut conn).set_status(order.id, OrderStatus::Paid).await.unwrap();
        let fetched = Orders::new(&mut conn).get(order.id).await.unwrap();

        assert_eq!(fetched.order_status(), OrderStatus::Paid);
    }

    #[sqlx::test]
    async fn append_metadata_merges_keys(pool: PgPool) {
        let order = create_order(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        // Bag does not exist yet; the first append creates it.
        repo.append_metadata(order.id, "externalID", "token_01").await.unwrap();
        repo.append_metadata(order.id, "paymentProcessor", "radom").await.unwrap();
        repo.append_metadata_int(order.id, "numPerInterval", 2).await.unwrap();

        let metadata = repo.get_metadata(order.id).await.unwrap();

        assert_eq!(metadata["externalID"], "token_01");
        assert_eq!(metadata["paymentProcessor"], "radom");
        assert_eq!(metadata["numPerInterval"], 2);
    }

    #[sqlx::test]
    async fn get_by_external_id_matches_metadata(pool: PgPool) {
        let order = create_order(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Orders::new(&mut conn);

        repo.append_metadata(order.id, "externalID", "token_42").await.unwrap();

        let found = repo.get_by_external_id("token_42").await.unwrap();
        assert_eq!(found.id, order.id);

        let missing = repo.get_by_external_id("token_nope").await;
        assert!(matches!(missing, Err(DbError::OrderNotFound)));
    }

    #[sqlx::test]
    async fn expires_at_falls_back_to_one_month(pool: PgPool) {
        let order = create_order(&pool).await;
        let paid_at = "2024-01-15T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut conn = pool.acquire().await.unwrap();

        // Interval arithmetic happens in the session timezone.
        sqlx::query("SET TIME ZONE 'UTC'").execute(&mut *conn).await.unwrap();

        let mut repo = Orders::new(&mut conn);

        repo.set_last_paid_at(order.id, paid_at).await.unwrap();

        let expires_at = repo.get_expires_at_after_iso_period(order.id).await.unwrap();

        assert_eq!(expires_at, paid_at.checked_add_months(Months::new(1)).unwrap());
    }

    #[sqlx::test]
    async fn expires_at_uses_max_item_interval(pool: PgPool) {
        let order = create_order(&pool).await;
        create_order_item(&pool, order.id, Some("P1M")).await;
        create_order_item(&pool, order.id, Some("P3M")).await;

        let paid_at = "2024-01-15T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut conn = pool.acquire().await.unwrap();

        sqlx::query("SET TIME ZONE 'UTC'").execute(&mut *conn).await.unwrap();

        let mut repo = Orders::new(&mut conn);

        repo.set_last_paid_at(order.id, paid_at).await.unwrap();

        let expires_at = repo.get_expires_at_after_iso_period(order.id).await.unwrap();

        assert_eq!(expires_at, paid_at.checked_add_months(Months::new(3)).unwrap());
    }
}
