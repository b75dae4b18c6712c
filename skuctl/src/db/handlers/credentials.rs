//! Repository for time-limited v2 credential submissions.
//!
//! This table is what makes issuance idempotent: every signed batch is
//! recorded with its request id and blinded credentials, and the first
//! blinded credential of a batch is the deduplication key for "has this
//! batch already been signed".

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::models::credentials::{CredBatchCreateDBRequest, CredSubmissionReport};
use crate::types::{OrderId, OrderItemId, RequestId, abbrev_uuid};

/// Unique index backing the submission dedup; a concurrent duplicate insert
/// lands here instead of double-issuing.
pub const SUBMISSION_UNIQUE_CONSTRAINT: &str = "tlv2_item_request_first_cred_unique";

/// Returns true when `err` is the unique violation raised by inserting a
/// batch that is already stored. Callers treat the lost race as
/// already-submitted, not as a failure.
pub fn is_already_submitted(err: &DbError) -> bool {
    matches!(
        err,
        DbError::UniqueViolation { constraint, .. } if constraint.as_deref() == Some(SUBMISSION_UNIQUE_CONSTRAINT)
    )
}

/// Repository for the `time_limited_v2_order_creds` table.
pub struct Tlv2<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tlv2<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Report whether the batch identified by its first blinded credential
    /// was already submitted, and whether `req_id` is already bound to a
    /// different batch.
    ///
    /// Run this and the subsequent [`Tlv2::insert_batch`] inside one
    /// transaction; two concurrent deliveries can otherwise both observe
    /// "not submitted".
    #[instrument(skip(self, creds), fields(request_id = %abbrev_uuid(&req_id)), err)]
    pub async fn get_cred_submission_report(&mut self, req_id: RequestId, creds: &[String]) -> Result<CredSubmissionReport> {
        // Nothing to deduplicate on.
        let first = creds.first().ok_or(DbError::InvalidCredentialCount)?;

        let report = sqlx::query_as::<_, CredSubmissionReport>(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM time_limited_v2_order_creds WHERE blinded_creds->>0 = $2) AS submitted,
                EXISTS(SELECT 1 FROM time_limited_v2_order_creds WHERE request_id = $1 AND blinded_creds->>0 <> $2) AS req_id_mismatch
            "#,
        )
        .bind(req_id.to_string())
        .bind(first)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(report)
    }

    /// Count distinct request ids for batches of the given order item whose
    /// validity window overlaps `[from, to]`. Bounds how many issuance
    /// attempts exist for one billing period.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&order_id), item_id = %abbrev_uuid(&item_id)), err)]
    pub async fn uniq_batches(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT request_id)
            FROM time_limited_v2_order_creds
            WHERE order_id = $1 AND item_id = $2 AND valid_to >= $3 AND valid_from <= $4
            "#,
        )
        .bind(order_id)
        .bind(item_id)
        .bind(from)
        .bind(to)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Delete legacy batches of the order: rows whose request id textually
    /// equals the item id, an encoding used before request ids became
    /// random. Retained only for migration cleanup.
    #[instrument(skip(self), fields(order_id = %abbrev_uuid(&order_id)), err)]
    pub async fn delete_legacy(&mut self, order_id: OrderId) -> Result<()> {
        sqlx::query(r#"DELETE FROM time_limited_v2_order_creds WHERE order_id = $1 AND request_id = item_id::text"#)
            .bind(order_id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Persist one signed batch.
    ///
    /// A duplicate of an already-stored batch violates
    /// [`SUBMISSION_UNIQUE_CONSTRAINT`]; check with [`is_already_submitted`].
    #[instrument(skip(self, request), fields(order_id = %abbrev_uuid(&request.order_id), request_id = %abbrev_uuid(&request.request_id)), err)]
    pub async fn insert_batch(&mut self, request: &CredBatchCreateDBRequest) -> Result<()> {
        let blinded = serde_json::to_value(&request.blinded_creds).map_err(|e| DbError::Other(anyhow::Error::new(e)))?;
        let signed = serde_json::to_value(&request.signed_creds).map_err(|e| DbError::Other(anyhow::Error::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO time_limited_v2_order_creds
                (order_id, item_id, issuer_id, request_id, valid_from, valid_to, blinded_creds, signed_creds, batch_proof, public_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(request.order_id)
        .bind(request.item_id)
        .bind(request.issuer_id)
        .bind(request.request_id.to_string())
        .bind(request.valid_from)
        .bind(request.valid_to)
        .bind(blinded)
        .bind(signed)
        .bind(&request.batch_proof)
        .bind(&request.public_key)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::*;
    use crate::db::handlers::test_support::{create_issuer, create_order, create_order_item};
    use crate::types::IssuerId;

    fn batch(
        order_id: OrderId,
        item_id: OrderItemId,
        issuer_id: IssuerId,
        request_id: RequestId,
        first_cred: &str,
    ) -> CredBatchCreateDBRequest {
        CredBatchCreateDBRequest {
            order_id,
            item_id,
            issuer_id,
            request_id,
            valid_from: "2024-06-02T00:00:00Z".parse().unwrap(),
            valid_to: "2024-07-02T00:00:00Z".parse().unwrap(),
            blinded_creds: vec![first_cred.to_string(), format!("{first_cred}_b")],
            signed_creds: vec![format!("{first_cred}_signed"), format!("{first_cred}_b_signed")],
            batch_proof: "proof_01".to_string(),
            public_key: "public_key_01".to_string(),
        }
    }

    #[sqlx::test]
    async fn report_rejects_empty_batch(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let result = Tlv2::new(&mut conn).get_cred_submission_report(Uuid::new_v4(), &[]).await;

        assert!(matches!(result, Err(DbError::InvalidCredentialCount)));
    }

    #[sqlx::test]
    async fn report_blank_before_any_submission(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let report = Tlv2::new(&mut conn)
            .get_cred_submission_report(Uuid::new_v4(), &["cred_01".to_string()])
            .await
            .unwrap();

        assert_eq!(report, CredSubmissionReport::default());
    }

    #[sqlx::test]
    async fn resubmission_of_same_batch_reports_submitted(pool: PgPool) {
        let order = create_order(&pool).await;
        let item = create_order_item(&pool, order.id, None).await;
        let issuer = create_issuer(&pool).await;
        let req_id = Uuid::new_v4();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tlv2::new(&mut conn);

        repo.insert_batch(&batch(order.id, item.id, issuer.id, req_id, "cred_01")).await.unwrap();

        let report = repo.get_cred_submission_report(req_id, &["cred_01".to_string()]).await.unwrap();

        assert!(report.submitted);
        assert!(!report.req_id_mismatch);
    }

    #[sqlx::test]
    async fn request_id_reuse_reports_mismatch(pool: PgPool) {
        let order = create_order(&pool).await;
        let item = create_order_item(&pool, order.id, None).await;
        let issuer = create_issuer(&pool).await;
        let req_id = Uuid::new_v4();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tlv2::new(&mut conn);

        repo.insert_batch(&batch(order.id, item.id, issuer.id, req_id, "cred_01")).await.unwrap();

        let report = repo.get_cred_submission_report(req_id, &["cred_99".to_string()]).await.unwrap();

        assert!(!report.submitted);
        assert!(report.req_id_mismatch);
    }

    #[sqlx::test]
    async fn uniq_batches_counts_distinct_request_ids(pool: PgPool) {
        let order = create_order(&pool).await;
        let item = create_order_item(&pool, order.id, None).await;
        let issuer = create_issuer(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tlv2::new(&mut conn);

        repo.insert_batch(&batch(order.id, item.id, issuer.id, Uuid::new_v4(), "cred_01")).await.unwrap();
        repo.insert_batch(&batch(order.id, item.id, issuer.id, Uuid::new_v4(), "cred_02")).await.unwrap();

        let from = "2024-06-01T00:00:00Z".parse().unwrap();
        let to = "2024-07-01T00:00:00Z".parse().unwrap();
        assert_eq!(repo.uniq_batches(order.id, item.id, from, to).await.unwrap(), 2);

        // A window the batches' validity does not reach.
        let from = "2024-08-01T00:00:00Z".parse().unwrap();
        let to = "2024-09-01T00:00:00Z".parse().unwrap();
        assert_eq!(repo.uniq_batches(order.id, item.id, from, to).await.unwrap(), 0);
    }

    #[sqlx::test]
    async fn delete_legacy_spares_modern_rows(pool: PgPool) {
        let order = create_order(&pool).await;
        let item = create_order_item(&pool, order.id, None).await;
        let issuer = create_issuer(&pool).await;
        let modern_req = Uuid::new_v4();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tlv2::new(&mut conn);

        // Legacy encoding: request id equals the item id.
        repo.insert_batch(&batch(order.id, item.id, issuer.id, item.id, "cred_legacy")).await.unwrap();
        repo.insert_batch(&batch(order.id, item.id, issuer.id, modern_req, "cred_modern")).await.unwrap();

        repo.delete_legacy(order.id).await.unwrap();

        let remaining = sqlx::query_scalar::<_, String>("SELECT request_id FROM time_limited_v2_order_creds WHERE order_id = $1")
            .bind(order.id)
            .fetch_all(&pool)
            .await
            .unwrap();

        assert_eq!(remaining, vec![modern_req.to_string()]);
    }

    #[sqlx::test]
    async fn duplicate_batch_insert_hits_unique_constraint(pool: PgPool) {
        let order = create_order(&pool).await;
        let item = create_order_item(&pool, order.id, None).await;
        let issuer = create_issuer(&pool).await;
        let req_id = Uuid::new_v4();

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tlv2::new(&mut conn);

        repo.insert_batch(&batch(order.id, item.id, issuer.id, req_id, "cred_01")).await.unwrap();
        let err = repo
            .insert_batch(&batch(order.id, item.id, issuer.id, req_id, "cred_01"))
            .await
            .unwrap_err();

        assert!(is_already_submitted(&err));
    }
}
