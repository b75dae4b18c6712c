//! Repository for credential issuers.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::models::issuers::{Issuer, IssuerCreateDBRequest};

/// Repository for the `order_cred_issuers` table.
pub struct Issuers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Issuers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new issuer.
    ///
    /// The table enforces one issuer per (merchant_id, public_key); a
    /// duplicate create surfaces as a unique violation.
    #[instrument(skip(self, request), fields(merchant_id = %request.merchant_id), err)]
    pub async fn create(&mut self, request: &IssuerCreateDBRequest) -> Result<Issuer> {
        let issuer = sqlx::query_as::<_, Issuer>(
            r#"
            INSERT INTO order_cred_issuers (merchant_id, public_key)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&request.merchant_id)
        .bind(&request.public_key)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(issuer)
    }

    /// Get an issuer by merchant ID.
    #[instrument(skip(self), err)]
    pub async fn get_by_merchant_id(&mut self, merchant_id: &str) -> Result<Issuer> {
        sqlx::query_as::<_, Issuer>(r#"SELECT * FROM order_cred_issuers WHERE merchant_id = $1"#)
            .bind(merchant_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::IssuerNotFound)
    }

    /// Get an issuer by public key.
    #[instrument(skip(self, public_key), err)]
    pub async fn get_by_public_key(&mut self, public_key: &str) -> Result<Issuer> {
        sqlx::query_as::<_, Issuer>(r#"SELECT * FROM order_cred_issuers WHERE public_key = $1"#)
            .bind(public_key)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::IssuerNotFound)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::db::handlers::test_support::create_issuer;

    #[sqlx::test]
    async fn create_and_lookup(pool: PgPool) {
        let issuer = create_issuer(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Issuers::new(&mut conn);

        let by_merchant = repo.get_by_merchant_id("brave.com").await.unwrap();
        assert_eq!(by_merchant.id, issuer.id);

        let by_key = repo.get_by_public_key("public_key_01").await.unwrap();
        assert_eq!(by_key.id, issuer.id);
    }

    #[sqlx::test]
    async fn lookup_missing_issuer(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Issuers::new(&mut conn);

        assert!(matches!(repo.get_by_merchant_id("nobody.example").await, Err(DbError::IssuerNotFound)));
        assert!(matches!(repo.get_by_public_key("no_such_key").await, Err(DbError::IssuerNotFound)));
    }

    #[sqlx::test]
    async fn duplicate_pair_rejected(pool: PgPool) {
        create_issuer(&pool).await;
        let mut conn = pool.acquire().await.unwrap();

        let result = Issuers::new(&mut conn)
            .create(&IssuerCreateDBRequest {
                merchant_id: "brave.com".to_string(),
                public_key: "public_key_01".to_string(),
            })
            .await;

        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
    }
}
