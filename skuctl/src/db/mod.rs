//! Database layer for order and credential persistence.
//!
//! Implements the data access layer using SQLx with PostgreSQL, following
//! the repository pattern.
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories borrow a caller-owned connection or transaction, so an
//! orchestrator can compose several repository calls into one atomic unit:
//!
//! ```ignore
//! use skuctl::db::handlers::{OrderPayHistory, Orders};
//!
//! async fn renew(pool: &sqlx::PgPool, id: skuctl::types::OrderId) -> skuctl::db::errors::Result<()> {
//!     let mut tx = pool.begin().await.map_err(skuctl::db::errors::DbError::from)?;
//!
//!     Orders::new(&mut tx).set_last_paid_at(id, chrono::Utc::now()).await?;
//!     OrderPayHistory::new(&mut tx).insert(id, chrono::Utc::now()).await?;
//!
//!     tx.commit().await.map_err(skuctl::db::errors::DbError::from)?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
